use super::manager::DatabaseType;

const SQLITE_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS host (
        host_id INTEGER PRIMARY KEY AUTOINCREMENT,
        agent_address TEXT NOT NULL,
        agent_port INTEGER NOT NULL DEFAULT 0,
        agent_is_tls INTEGER NOT NULL DEFAULT 0,
        agent_ca TEXT NOT NULL DEFAULT '',
        agent_cert TEXT NOT NULL DEFAULT '',
        agent_key TEXT NOT NULL DEFAULT '',
        insecure_skip_verify INTEGER NOT NULL DEFAULT 0,
        command_uri TEXT NOT NULL DEFAULT '',
        command_status_uri TEXT NOT NULL DEFAULT '',
        command_logs_uri TEXT NOT NULL DEFAULT ''
    )"#,
    r#"CREATE TABLE IF NOT EXISTS command (
        command_id INTEGER PRIMARY KEY AUTOINCREMENT,
        command TEXT NOT NULL,
        host_id INTEGER NOT NULL,
        synchronized INTEGER NOT NULL DEFAULT 0,
        create_time INTEGER NOT NULL,
        send_time INTEGER,
        complete_time INTEGER,
        try_times INTEGER NOT NULL DEFAULT 0,
        status INTEGER NOT NULL,
        status_msg TEXT NOT NULL DEFAULT ''
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_command_status ON command(status)",
    r#"CREATE TABLE IF NOT EXISTS command_parameters (
        command_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        value TEXT NOT NULL DEFAULT '',
        PRIMARY KEY (command_id, name)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS command_history (
        command_id INTEGER PRIMARY KEY,
        command TEXT NOT NULL,
        host_id INTEGER NOT NULL,
        synchronized INTEGER NOT NULL DEFAULT 0,
        create_time INTEGER NOT NULL,
        send_time INTEGER,
        complete_time INTEGER,
        try_times INTEGER NOT NULL DEFAULT 0,
        status INTEGER NOT NULL,
        status_msg TEXT NOT NULL DEFAULT ''
    )"#,
    r#"CREATE TABLE IF NOT EXISTS command_status_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        command_id INTEGER NOT NULL,
        host_id INTEGER NOT NULL,
        command TEXT NOT NULL,
        status INTEGER NOT NULL,
        status_msg TEXT NOT NULL DEFAULT '',
        received_time INTEGER NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS command_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        log_seq TEXT NOT NULL,
        command_id INTEGER NOT NULL,
        create_time INTEGER NOT NULL,
        level INTEGER NOT NULL DEFAULT 0,
        operation INTEGER NOT NULL,
        log_message TEXT NOT NULL DEFAULT ''
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_command_logs_command ON command_logs(command_id)",
];

const POSTGRES_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS host (
        host_id BIGSERIAL PRIMARY KEY,
        agent_address TEXT NOT NULL,
        agent_port BIGINT NOT NULL DEFAULT 0,
        agent_is_tls BIGINT NOT NULL DEFAULT 0,
        agent_ca TEXT NOT NULL DEFAULT '',
        agent_cert TEXT NOT NULL DEFAULT '',
        agent_key TEXT NOT NULL DEFAULT '',
        insecure_skip_verify BIGINT NOT NULL DEFAULT 0,
        command_uri TEXT NOT NULL DEFAULT '',
        command_status_uri TEXT NOT NULL DEFAULT '',
        command_logs_uri TEXT NOT NULL DEFAULT ''
    )"#,
    r#"CREATE TABLE IF NOT EXISTS command (
        command_id BIGSERIAL PRIMARY KEY,
        command TEXT NOT NULL,
        host_id BIGINT NOT NULL,
        synchronized BIGINT NOT NULL DEFAULT 0,
        create_time BIGINT NOT NULL,
        send_time BIGINT,
        complete_time BIGINT,
        try_times BIGINT NOT NULL DEFAULT 0,
        status BIGINT NOT NULL,
        status_msg TEXT NOT NULL DEFAULT ''
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_command_status ON command(status)",
    r#"CREATE TABLE IF NOT EXISTS command_parameters (
        command_id BIGINT NOT NULL,
        name TEXT NOT NULL,
        value TEXT NOT NULL DEFAULT '',
        PRIMARY KEY (command_id, name)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS command_history (
        command_id BIGINT PRIMARY KEY,
        command TEXT NOT NULL,
        host_id BIGINT NOT NULL,
        synchronized BIGINT NOT NULL DEFAULT 0,
        create_time BIGINT NOT NULL,
        send_time BIGINT,
        complete_time BIGINT,
        try_times BIGINT NOT NULL DEFAULT 0,
        status BIGINT NOT NULL,
        status_msg TEXT NOT NULL DEFAULT ''
    )"#,
    r#"CREATE TABLE IF NOT EXISTS command_status_history (
        id BIGSERIAL PRIMARY KEY,
        command_id BIGINT NOT NULL,
        host_id BIGINT NOT NULL,
        command TEXT NOT NULL,
        status BIGINT NOT NULL,
        status_msg TEXT NOT NULL DEFAULT '',
        received_time BIGINT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS command_logs (
        id BIGSERIAL PRIMARY KEY,
        log_seq TEXT NOT NULL,
        command_id BIGINT NOT NULL,
        create_time BIGINT NOT NULL,
        level BIGINT NOT NULL DEFAULT 0,
        operation BIGINT NOT NULL,
        log_message TEXT NOT NULL DEFAULT ''
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_command_logs_command ON command_logs(command_id)",
];

/// 建表语句，均可重复执行
pub fn statements(database_type: &DatabaseType) -> &'static [&'static str] {
    match database_type {
        DatabaseType::SQLite => SQLITE_SCHEMA,
        DatabaseType::PostgreSQL => POSTGRES_SCHEMA,
    }
}
