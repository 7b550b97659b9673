//! Test data builders for hosts and commands

use sysadm_core::{CommandStore, DispatchResult, NewCommand, NewHost};

/// Builder for agent hosts
pub struct HostBuilder {
    host: NewHost,
}

impl HostBuilder {
    pub fn new() -> Self {
        Self {
            host: NewHost::new("10.0.0.1", 8080),
        }
    }

    pub fn with_address(mut self, address: &str) -> Self {
        self.host.agent_address = address.to_string();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.host.agent_port = port;
        self
    }

    pub fn with_tls(mut self, insecure_skip_verify: bool) -> Self {
        self.host.agent_is_tls = true;
        self.host.insecure_skip_verify = insecure_skip_verify;
        self
    }

    pub fn with_command_uri(mut self, uri: &str) -> Self {
        self.host.command_uri = uri.to_string();
        self
    }

    pub fn build(self) -> NewHost {
        self.host
    }

    pub async fn create(self, store: &dyn CommandStore) -> DispatchResult<i64> {
        store.create_host(&self.host).await
    }
}

impl Default for HostBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for queued commands
pub struct CommandBuilder {
    command: NewCommand,
}

impl CommandBuilder {
    pub fn new(host_id: i64) -> Self {
        Self {
            command: NewCommand::new("addyum", host_id),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.command.command = name.to_string();
        self
    }

    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.command = self.command.with_parameter(name, value);
        self
    }

    pub fn synchronized(mut self) -> Self {
        self.command = self.command.synchronized(true);
        self
    }

    pub fn build(self) -> NewCommand {
        self.command
    }

    pub async fn create(self, store: &dyn CommandStore) -> DispatchResult<i64> {
        store.create_command(self.command).await
    }
}
