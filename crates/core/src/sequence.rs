//! 命令序列号与日志序列号的编解码
//!
//! 命令序列号为19位：8位本地日期(YYYYMMDD) + 11位以0补足的命令ID。
//! 日志序列号为14位：8位本地日期 + 6位日志序号，序号 111111 为日志结束标记。
//! 编码时总是使用当前日期，解码时日期部分仅供参考。

use chrono::{Local, NaiveDate};

use crate::errors::{DispatchError, DispatchResult};

pub const COMMAND_SEQ_LEN: usize = 19;
pub const COMMAND_SEQ_SENTINEL: &str = "0000000000000000000";
pub const LOG_SEQ_LEN: usize = 14;
pub const LOG_SEQ_SENTINEL: &str = "00000000000000";
/// 日志结束标记序号
pub const LOG_END_INDEX: u32 = 111_111;

const DATE_LEN: usize = 8;
const DATE_FORMAT: &str = "%Y%m%d";
const MAX_COMMAND_ID: i64 = 99_999_999_999;

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// 使用当天日期编码命令序列号
pub fn encode_command_seq(id: i64) -> String {
    encode_command_seq_on(today(), id)
}

/// 使用指定日期编码命令序列号，超出11位范围的ID编码为哨兵值
pub fn encode_command_seq_on(date: NaiveDate, id: i64) -> String {
    if id <= 0 || id > MAX_COMMAND_ID {
        return COMMAND_SEQ_SENTINEL.to_string();
    }
    format!("{}{:011}", date.format(DATE_FORMAT), id)
}

/// 从命令序列号中解析命令ID
pub fn decode_command_seq(seq: &str) -> DispatchResult<i64> {
    let seq = seq.trim();
    if seq.len() != COMMAND_SEQ_LEN || !seq.is_ascii() {
        return Err(DispatchError::InvalidSequence(format!(
            "命令序列号长度必须为{COMMAND_SEQ_LEN}: {seq}"
        )));
    }
    if seq == COMMAND_SEQ_SENTINEL {
        return Err(DispatchError::InvalidSequence(
            "命令序列号为哨兵值".to_string(),
        ));
    }

    let suffix = &seq[DATE_LEN..];
    if !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DispatchError::InvalidSequence(format!(
            "命令ID部分不是数字: {seq}"
        )));
    }
    let id = suffix
        .parse::<i64>()
        .map_err(|_| DispatchError::InvalidSequence(format!("命令ID部分不是数字: {seq}")))?;
    if id <= 0 {
        return Err(DispatchError::InvalidSequence(format!(
            "命令ID必须为正数: {seq}"
        )));
    }

    Ok(id)
}

pub fn is_valid_command_seq(seq: &str) -> bool {
    decode_command_seq(seq).is_ok()
}

/// 使用当天日期编码日志序列号
pub fn encode_log_seq(id: i64) -> String {
    encode_log_seq_on(today(), id)
}

/// 使用指定日期编码日志序列号，越界序号被转换为结束标记
pub fn encode_log_seq_on(date: NaiveDate, id: i64) -> String {
    let index = if id < 1 || id >= i64::from(LOG_END_INDEX) {
        i64::from(LOG_END_INDEX)
    } else {
        id
    };
    format!("{}{:06}", date.format(DATE_FORMAT), index)
}

pub fn is_valid_log_seq(seq: &str) -> bool {
    let seq = seq.trim();
    seq.len() == LOG_SEQ_LEN && seq != LOG_SEQ_SENTINEL
}

/// 解析日志序列号，返回 (日期, 序号)
pub fn decode_log_seq(seq: &str) -> DispatchResult<(String, u32)> {
    let seq = seq.trim();
    if seq.len() != LOG_SEQ_LEN || !seq.is_ascii() {
        return Err(DispatchError::InvalidSequence(format!(
            "日志序列号长度必须为{LOG_SEQ_LEN}: {seq}"
        )));
    }

    if seq == LOG_SEQ_SENTINEL {
        return Err(DispatchError::InvalidSequence(
            "日志序列号为哨兵值".to_string(),
        ));
    }

    let suffix = &seq[DATE_LEN..];
    if !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DispatchError::InvalidSequence(format!(
            "日志序号部分不是数字: {seq}"
        )));
    }
    let index = suffix
        .parse::<u32>()
        .map_err(|_| DispatchError::InvalidSequence(format!("日志序号部分不是数字: {seq}")))?;

    Ok((seq[..DATE_LEN].to_string(), index))
}

/// 某个命令已经确认的最后一条日志位置
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LogCursor {
    pub date: String,
    pub index: u32,
}

impl LogCursor {
    /// 从头开始读取的游标
    pub fn beginning() -> Self {
        Self::beginning_on(today())
    }

    pub fn beginning_on(date: NaiveDate) -> Self {
        Self {
            date: date.format(DATE_FORMAT).to_string(),
            index: 0,
        }
    }

    pub fn parse(seq: &str) -> DispatchResult<Self> {
        let (date, index) = decode_log_seq(seq)?;
        Ok(Self { date, index })
    }

    /// 尚未确认过任何日志
    pub fn is_beginning(&self) -> bool {
        self.index == 0
    }

    /// `seen` 是否已经被本游标确认过
    pub fn covers(&self, seen: &LogCursor) -> bool {
        !self.is_beginning() && seen <= self
    }

    /// 日志流是否已经结束
    pub fn is_end(&self) -> bool {
        self.index >= LOG_END_INDEX
    }

    /// 下一次拉取的起始序列号
    pub fn next_start(&self) -> String {
        let next = self.index.saturating_add(1).min(LOG_END_INDEX);
        format!("{}{:06}", self.date, next)
    }

    pub fn to_seq(&self) -> String {
        format!("{}{:06}", self.date, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn june_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn command_seq_round_trip() {
        for id in [1_i64, 7, 42, 123_456, 99_999_999_999] {
            let seq = encode_command_seq(id);
            assert_eq!(seq.len(), COMMAND_SEQ_LEN);
            assert_eq!(decode_command_seq(&seq).unwrap(), id);
        }
    }

    #[test]
    fn command_seq_layout() {
        assert_eq!(encode_command_seq_on(june_first(), 7), "2024060100000000007");
    }

    #[test]
    fn sentinel_and_malformed_command_seqs_are_invalid() {
        assert!(!is_valid_command_seq(COMMAND_SEQ_SENTINEL));
        assert!(!is_valid_command_seq("20240601"));
        assert!(!is_valid_command_seq("20240601000000000x7"));
        assert!(!is_valid_command_seq("2024060100000000000"));
        assert!(!is_valid_command_seq("20240601+0000000007"));
        assert!(is_valid_command_seq("1999123100000000001"));
        assert_eq!(encode_command_seq(0), COMMAND_SEQ_SENTINEL);
        assert_eq!(encode_command_seq(100_000_000_000), COMMAND_SEQ_SENTINEL);
    }

    #[test]
    fn log_seq_clamps_to_end_marker() {
        assert_eq!(encode_log_seq_on(june_first(), 0), "20240601111111");
        assert_eq!(encode_log_seq_on(june_first(), 111_111), "20240601111111");
        assert_eq!(encode_log_seq_on(june_first(), 111_110), "20240601111110");
        assert_eq!(encode_log_seq_on(june_first(), 5), "20240601000005");
        assert!(!is_valid_log_seq(LOG_SEQ_SENTINEL));
    }

    #[test]
    fn decode_log_seq_reports_date_and_index() {
        let (date, index) = decode_log_seq("20240601000012").unwrap();
        assert_eq!(date, "20240601");
        assert_eq!(index, 12);
        assert!(decode_log_seq("2024060100001").is_err());
        assert!(decode_log_seq("20240601abcdef").is_err());
        assert!(decode_log_seq("20240601+00012").is_err());
    }

    #[test]
    fn sentinel_log_seq_is_not_a_cursor() {
        assert!(decode_log_seq(LOG_SEQ_SENTINEL).is_err());
        assert!(LogCursor::parse(LOG_SEQ_SENTINEL).is_err());
    }

    #[test]
    fn cursor_resumes_after_last_index() {
        let cursor = LogCursor::beginning_on(june_first());
        assert_eq!(cursor.next_start(), "20240601000001");

        let cursor = LogCursor::parse("20240601000009").unwrap();
        assert_eq!(cursor.next_start(), "20240601000010");
        assert!(!cursor.is_end());
        assert!(LogCursor::parse("20240601111111").unwrap().is_end());
    }

    #[test]
    fn cursor_covers_only_confirmed_lines() {
        let start = LogCursor::beginning_on(june_first());
        assert!(!start.covers(&LogCursor::parse("20230101000001").unwrap()));

        let cursor = LogCursor::parse("20240601000009").unwrap();
        assert!(cursor.covers(&LogCursor::parse("20240601000003").unwrap()));
        assert!(cursor.covers(&LogCursor::parse("20240601000009").unwrap()));
        assert!(!cursor.covers(&LogCursor::parse("20240601000010").unwrap()));
        assert!(!cursor.covers(&LogCursor::parse("20240602000001").unwrap()));
    }
}
