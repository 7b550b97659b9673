//! 服务端与客户端之间的JSON报文
//!
//! 编码前校验必填字段，解码只做结构解析，语义检查交给调用方。

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::node_identifier::NodeIdentifier;
use super::status::CommandStatusCode;
use crate::errors::{DispatchError, DispatchResult};
use crate::sequence::{COMMAND_SEQ_SENTINEL, LOG_END_INDEX, LOG_SEQ_SENTINEL};

/// 报文的编码与解码
pub trait WireMessage: Serialize + DeserializeOwned {
    /// 报文名称，用于错误信息
    const NAME: &'static str;

    fn validate(&self) -> DispatchResult<()>;

    fn marshal(&self) -> DispatchResult<Vec<u8>> {
        self.validate()?;
        Ok(serde_json::to_vec(self)?)
    }

    fn unmarshal(body: &[u8]) -> DispatchResult<Self> {
        if body.is_empty() {
            return Err(DispatchError::Serialization(format!(
                "{}: 待解析的数据为空",
                Self::NAME
            )));
        }
        Ok(serde_json::from_slice(body)?)
    }
}

fn invalid(name: &str, reason: &str) -> DispatchError {
    DispatchError::Validation(format!("{name}: {reason}"))
}

fn require_seq(name: &str, seq: &str) -> DispatchResult<()> {
    if seq.trim().is_empty() {
        return Err(invalid(name, "命令序列号不能为空"));
    }
    Ok(())
}

fn require_live_seq(name: &str, seq: &str) -> DispatchResult<()> {
    require_seq(name, seq)?;
    if seq.trim() == COMMAND_SEQ_SENTINEL {
        return Err(invalid(name, "命令序列号不能为哨兵值"));
    }
    Ok(())
}

fn require_identifier(name: &str, identifier: &NodeIdentifier) -> DispatchResult<()> {
    if identifier.is_empty() {
        return Err(invalid(name, "IP、MAC、HOSTNAME或自定义标识至少填写一项"));
    }
    Ok(())
}

fn require_status_code(name: &str, code: u32) -> DispatchResult<()> {
    if CommandStatusCode::from_code(code).is_none() {
        return Err(invalid(name, &format!("无法识别的状态码 {code}")));
    }
    Ok(())
}

/// 下发给客户端的命令
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Command {
    pub command_seq: String,
    pub command: String,
    pub synchronized: bool,
    #[serde(rename = "parameter", alias = "parameters")]
    pub parameters: BTreeMap<String, String>,
}

/// 服务端主动下发命令的请求体
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommandData {
    pub node_identifier_str: String,
    pub command: Command,
}

impl WireMessage for CommandData {
    const NAME: &'static str = "CommandData";

    fn validate(&self) -> DispatchResult<()> {
        require_seq(Self::NAME, &self.command.command_seq)?;
        if self.command.command.trim().is_empty() {
            return Err(invalid(Self::NAME, "命令名称不能为空"));
        }
        Ok(())
    }
}

/// 查询命令执行状态的请求体
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommandStatusReq {
    pub command_seq: String,
    pub node_identifier_str: String,
}

impl WireMessage for CommandStatusReq {
    const NAME: &'static str = "CommandStatusReq";

    fn validate(&self) -> DispatchResult<()> {
        require_seq(Self::NAME, &self.command_seq)
    }
}

/// 客户端返回的命令执行状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommandStatus {
    pub command_seq: String,
    pub node_identifier: NodeIdentifier,
    pub status_code: u32,
    pub status_message: String,
    #[serde(rename = "parameter")]
    pub data: serde_json::Map<String, serde_json::Value>,
    pub not_command: bool,
}

impl CommandStatus {
    pub fn status(&self) -> CommandStatusCode {
        CommandStatusCode::from(self.status_code)
    }
}

impl WireMessage for CommandStatus {
    const NAME: &'static str = "CommandStatus";

    fn validate(&self) -> DispatchResult<()> {
        require_seq(Self::NAME, &self.command_seq)?;
        require_identifier(Self::NAME, &self.node_identifier)?;
        require_status_code(Self::NAME, self.status_code)
    }
}

/// 拉取命令日志的请求体
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogReq {
    pub command_seq: String,
    pub node_identifier_str: String,
    pub start_seq: String,
    pub num: i64,
}

impl WireMessage for LogReq {
    const NAME: &'static str = "LogReq";

    fn validate(&self) -> DispatchResult<()> {
        require_live_seq(Self::NAME, &self.command_seq)?;
        let start = self.start_seq.trim();
        if start.is_empty() || start == LOG_SEQ_SENTINEL {
            return Err(invalid(Self::NAME, "起始日志序列号不能为空"));
        }
        if self.num <= 0 || self.num >= i64::from(LOG_END_INDEX) {
            return Err(invalid(
                Self::NAME,
                &format!("单次获取的日志条数必须在1到{}之间", LOG_END_INDEX - 1),
            ));
        }
        Ok(())
    }
}

/// 一条日志
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogLine {
    pub log_seq: String,
    pub level: u32,
    pub message: String,
}

/// 客户端返回的日志
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogData {
    pub command_seq: String,
    pub node_identifier: NodeIdentifier,
    pub logs: Vec<LogLine>,
    pub total: i64,
    #[serde(rename = "endflag")]
    pub end_flag: bool,
    pub not_command: bool,
}

impl WireMessage for LogData {
    const NAME: &'static str = "LogData";

    fn validate(&self) -> DispatchResult<()> {
        require_live_seq(Self::NAME, &self.command_seq)?;
        require_identifier(Self::NAME, &self.node_identifier)
    }
}

/// 通用应答
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepStatus {
    pub command_seq: String,
    pub status_code: u32,
    pub message: String,
    pub not_command: bool,
}

impl RepStatus {
    pub fn status(&self) -> CommandStatusCode {
        CommandStatusCode::from(self.status_code)
    }
}

impl WireMessage for RepStatus {
    const NAME: &'static str = "RepStatus";

    fn validate(&self) -> DispatchResult<()> {
        require_seq(Self::NAME, &self.command_seq)?;
        require_status_code(Self::NAME, self.status_code)
    }
}
