use serde::{Deserialize, Serialize};

use crate::errors::{DispatchError, DispatchResult};

/// 自定义节点标识的最大长度
pub const MAX_CUSTOMIZE_LEN: usize = 256;

/// 客户端用于标识自身的信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeIdentifier {
    pub ips: Vec<String>,
    pub macs: Vec<String>,
    pub hostname: String,
    pub customize: String,
}

impl NodeIdentifier {
    pub fn customized(value: impl Into<String>) -> Self {
        Self {
            customize: value.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ips.iter().all(|ip| ip.trim().is_empty())
            && self.macs.iter().all(|mac| mac.trim().is_empty())
            && self.hostname.trim().is_empty()
            && self.customize.trim().is_empty()
    }
}

/// 节点标识串（nodeIdentifierStr）所要求的标识方式
///
/// 取值为 IP、MAC、HOSTNAME 的逗号分隔组合（不区分大小写），
/// 或者不包含上述关键字的自定义字符串。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeIdentifierSpec {
    Tokens { ip: bool, mac: bool, hostname: bool },
    Customize(String),
}

impl NodeIdentifierSpec {
    pub fn parse(value: &str) -> DispatchResult<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(DispatchError::Validation("节点标识串不能为空".to_string()));
        }

        if is_node_identifier_str_valid(value) {
            let mut flags = (false, false, false);
            for token in value.split(',') {
                match token.trim().to_ascii_uppercase().as_str() {
                    "IP" => flags.0 = true,
                    "MAC" => flags.1 = true,
                    _ => flags.2 = true,
                }
            }
            return Ok(NodeIdentifierSpec::Tokens {
                ip: flags.0,
                mac: flags.1,
                hostname: flags.2,
            });
        }

        if value.chars().count() > MAX_CUSTOMIZE_LEN {
            return Err(DispatchError::Validation(format!(
                "自定义节点标识长度不能超过{MAX_CUSTOMIZE_LEN}"
            )));
        }
        let mixed = value.split(',').any(|token| {
            matches!(
                token.trim().to_ascii_uppercase().as_str(),
                "IP" | "MAC" | "HOSTNAME"
            )
        });
        if mixed {
            return Err(DispatchError::Validation(format!(
                "自定义节点标识不能与IP/MAC/HOSTNAME混用: {value}"
            )));
        }

        Ok(NodeIdentifierSpec::Customize(value.to_string()))
    }
}

/// 判断是否为 IP、MAC、HOSTNAME 的组合
pub fn is_node_identifier_str_valid(value: &str) -> bool {
    if value.trim().is_empty() {
        return false;
    }
    value.split(',').all(|token| {
        matches!(
            token.trim().to_ascii_uppercase().as_str(),
            "IP" | "MAC" | "HOSTNAME"
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_lists_are_case_insensitive() {
        assert!(is_node_identifier_str_valid("ip, Hostname"));
        assert_eq!(
            NodeIdentifierSpec::parse("IP,mac").unwrap(),
            NodeIdentifierSpec::Tokens {
                ip: true,
                mac: true,
                hostname: false
            }
        );
    }

    #[test]
    fn customize_cannot_mix_with_tokens() {
        assert_eq!(
            NodeIdentifierSpec::parse("rack-12").unwrap(),
            NodeIdentifierSpec::Customize("rack-12".to_string())
        );
        assert!(NodeIdentifierSpec::parse("IP,rack-12").is_err());
        assert!(NodeIdentifierSpec::parse(&"x".repeat(MAX_CUSTOMIZE_LEN + 1)).is_err());
        assert!(NodeIdentifierSpec::parse("  ").is_err());
    }

    #[test]
    fn empty_identifier() {
        assert!(NodeIdentifier::default().is_empty());
        assert!(NodeIdentifier {
            ips: vec![" ".to_string()],
            ..Default::default()
        }
        .is_empty());
        assert!(!NodeIdentifier::customized("node-a").is_empty());
    }
}
