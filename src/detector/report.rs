//! 扫描报告数据模型
//! 仅描述输出结构，字段名即 JSON 字段名

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 单次命中
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInstance {
    pub offset: u64,
    /// 命中字节的十六进制（小写）
    pub matched_bytes: String,
    pub matched_length: u64,
}

/// 单个字符串模式的全部命中
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringMatch {
    pub identifier: String,
    pub instances: Vec<MatchInstance>,
}

/// 单条规则命中
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMatch {
    pub rule_identifier: String,
    pub namespace: String,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub string_matches: Vec<StringMatch>,
}

/// 扫描失败类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanErrorKind {
    Timeout,
    Exception,
}

/// 扫描失败记录（替代匹配结果）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanError {
    pub kind: ScanErrorKind,
    pub message: String,
    pub target_path: String,
}

impl ScanError {
    pub fn timeout(target_path: impl Into<String>) -> Self {
        Self {
            kind: ScanErrorKind::Timeout,
            message: "scan timed out".to_string(),
            target_path: target_path.into(),
        }
    }

    pub fn exception(target_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ScanErrorKind::Exception,
            message: message.into(),
            target_path: target_path.into(),
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ScanErrorKind::Timeout => write!(f, "{}: timeout", self.target_path),
            ScanErrorKind::Exception => write!(f, "{}: {}", self.target_path, self.message),
        }
    }
}

/// 单个目标的扫描报告；error 存在时 matches 恒为空
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReport {
    pub target_path: String,
    pub matches: Vec<RuleMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ScanError>,
}

impl MatchReport {
    pub fn matched(target_path: impl Into<String>, matches: Vec<RuleMatch>) -> Self {
        Self {
            target_path: target_path.into(),
            matches,
            error: None,
        }
    }

    pub fn failed(error: ScanError) -> Self {
        Self {
            target_path: error.target_path.clone(),
            matches: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// 命中的规则名列表
    pub fn rule_names(&self) -> Vec<&str> {
        self.matches.iter().map(|m| m.rule_identifier.as_str()).collect()
    }

    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_compact_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_report_json_shape() {
        let report = MatchReport::failed(ScanError::timeout("/samples/slow.bin"));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            json!({
                "targetPath": "/samples/slow.bin",
                "matches": [],
                "error": {
                    "kind": "timeout",
                    "message": "scan timed out",
                    "targetPath": "/samples/slow.bin"
                }
            })
        );
    }

    #[test]
    fn test_match_report_json_field_names() {
        let report = MatchReport::matched(
            "a.bin",
            vec![RuleMatch {
                rule_identifier: "R".to_string(),
                namespace: "default".to_string(),
                tags: vec!["elf".to_string()],
                metadata: BTreeMap::from([("score".to_string(), json!(80))]),
                string_matches: vec![StringMatch {
                    identifier: "$s".to_string(),
                    instances: vec![MatchInstance {
                        offset: 10,
                        matched_bytes: "deadbeef".to_string(),
                        matched_length: 4,
                    }],
                }],
            }],
        );
        let value = serde_json::to_value(&report).unwrap();
        assert!(value.get("error").is_none());
        assert_eq!(value["matches"][0]["ruleIdentifier"], "R");
        assert_eq!(value["matches"][0]["metadata"]["score"], 80);
        assert_eq!(
            value["matches"][0]["stringMatches"][0]["instances"][0],
            json!({"offset": 10, "matchedBytes": "deadbeef", "matchedLength": 4})
        );
    }

    #[test]
    fn test_json_helpers() {
        let report = MatchReport::matched("clean.bin", Vec::new());
        assert_eq!(
            report.to_compact_json().unwrap(),
            r#"{"targetPath":"clean.bin","matches":[]}"#
        );

        let pretty = report.to_pretty_json().unwrap();
        assert!(pretty.contains('\n'));
        let parsed: MatchReport = serde_json::from_str(&pretty).unwrap();
        assert_eq!(parsed, report);
    }
}
