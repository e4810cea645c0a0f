//! 匹配结果规范化
//! 将引擎原生事件转换为稳定的报告结构，不做过滤、排序或去重

use std::collections::BTreeMap;

use serde_json::Value;

use super::report::{MatchInstance, RuleMatch, StringMatch};
use crate::compiler::{MatchEvent, MetaValue, PatternHit, RawInstance};

/// 匹配结果规范化器
pub struct MatchNormalizer;

impl MatchNormalizer {
    /// 按引擎输出顺序转换全部事件
    pub fn normalize(events: Vec<MatchEvent>) -> Vec<RuleMatch> {
        events.into_iter().map(Self::normalize_event).collect()
    }

    fn normalize_event(event: MatchEvent) -> RuleMatch {
        let mut metadata = BTreeMap::new();
        // 同名元数据后者覆盖前者
        for (name, value) in event.metadata {
            metadata.insert(name, Self::meta_to_json(value));
        }

        RuleMatch {
            rule_identifier: event.rule,
            namespace: event.namespace,
            tags: event.tags,
            metadata,
            string_matches: event.patterns.into_iter().map(Self::normalize_pattern).collect(),
        }
    }

    fn normalize_pattern(hit: PatternHit) -> StringMatch {
        StringMatch {
            identifier: hit.identifier,
            instances: hit.instances.iter().map(Self::normalize_instance).collect(),
        }
    }

    fn normalize_instance(instance: &RawInstance) -> MatchInstance {
        MatchInstance {
            offset: instance.offset as u64,
            matched_bytes: hex::encode(&instance.data),
            matched_length: instance.length as u64,
        }
    }

    /// 元数据转为 JSON 标量；字节串按 UTF-8 宽松解码
    fn meta_to_json(value: MetaValue) -> Value {
        match value {
            MetaValue::Integer(i) => Value::from(i),
            // NaN/Inf 无法表示为 JSON 数字，输出 null
            MetaValue::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            MetaValue::Bool(b) => Value::Bool(b),
            MetaValue::String(s) => Value::String(s),
            MetaValue::Bytes(b) => Value::String(String::from_utf8_lossy(&b).into_owned()),
        }
    }
}
