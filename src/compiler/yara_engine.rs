//! YARA-X 引擎适配
//! 将 yara_x 的编译/扫描接口适配为 RuleEngine

use std::time::Duration;

use tracing::debug;

use super::engine::{
    EngineError, EvalError, MatchEvent, MetaValue, PatternHit, RawInstance, RuleEngine, SourceUnit,
};

/// 基于 YARA-X 的规则引擎
#[derive(Debug, Clone, Default)]
pub struct YaraXEngine;

impl YaraXEngine {
    pub fn new() -> Self {
        Self
    }

    fn add_unit(compiler: &mut yara_x::Compiler<'_>, unit: &SourceUnit) -> Result<(), EngineError> {
        let bytes = std::fs::read(&unit.path).map_err(|source| EngineError::Io {
            path: unit.path.clone(),
            source,
        })?;
        let source = String::from_utf8_lossy(&bytes);
        let origin = unit.path.display().to_string();

        // include 相对于规则文件所在目录解析
        if let Some(dir) = unit.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            compiler.add_include_dir(dir);
        }

        compiler.new_namespace(&unit.namespace);
        compiler
            .add_source(yara_x::SourceCode::from(&*source).with_origin(origin.as_str()))
            .map_err(|e| EngineError::Syntax {
                path: unit.path.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

impl RuleEngine for YaraXEngine {
    type Compiled = yara_x::Rules;

    fn compile(&self, units: &[SourceUnit]) -> Result<Self::Compiled, EngineError> {
        let mut compiler = yara_x::Compiler::new();
        // 兼容旧版 YARA 的宽松正则语法（社区规则常见）
        compiler.relaxed_re_syntax(true);

        for unit in units {
            Self::add_unit(&mut compiler, unit)?;
        }

        let rules = compiler.build();
        debug!("YARA-X 编译完成：{} 个规则源，{} 条规则", units.len(), rules.iter().count());
        Ok(rules)
    }

    fn evaluate(
        &self,
        rules: &Self::Compiled,
        target: &[u8],
        timeout: Duration,
    ) -> Result<Vec<MatchEvent>, EvalError> {
        let mut scanner = yara_x::Scanner::new(rules);
        scanner.set_timeout(timeout);

        let results = scanner.scan(target).map_err(|e| match e {
            yara_x::ScanError::Timeout => EvalError::Timeout,
            other => EvalError::Failed(other.to_string()),
        })?;

        let events = results
            .matching_rules()
            .map(|rule| MatchEvent {
                rule: rule.identifier().to_string(),
                namespace: rule.namespace().to_string(),
                tags: rule.tags().map(|tag| tag.identifier().to_string()).collect(),
                metadata: rule
                    .metadata()
                    .map(|(name, value)| (name.to_string(), convert_meta(value)))
                    .collect(),
                patterns: rule
                    .patterns()
                    .filter_map(|pattern| {
                        let instances: Vec<RawInstance> = pattern
                            .matches()
                            .map(|m| {
                                let range = m.range();
                                RawInstance {
                                    offset: range.start,
                                    length: range.len(),
                                    data: m.data().to_vec(),
                                }
                            })
                            .collect();
                        // 仅保留实际命中的模式
                        (!instances.is_empty()).then(|| PatternHit {
                            identifier: pattern.identifier().to_string(),
                            instances,
                        })
                    })
                    .collect(),
            })
            .collect();

        Ok(events)
    }

    fn export(&self, rules: &Self::Compiled) -> Result<Vec<u8>, EngineError> {
        rules
            .serialize()
            .map_err(|e| EngineError::Serialization(e.to_string()))
    }

    fn import(&self, bytes: &[u8]) -> Result<Self::Compiled, EngineError> {
        yara_x::Rules::deserialize(bytes).map_err(|e| EngineError::Serialization(e.to_string()))
    }
}

fn convert_meta(value: yara_x::MetaValue<'_>) -> MetaValue {
    match value {
        yara_x::MetaValue::Integer(i) => MetaValue::Integer(i),
        yara_x::MetaValue::Float(f) => MetaValue::Float(f),
        yara_x::MetaValue::Bool(b) => MetaValue::Bool(b),
        yara_x::MetaValue::String(s) => MetaValue::String(s.to_string()),
        yara_x::MetaValue::Bytes(b) => MetaValue::Bytes(b.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const DEADBEEF_RULE: &str = r#"
rule R : trojan elf {
    meta:
        author = "tia"
        severity = 7
        active = true
    strings:
        $s = { DE AD BE EF }
        $unused = "never-present-in-target"
    condition:
        $s or $unused
}
"#;

    fn target_with_deadbeef_at_10() -> Vec<u8> {
        let mut data = vec![0u8; 32];
        data[10..14].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        data
    }

    #[test]
    fn test_evaluate_reports_hit_details() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.yar");
        fs::write(&path, DEADBEEF_RULE).unwrap();

        let engine = YaraXEngine::new();
        let rules = engine.compile(&[SourceUnit::new("r", &path)]).unwrap();
        let events = engine
            .evaluate(&rules, &target_with_deadbeef_at_10(), Duration::from_secs(5))
            .unwrap();

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.rule, "R");
        assert_eq!(event.namespace, "r");
        assert_eq!(event.tags, vec!["trojan".to_string(), "elf".to_string()]);
        assert_eq!(event.metadata[0], ("author".to_string(), MetaValue::String("tia".to_string())));
        assert_eq!(event.metadata[1], ("severity".to_string(), MetaValue::Integer(7)));
        assert_eq!(event.metadata[2], ("active".to_string(), MetaValue::Bool(true)));
        // 未命中的 $unused 不出现
        assert_eq!(event.patterns.len(), 1);
        assert_eq!(event.patterns[0].identifier, "$s");
        assert_eq!(
            event.patterns[0].instances,
            vec![RawInstance {
                offset: 10,
                length: 4,
                data: vec![0xDE, 0xAD, 0xBE, 0xEF],
            }]
        );
    }

    #[test]
    fn test_compile_syntax_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yar");
        fs::write(&path, "rule broken { condition: }").unwrap();

        let err = YaraXEngine::new()
            .compile(&[SourceUnit::new("broken", &path)])
            .err().unwrap();
        assert!(matches!(err, EngineError::Syntax { .. }));
    }

    #[test]
    fn test_compile_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = YaraXEngine::new()
            .compile(&[SourceUnit::new("x", dir.path().join("missing.yar"))])
            .err().unwrap();
        assert!(matches!(err, EngineError::Io { .. }));
    }

    #[test]
    fn test_export_import_preserves_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.yar");
        fs::write(&path, DEADBEEF_RULE).unwrap();

        let engine = YaraXEngine::new();
        let rules = engine.compile(&[SourceUnit::new("r", &path)]).unwrap();
        let restored = engine.import(&engine.export(&rules).unwrap()).unwrap();

        let target = target_with_deadbeef_at_10();
        let timeout = Duration::from_secs(5);
        assert_eq!(
            engine.evaluate(&rules, &target, timeout).unwrap(),
            engine.evaluate(&restored, &target, timeout).unwrap()
        );
    }
}
