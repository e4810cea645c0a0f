//! 端到端流程测试：规则目录 -> 编译 -> 扫描 -> JSON 报告（YARA-X 引擎）

use std::fs;
use std::path::Path;

use rsyaratia::{
    ConfigManager, FallbackReason, GlobalConfig, RuleSetCompiler, RuleSetOrigin, ScanErrorKind,
    TiaError, TiaScanner, YaraXEngine,
};

const DEADBEEF_RULE: &str = r#"
rule R : trojan {
    meta:
        family = "deadbeef"
    strings:
        $s = { DE AD BE EF }
    condition:
        $s
}
"#;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn config_for(root: &Path) -> GlobalConfig {
    ConfigManager::custom()
        .rules_dir(root.to_path_buf())
        .scan_timeout(5)
        .build()
}

fn sample_with_deadbeef(dir: &Path) -> std::path::PathBuf {
    let mut data = vec![0x41u8; 64];
    data[10..14].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    let path = dir.join("sample.bin");
    fs::write(&path, data).unwrap();
    path
}

#[tokio::test]
async fn deadbeef_hit_is_reported_exactly_once() {
    let rules = tempfile::tempdir().unwrap();
    write(rules.path(), "malware/deadbeef.yar", DEADBEEF_RULE);
    let samples = tempfile::tempdir().unwrap();
    let sample = sample_with_deadbeef(samples.path());

    let scanner = TiaScanner::new(config_for(rules.path())).await.unwrap();
    let report = scanner.scan_file(&sample);

    assert!(report.error.is_none());
    assert_eq!(report.matches.len(), 1);
    let rule = &report.matches[0];
    assert_eq!(rule.rule_identifier, "R");
    assert_eq!(rule.namespace, "deadbeef");
    assert_eq!(rule.tags, vec!["trojan".to_string()]);
    assert_eq!(rule.metadata["family"], serde_json::json!("deadbeef"));
    assert_eq!(rule.string_matches.len(), 1);
    assert_eq!(rule.string_matches[0].identifier, "$s");

    let json = serde_json::to_value(&rule.string_matches[0].instances).unwrap();
    assert_eq!(
        json,
        serde_json::json!([{ "offset": 10, "matchedLength": 4, "matchedBytes": "deadbeef" }])
    );
}

#[tokio::test]
async fn broken_index_falls_back_to_individual_units() {
    let rules = tempfile::tempdir().unwrap();
    write(rules.path(), "malware_index.yar", "include \"./missing/everything.yar\"\n");
    write(rules.path(), "malware/deadbeef.yar", DEADBEEF_RULE);
    write(rules.path(), "malware/other_index.yar", "include \"../malware_index.yar\"\n");
    write(
        rules.path(),
        "mobile/droid.yar",
        "import \"androguard\"\nrule droid { condition: androguard.permission(/SEND_SMS/) }",
    );
    let samples = tempfile::tempdir().unwrap();
    let sample = sample_with_deadbeef(samples.path());

    let scanner = TiaScanner::new(config_for(rules.path())).await.unwrap();
    match scanner.origin() {
        RuleSetOrigin::Fallback {
            reason: FallbackReason::IndexSyntax(_),
            unit_count,
        } => assert_eq!(*unit_count, 1),
        other => panic!("unexpected origin: {:?}", other),
    }
    assert_eq!(scanner.scan_file(&sample).rule_names(), vec!["R"]);
}

#[tokio::test]
async fn same_base_name_in_two_directories_both_match() {
    let rules = tempfile::tempdir().unwrap();
    write(rules.path(), "apt/dup.yar", "rule apt_rule { strings: $a = \"AAAA\" condition: $a }");
    write(rules.path(), "crime/dup.yar", "rule crime_rule { strings: $a = \"AAAA\" condition: $a }");
    let samples = tempfile::tempdir().unwrap();
    let sample = sample_with_deadbeef(samples.path());

    let scanner = TiaScanner::new(config_for(rules.path())).await.unwrap();
    let report = scanner.scan_file(&sample);
    let namespaces: Vec<&str> = report.matches.iter().map(|m| m.namespace.as_str()).collect();
    assert_eq!(report.rule_names(), vec!["apt_rule", "crime_rule"]);
    assert_eq!(namespaces, vec!["dup", "crime_dup"]);
}

#[test]
fn compiling_twice_matches_identically() {
    let rules = tempfile::tempdir().unwrap();
    write(rules.path(), "a.yar", DEADBEEF_RULE);
    write(rules.path(), "b.yara", "rule B { strings: $a = \"AAAA\" condition: #a > 2 }");
    let samples = tempfile::tempdir().unwrap();
    let sample = sample_with_deadbeef(samples.path());

    let config = config_for(rules.path());
    let engine = YaraXEngine::new();
    let compiler = RuleSetCompiler::new(&engine, &config);
    let first = compiler.compile(rules.path()).unwrap();
    let second = compiler.compile(rules.path()).unwrap();

    let timeout = config.scan_timeout();
    let scan = |rules: &yara_x::Rules| {
        let executor = rsyaratia::ScanExecutor::new(&engine, rules, timeout);
        match executor.execute(&sample) {
            rsyaratia::ScanOutcome::Matched(events) => rsyaratia::MatchNormalizer::normalize(events),
            rsyaratia::ScanOutcome::Failed(e) => panic!("scan failed: {}", e),
        }
    };
    let a = scan(&first.rules);
    let b = scan(&second.rules);
    assert_eq!(a, b);
    assert_eq!(a.len(), 2);
}

#[tokio::test]
async fn only_excluded_units_is_empty_registry() {
    let rules = tempfile::tempdir().unwrap();
    write(rules.path(), "droid.yar", "import \"androguard\"\nrule d { condition: true }");
    write(rules.path(), "sandbox/cuckoo.yar", "import \"cuckoo\"\nrule c { condition: true }");

    let err = TiaScanner::new(config_for(rules.path())).await.err().unwrap();
    assert!(matches!(err, TiaError::EmptyRegistry(_)));
}

#[tokio::test]
async fn missing_target_is_reported_not_raised() {
    let rules = tempfile::tempdir().unwrap();
    write(rules.path(), "a.yar", DEADBEEF_RULE);
    let samples = tempfile::tempdir().unwrap();
    let missing = samples.path().join("gone.bin");
    let present = sample_with_deadbeef(samples.path());

    let scanner = TiaScanner::new(config_for(rules.path())).await.unwrap();
    let reports = scanner.scan_batch(vec![missing.clone(), present]).await;

    let error = reports[0].error.as_ref().unwrap();
    assert_eq!(error.kind, ScanErrorKind::Exception);
    assert_eq!(error.target_path, missing.display().to_string());
    assert_eq!(reports[1].rule_names(), vec!["R"]);
}
