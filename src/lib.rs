//! rsyaratia - YARA 规则聚合与威胁情报扫描工具
//!
//! 流程：规则单元收集 → 规则集编译（可信索引 / 回退聚合）→ 超时可控扫描 → 匹配结果规范化

// 导出全局错误类型
pub use self::error::{TiaError, TiaResult};

// 导出配置模块
pub use self::config::{GlobalConfig, ConfigManager, CustomConfigBuilder};

// 导出规则模块核心接口
pub use self::rule::{
    CollectReport, ExclusionSet, RuleUnit, RuleUnitCollector, RuleUnitRegistry, SkipReason,
    SkippedUnit, RuleSetCache, CachedRuleSet,
};

// 导出编译模块核心接口
pub use self::compiler::{
    CompiledRuleSet, EngineError, EvalError, FallbackReason, MatchEvent, RuleEngine,
    RuleSetCompiler, RuleSetOrigin, SourceUnit, YaraXEngine,
};

// 导出检测模块核心接口
pub use self::detector::{
    MatchInstance, MatchNormalizer, MatchReport, RuleMatch, ScanError, ScanErrorKind,
    ScanExecutor, ScanOutcome, StringMatch, TiaScanner,
    init_tia, init_tia_with_config, global_scanner, scan_target,
};

// 导出工具模块核心接口
pub use self::utils::RuleDirFingerprint;

// 声明所有子模块
pub mod config;
pub mod error;
pub mod rule;
pub mod compiler;
pub mod detector;
pub mod utils;
