//! 编译模块：规则引擎抽象与两级规则集编译
pub mod engine;
pub mod yara_engine;
pub mod compiler;

pub use self::engine::{
    EngineError, EvalError, MatchEvent, MetaValue, PatternHit, RawInstance, RuleEngine, SourceUnit,
};
pub use self::yara_engine::YaraXEngine;
pub use self::compiler::{
    CompiledRuleSet, FallbackReason, RuleSetCompiler, RuleSetOrigin, DEFAULT_NAMESPACE,
};
