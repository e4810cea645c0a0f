//! 规则模块：规则单元的收集、数据模型与编译结果缓存
pub mod model;
pub mod collector;
pub mod cache;

// 导出核心接口
pub use self::model::{
    CollectReport, ExclusionSet, RuleUnit, RuleUnitRegistry, SkipReason, SkippedUnit,
};
pub use self::collector::{declared_imports, RuleUnitCollector};
pub use self::cache::{CachedRuleSet, RuleSetCache};
