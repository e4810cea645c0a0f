//! 规则集编译器核心
//! 两级编译：可信索引优先，失败或缺失时回退为逐文件聚合编译

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::engine::{EngineError, RuleEngine, SourceUnit};
use crate::config::GlobalConfig;
use crate::error::{TiaError, TiaResult};
use crate::rule::{ExclusionSet, RuleUnitCollector, RuleUnitRegistry};

/// 索引文件编译使用的命名空间
pub const DEFAULT_NAMESPACE: &str = "default";

/// 回退编译的原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// 索引文件不存在
    IndexMissing,
    /// 索引文件存在语法错误
    IndexSyntax(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::IndexMissing => write!(f, "索引文件不存在"),
            FallbackReason::IndexSyntax(e) => write!(f, "索引文件语法错误：{}", e),
        }
    }
}

/// 规则集来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSetOrigin {
    TrustedIndex { path: PathBuf },
    Fallback { reason: FallbackReason, unit_count: usize },
}

/// 编译后的规则集（编译后只读）
#[derive(Debug)]
pub struct CompiledRuleSet<C> {
    pub rules: C,
    pub origin: RuleSetOrigin,
}

/// 编译状态机
#[derive(Debug)]
enum CompileState {
    TryIndex(PathBuf),
    Fallback(FallbackReason),
}

/// 索引编译尝试结果
enum IndexAttempt<C> {
    Compiled(C),
    Rejected(String),
}

/// 规则集编译器
pub struct RuleSetCompiler<'a, E: RuleEngine> {
    engine: &'a E,
    config: &'a GlobalConfig,
    exclusions: ExclusionSet,
}

impl<'a, E: RuleEngine> RuleSetCompiler<'a, E> {
    pub fn new(engine: &'a E, config: &'a GlobalConfig) -> Self {
        Self {
            engine,
            config,
            exclusions: config.exclusion_set(),
        }
    }

    /// 使用显式的排除集合（覆盖配置中的 excluded_modules）
    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// 编译规则目录：TryIndex -> (语法错误) -> Fallback -> (空/语法错误) -> 失败
    pub fn compile(&self, root: &Path) -> TiaResult<CompiledRuleSet<E::Compiled>> {
        let start = Instant::now();
        let index_path = root.join(&self.config.index_file);

        let mut state = if index_path.is_file() {
            CompileState::TryIndex(index_path)
        } else {
            CompileState::Fallback(FallbackReason::IndexMissing)
        };

        loop {
            state = match state {
                CompileState::TryIndex(path) => {
                    info!("使用可信索引文件：{}", path.display());
                    match self.try_index(&path)? {
                        IndexAttempt::Compiled(rules) => {
                            debug!("索引编译完成，耗时{:?}", start.elapsed());
                            return Ok(CompiledRuleSet {
                                rules,
                                origin: RuleSetOrigin::TrustedIndex { path },
                            });
                        }
                        IndexAttempt::Rejected(message) => {
                            warn!("索引文件语法错误，回退为逐文件编译：{}", message);
                            CompileState::Fallback(FallbackReason::IndexSyntax(message))
                        }
                    }
                }
                CompileState::Fallback(reason) => {
                    let compiled = self.compile_fallback(root, reason)?;
                    debug!("回退编译完成，耗时{:?}", start.elapsed());
                    return Ok(compiled);
                }
            };
        }
    }

    fn try_index(&self, path: &Path) -> TiaResult<IndexAttempt<E::Compiled>> {
        let unit = SourceUnit::new(DEFAULT_NAMESPACE, path);
        match self.engine.compile(std::slice::from_ref(&unit)) {
            Ok(rules) => Ok(IndexAttempt::Compiled(rules)),
            Err(EngineError::Syntax { message, .. }) => Ok(IndexAttempt::Rejected(message)),
            Err(e) => Err(e.into()),
        }
    }

    fn compile_fallback(
        &self,
        root: &Path,
        reason: FallbackReason,
    ) -> TiaResult<CompiledRuleSet<E::Compiled>> {
        let collector = RuleUnitCollector::from_config(self.config, self.exclusions.clone());
        let report = collector.collect(root, true)?;
        let unit_count = report.registry.len();
        info!("待编译规则文件总数：{}", unit_count);
        if unit_count == 0 {
            return Err(TiaError::EmptyRegistry(root.to_path_buf()));
        }

        let rules = self.compile_registry(&report.registry)?;

        Ok(CompiledRuleSet {
            rules,
            origin: RuleSetOrigin::Fallback { reason, unit_count },
        })
    }

    /// 将注册表中的全部规则单元编译为一个规则集，每个单元独占一个命名空间
    pub fn compile_registry(&self, registry: &RuleUnitRegistry) -> TiaResult<E::Compiled> {
        if registry.is_empty() {
            return Err(TiaError::EmptyRegistry(self.config.rules_dir.clone()));
        }

        let units: Vec<SourceUnit> = registry
            .iter()
            .map(|unit| SourceUnit::new(unit.key.as_str(), unit.path.as_path()))
            .collect();

        self.engine.compile(&units).map_err(|e| match e {
            EngineError::Syntax { path, message } => {
                TiaError::FallbackSyntaxError(format!("{}: {}", path.display(), message))
            }
            other => TiaError::EngineError(other),
        })
    }
}
