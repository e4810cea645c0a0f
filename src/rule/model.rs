//! 规则单元数据模型定义
//! 仅存储收集结果，不包含遍历逻辑

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// 单个规则源文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleUnit {
    /// 聚合内唯一的逻辑名称（同时作为编译命名空间）
    pub key: String,
    pub path: PathBuf,
    /// 源码中声明的 import 模块
    pub declared_imports: BTreeSet<String>,
}

/// 当前环境不可用的模块集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    modules: HashSet<String>,
}

impl ExclusionSet {
    pub fn new<I, S>(modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            modules: modules.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, module: &str) -> bool {
        self.modules.contains(module)
    }

    /// 返回第一个命中排除集合的模块（按名称排序，保证日志稳定）
    pub fn first_excluded<'a>(&self, imports: &'a BTreeSet<String>) -> Option<&'a str> {
        imports
            .iter()
            .find(|module| self.modules.contains(module.as_str()))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// 排序后的模块列表（用于指纹计算）
    pub fn sorted(&self) -> Vec<&str> {
        let mut modules: Vec<&str> = self.modules.iter().map(String::as_str).collect();
        modules.sort_unstable();
        modules
    }
}

/// 规则单元注册表：key -> RuleUnit，保持插入（遍历）顺序
#[derive(Debug, Clone, Default)]
pub struct RuleUnitRegistry {
    units: Vec<RuleUnit>,
    positions: HashMap<String, usize>,
}

impl RuleUnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&RuleUnit> {
        self.positions.get(key).map(|&idx| &self.units[idx])
    }

    /// 登记规则单元，key 冲突时返回原单元（调用方负责重新派生 key）
    pub fn insert(&mut self, unit: RuleUnit) -> Result<(), RuleUnit> {
        if self.positions.contains_key(&unit.key) {
            return Err(unit);
        }
        self.positions.insert(unit.key.clone(), self.units.len());
        self.units.push(unit);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleUnit> {
        self.units.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(|unit| unit.key.as_str())
    }
}

impl<'a> IntoIterator for &'a RuleUnitRegistry {
    type Item = &'a RuleUnit;
    type IntoIter = std::slice::Iter<'a, RuleUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter()
    }
}

/// 规则文件被跳过的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// 读取失败
    Unreadable(String),
    /// 依赖当前环境不可用的模块
    ExcludedCapability(String),
    /// 回退模式下的索引文件（避免循环 include）
    IndexUnit,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unreadable(e) => write!(f, "无法读取：{}", e),
            SkipReason::ExcludedCapability(module) => write!(f, "依赖不可用模块 {}", module),
            SkipReason::IndexUnit => write!(f, "索引文件"),
        }
    }
}

/// 被跳过的规则文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedUnit {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// 收集结果：注册表 + 跳过明细
#[derive(Debug, Clone, Default)]
pub struct CollectReport {
    pub registry: RuleUnitRegistry,
    pub skipped: Vec<SkippedUnit>,
}

impl CollectReport {
    /// 指定原因的跳过数量
    pub fn skipped_count(&self, matcher: impl Fn(&SkipReason) -> bool) -> usize {
        self.skipped.iter().filter(|s| matcher(&s.reason)).count()
    }

    pub fn was_skipped(&self, path: &Path) -> bool {
        self.skipped.iter().any(|s| s.path == path)
    }
}
