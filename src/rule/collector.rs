//! 规则单元收集器
//! 递归遍历规则目录，按后缀筛选、排除不可用模块、跳过索引文件并处理重名

use std::collections::BTreeSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use super::model::{CollectReport, ExclusionSet, RuleUnit, RuleUnitRegistry, SkipReason, SkippedUnit};
use crate::config::GlobalConfig;
use crate::error::{TiaError, TiaResult};

/// import 声明：import "pe"
static IMPORT_DECL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"import\s+"([^"\r\n]+)""#).unwrap());

/// 规则单元收集器
#[derive(Debug, Clone)]
pub struct RuleUnitCollector {
    extensions: Vec<String>,
    exclusions: ExclusionSet,
    index_marker: String,
    common_rules_marker: String,
}

impl RuleUnitCollector {
    /// 使用默认后缀与标记创建收集器
    pub fn new(exclusions: ExclusionSet) -> Self {
        Self::from_config(&GlobalConfig::default(), exclusions)
    }

    pub fn from_config(config: &GlobalConfig, exclusions: ExclusionSet) -> Self {
        Self {
            extensions: config.rule_extensions.clone(),
            exclusions,
            index_marker: config.index_marker.to_lowercase(),
            common_rules_marker: config.common_rules_marker.clone(),
        }
    }

    /// 收集规则目录下所有可编译的规则单元
    ///
    /// 单个文件的问题（读取失败、依赖不可用模块）只记录并跳过，不会中断收集；
    /// 仅根目录不存在时返回错误。
    pub fn collect(&self, root: &Path, skip_index: bool) -> TiaResult<CollectReport> {
        if !root.is_dir() {
            return Err(TiaError::RuleDirNotFound(root.to_path_buf()));
        }

        let mut report = CollectReport::default();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                    warn!("无法访问 {}：{}", path.display(), e);
                    report.skipped.push(SkippedUnit {
                        path,
                        reason: SkipReason::Unreadable(e.to_string()),
                    });
                    continue;
                }
            };
            if !is_file_entry(&entry) {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy();
            if !self.is_rule_file(&file_name) {
                continue;
            }
            let path = entry.path();

            // 回退模式下跳过索引文件，避免循环 include
            if skip_index && file_name.to_lowercase().contains(&self.index_marker) {
                debug!("跳过索引文件：{}", path.display());
                report.skipped.push(SkippedUnit {
                    path: path.to_path_buf(),
                    reason: SkipReason::IndexUnit,
                });
                continue;
            }

            let content = match std::fs::read(path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    warn!("无法读取 {}：{}", path.display(), e);
                    report.skipped.push(SkippedUnit {
                        path: path.to_path_buf(),
                        reason: SkipReason::Unreadable(e.to_string()),
                    });
                    continue;
                }
            };

            let declared_imports = declared_imports(&content);
            if let Some(module) = self.exclusions.first_excluded(&declared_imports) {
                info!("跳过 {}：依赖不可用模块 {}", path.display(), module);
                report.skipped.push(SkippedUnit {
                    path: path.to_path_buf(),
                    reason: SkipReason::ExcludedCapability(module.to_string()),
                });
                continue;
            }

            let key = derive_key(&report.registry, path);
            if file_name.contains(&self.common_rules_marker) {
                info!("发现通用规则文件：{}", path.display());
            }

            let unit = RuleUnit {
                key,
                path: path.to_path_buf(),
                declared_imports,
            };
            if let Err(unit) = report.registry.insert(unit) {
                // derive_key 已保证唯一，此处仅防御
                warn!("规则 key 冲突，忽略：{} -> {}", unit.key, unit.path.display());
            }
        }

        info!(
            "规则收集完成：待编译 {} 个，跳过 {} 个（不可读 {}、依赖不可用模块 {}、索引文件 {}）",
            report.registry.len(),
            report.skipped.len(),
            report.skipped_count(|r| matches!(r, SkipReason::Unreadable(_))),
            report.skipped_count(|r| matches!(r, SkipReason::ExcludedCapability(_))),
            report.skipped_count(|r| matches!(r, SkipReason::IndexUnit)),
        );

        Ok(report)
    }

    fn is_rule_file(&self, file_name: &str) -> bool {
        self.extensions.iter().any(|ext| file_name.ends_with(ext.as_str()))
    }
}

/// 普通文件或指向文件的符号链接（悬空链接也算，读取时按不可读处理）
///
/// 指向目录的符号链接不跟随遍历。
pub(crate) fn is_file_entry(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    if file_type.is_file() {
        return true;
    }
    file_type.is_symlink() && !entry.path().is_dir()
}

/// 提取源码中声明的 import 模块
pub fn declared_imports(content: &str) -> BTreeSet<String> {
    IMPORT_DECL
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// 派生注册表 key：文件名（去后缀） -> 父目录名_文件名 -> 父目录名_文件名_N
fn derive_key(registry: &RuleUnitRegistry, path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    if !registry.contains_key(&stem) {
        return stem;
    }

    let parent = path
        .parent()
        .and_then(Path::file_name)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefixed = format!("{}_{}", parent, stem);
    if !registry.contains_key(&prefixed) {
        debug!("规则重名 {}，使用 {}", stem, prefixed);
        return prefixed;
    }

    let mut n = 2usize;
    loop {
        let candidate = format!("{}_{}", prefixed, n);
        if !registry.contains_key(&candidate) {
            warn!("规则二次重名 {}，使用序号后缀 {}（{}）", prefixed, candidate, path.display());
            return candidate;
        }
        n += 1;
    }
}
