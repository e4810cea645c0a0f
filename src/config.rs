//! 全局配置管理,存储所有可配置项

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{TiaError, TiaResult};
use crate::rule::ExclusionSet;

/// 全局配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    // 规则根目录
    pub rules_dir: PathBuf,
    // 可信索引文件名（位于规则根目录下）
    pub index_file: String,
    // 规则文件后缀
    pub rule_extensions: Vec<String>,
    // 当前环境不可用的模块
    pub excluded_modules: Vec<String>,
    // 回退收集时跳过的索引文件标记
    pub index_marker: String,
    // 通用规则文件标记（仅用于日志）
    pub common_rules_marker: String,
    // 单次扫描超时（单位：秒）
    pub scan_timeout: u64,
    // 批量扫描最大并发数
    pub max_concurrency: usize,
    // 编译结果缓存路径（None 表示不缓存）
    pub cache_path: Option<PathBuf>,
    // 是否启用详细日志
    pub verbose: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            rules_dir: PathBuf::from("libs/yara"),
            index_file: "malware_index.yar".to_string(),
            rule_extensions: vec![".yar".to_string(), ".yara".to_string()],
            excluded_modules: vec!["androguard".to_string(), "cuckoo".to_string()],
            index_marker: "index".to_string(),
            common_rules_marker: "000_common_rules".to_string(),
            scan_timeout: 10,
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            cache_path: None,
            verbose: false,
        }
    }
}

impl GlobalConfig {
    /// 由配置构建排除模块集合
    pub fn exclusion_set(&self) -> ExclusionSet {
        ExclusionSet::new(self.excluded_modules.iter().cloned())
    }

    /// 扫描超时
    pub fn scan_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.scan_timeout)
    }

    /// 文件名是否带有规则后缀
    pub fn is_rule_file(&self, file_name: &str) -> bool {
        self.rule_extensions
            .iter()
            .any(|ext| file_name.ends_with(ext.as_str()))
    }

    /// 校验配置合法性
    pub fn validate(&self) -> TiaResult<()> {
        if self.rule_extensions.is_empty() {
            return Err(TiaError::InvalidInput("rule_extensions 不能为空".to_string()));
        }
        if self.index_file.trim().is_empty() {
            return Err(TiaError::InvalidInput("index_file 不能为空".to_string()));
        }
        if self.max_concurrency == 0 {
            return Err(TiaError::InvalidInput("max_concurrency 必须大于 0".to_string()));
        }
        Ok(())
    }
}

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 获取默认配置
    pub fn get_default() -> GlobalConfig {
        GlobalConfig::default()
    }

    /// 自定义配置
    pub fn custom() -> CustomConfigBuilder {
        CustomConfigBuilder::new()
    }

    /// 从JSON文件加载配置（缺省字段使用默认值）
    pub fn load_from_file(path: &Path) -> TiaResult<GlobalConfig> {
        let content = std::fs::read_to_string(path)?;
        let config: GlobalConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}

/// 配置构建器（便于自定义配置）
#[derive(Debug, Clone)]
pub struct CustomConfigBuilder {
    config: GlobalConfig,
}

impl Default for CustomConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: GlobalConfig::default(),
        }
    }

    /// 基于已有配置继续定制
    pub fn from_config(config: GlobalConfig) -> Self {
        Self { config }
    }

    pub fn rules_dir(mut self, dir: PathBuf) -> Self {
        self.config.rules_dir = dir;
        self
    }

    pub fn index_file(mut self, name: String) -> Self {
        self.config.index_file = name;
        self
    }

    pub fn rule_extensions(mut self, extensions: Vec<String>) -> Self {
        self.config.rule_extensions = extensions;
        self
    }

    pub fn excluded_modules(mut self, modules: Vec<String>) -> Self {
        self.config.excluded_modules = modules;
        self
    }

    pub fn scan_timeout(mut self, timeout: u64) -> Self {
        self.config.scan_timeout = timeout;
        self
    }

    pub fn max_concurrency(mut self, jobs: usize) -> Self {
        self.config.max_concurrency = jobs;
        self
    }

    pub fn cache_path(mut self, path: Option<PathBuf>) -> Self {
        self.config.cache_path = path;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn build(self) -> GlobalConfig {
        self.config
    }
}
