//! 规则目录内容指纹
//! 用于判断编译缓存是否仍与规则源一致

use std::hash::Hasher;
use std::path::Path;

use rustc_hash::FxHasher;
use walkdir::WalkDir;

use crate::config::GlobalConfig;
use crate::error::TiaResult;
use crate::rule::collector::is_file_entry;

/// 规则目录指纹计算
pub struct RuleDirFingerprint;

impl RuleDirFingerprint {
    /// 计算规则目录指纹：所有规则文件的相对路径与内容 + 影响编译结果的配置项
    ///
    /// 无法读取的文件只记录路径，与收集阶段"跳过不可读文件"的行为保持一致。
    pub fn compute(root: &Path, config: &GlobalConfig) -> TiaResult<u64> {
        let mut hasher = FxHasher::default();

        hasher.write(config.index_file.as_bytes());
        hasher.write_u8(0xff);
        hasher.write(config.index_marker.as_bytes());
        hasher.write_u8(0xff);
        for ext in &config.rule_extensions {
            hasher.write(ext.as_bytes());
            hasher.write_u8(0xfe);
        }
        for module in config.exclusion_set().sorted() {
            hasher.write(module.as_bytes());
            hasher.write_u8(0xfd);
        }

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !is_file_entry(&entry) {
                continue;
            }
            if !config.is_rule_file(&entry.file_name().to_string_lossy()) {
                continue;
            }

            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            hasher.write(rel.to_string_lossy().as_bytes());
            hasher.write_u8(0);
            if let Ok(content) = std::fs::read(entry.path()) {
                hasher.write_usize(content.len());
                hasher.write(&content);
            }
        }

        Ok(hasher.finish())
    }
}
