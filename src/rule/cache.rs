//! 规则集编译缓存
//! 将引擎导出的编译结果连同规则目录指纹以 MessagePack 格式保存到本地

use std::path::Path;

use rmp_serde::{Serializer, from_slice};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compiler::RuleSetOrigin;
use crate::error::{TiaError, TiaResult};

/// 缓存格式版本，结构变化时递增
const CACHE_FORMAT_VERSION: u32 = 1;

/// 缓存条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRuleSet {
    pub format_version: u32,
    pub fingerprint: u64,
    pub origin: RuleSetOrigin,
    /// 引擎导出的编译产物
    pub payload: Vec<u8>,
}

impl CachedRuleSet {
    pub fn new(fingerprint: u64, origin: RuleSetOrigin, payload: Vec<u8>) -> Self {
        Self {
            format_version: CACHE_FORMAT_VERSION,
            fingerprint,
            origin,
            payload,
        }
    }
}

/// 规则集缓存管理器
pub struct RuleSetCache;

impl RuleSetCache {
    /// 从本地缓存加载规则集；指纹或版本不一致时返回 None
    pub async fn load_from_cache(cache_path: &Path, fingerprint: u64) -> TiaResult<Option<CachedRuleSet>> {
        let cache_data = tokio::fs::read(cache_path).await?;

        // MessagePack反序列化
        let cached: CachedRuleSet = from_slice(&cache_data)
            .map_err(|e| TiaError::MsgPackError(format!("反序列化失败：{}", e)))?;

        if cached.format_version != CACHE_FORMAT_VERSION {
            debug!("缓存格式版本不一致：{} != {}", cached.format_version, CACHE_FORMAT_VERSION);
            return Ok(None);
        }
        if cached.fingerprint != fingerprint {
            debug!("规则目录已变化，缓存失效：{:016x} != {:016x}", cached.fingerprint, fingerprint);
            return Ok(None);
        }

        debug!("缓存文件反序列化成功，编译产物大小：{} 字节", cached.payload.len());
        Ok(Some(cached))
    }

    /// 将规则集缓存到本地
    pub async fn save_to_cache(cache_path: &Path, cached: &CachedRuleSet) -> TiaResult<()> {
        let mut cache_data = Vec::new();

        // MessagePack序列化
        cached
            .serialize(&mut Serializer::new(&mut cache_data))
            .map_err(|e| TiaError::MsgPackError(format!("序列化失败：{}", e)))?;

        debug!("规则集序列化成功，序列化后数据大小：{} 字节", cache_data.len());

        if let Some(parent) = cache_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(cache_path, cache_data).await?;
        Ok(())
    }

    /// 清除本地缓存
    pub async fn clear_cache(cache_path: &Path) -> TiaResult<()> {
        if cache_path.exists() {
            tokio::fs::remove_file(cache_path).await?;
        }
        Ok(())
    }
}
