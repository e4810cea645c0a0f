//! 扫描器核心：整合收集、编译、执行与规范化，输出扫描报告
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::executor::{ScanExecutor, ScanOutcome};
use super::normalizer::MatchNormalizer;
use super::report::{MatchReport, ScanError};
use crate::compiler::{RuleEngine, RuleSetCompiler, RuleSetOrigin, YaraXEngine};
use crate::config::GlobalConfig;
use crate::error::{TiaError, TiaResult};
use crate::rule::{CachedRuleSet, RuleSetCache};
use crate::utils::RuleDirFingerprint;

/// 规则扫描器（规则集编译一次，可并发扫描多个目标）
pub struct TiaScanner<E: RuleEngine = YaraXEngine> {
    engine: Arc<E>,
    rules: Arc<E::Compiled>,
    origin: RuleSetOrigin,
    config: GlobalConfig,
}

impl TiaScanner<YaraXEngine> {
    /// 使用 YARA-X 引擎创建扫描器
    pub async fn new(config: GlobalConfig) -> TiaResult<Self> {
        Self::with_engine(config, YaraXEngine::new()).await
    }
}

impl<E: RuleEngine> TiaScanner<E> {
    /// 使用指定引擎创建扫描器（优先本地缓存，缓存失效则重新编译）
    pub async fn with_engine(config: GlobalConfig, engine: E) -> TiaResult<Self> {
        config.validate()?;
        if !config.rules_dir.is_dir() {
            return Err(TiaError::RuleDirNotFound(config.rules_dir.clone()));
        }

        let engine = Arc::new(engine);
        let (rules, origin) = Self::build_rules(&config, Arc::clone(&engine)).await?;

        Ok(Self {
            engine,
            rules: Arc::new(rules),
            origin,
            config,
        })
    }

    async fn build_rules(
        config: &GlobalConfig,
        engine: Arc<E>,
    ) -> TiaResult<(E::Compiled, RuleSetOrigin)> {
        // 1. 优先加载本地缓存
        let fingerprint = match &config.cache_path {
            Some(cache_path) => {
                let fingerprint = Self::fingerprint(config).await?;
                match RuleSetCache::load_from_cache(cache_path, fingerprint).await {
                    Ok(Some(cached)) => match engine.import(&cached.payload) {
                        Ok(rules) => {
                            debug!("从本地缓存加载规则集成功：{}", cache_path.display());
                            return Ok((rules, cached.origin));
                        }
                        Err(e) => warn!("缓存规则集导入失败，将重新编译：{}", e),
                    },
                    Ok(None) => debug!("规则目录已变化，将重新编译"),
                    Err(e) => warn!("本地缓存不存在或损坏，将重新编译：{}", e),
                }
                Some(fingerprint)
            }
            None => None,
        };

        // 2. 编译规则集
        let compiled = {
            let engine = Arc::clone(&engine);
            let config = config.clone();
            tokio::task::spawn_blocking(move || {
                RuleSetCompiler::new(engine.as_ref(), &config).compile(&config.rules_dir)
            })
            .await
            .map_err(|e| TiaError::TaskJoinError(e.to_string()))??
        };

        // 3. 缓存到本地
        if let (Some(cache_path), Some(fingerprint)) = (&config.cache_path, fingerprint) {
            match engine.export(&compiled.rules) {
                Ok(payload) => {
                    let cached = CachedRuleSet::new(fingerprint, compiled.origin.clone(), payload);
                    if let Err(e) = RuleSetCache::save_to_cache(cache_path, &cached).await {
                        warn!("规则集缓存到本地失败：{}", e);
                    } else {
                        debug!("规则集已缓存到本地");
                    }
                }
                Err(e) => warn!("规则集导出失败，跳过缓存：{}", e),
            }
        }

        Ok((compiled.rules, compiled.origin))
    }

    async fn fingerprint(config: &GlobalConfig) -> TiaResult<u64> {
        let config = config.clone();
        tokio::task::spawn_blocking(move || RuleDirFingerprint::compute(&config.rules_dir, &config))
            .await
            .map_err(|e| TiaError::TaskJoinError(e.to_string()))?
    }

    /// 规则集来源（索引 / 回退）
    pub fn origin(&self) -> &RuleSetOrigin {
        &self.origin
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// 扫描单个文件
    pub fn scan_file(&self, target: &Path) -> MatchReport {
        scan_path(self.engine.as_ref(), self.rules.as_ref(), target, self.config.scan_timeout())
    }

    /// 扫描内存数据
    pub fn scan_bytes(&self, target_name: &str, data: &[u8]) -> MatchReport {
        let executor = ScanExecutor::new(self.engine.as_ref(), self.rules.as_ref(), self.config.scan_timeout());
        into_report(target_name, executor.execute_bytes(target_name, data))
    }

    /// 批量扫描：并发数受 max_concurrency 限制，结果与输入顺序一致，单个失败不影响其他目标
    pub async fn scan_batch(&self, targets: Vec<PathBuf>) -> Vec<MatchReport> {
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let timeout = self.config.scan_timeout();
        let mut handles = Vec::with_capacity(targets.len());

        for target in targets {
            let target_name = target.display().to_string();
            let permit = Arc::clone(&semaphore).acquire_owned().await.ok();
            let engine = Arc::clone(&self.engine);
            let rules = Arc::clone(&self.rules);
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                scan_path(engine.as_ref(), rules.as_ref(), &target, timeout)
            });
            handles.push((target_name, handle));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (target_name, handle) in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!("扫描任务异常终止：{}：{}", target_name, e);
                    reports.push(MatchReport::failed(ScanError::exception(
                        target_name,
                        format!("scan task aborted: {}", e),
                    )));
                }
            }
        }

        info!(
            "批量扫描完成：{} 个目标，失败 {} 个，耗时{:?}",
            reports.len(),
            reports.iter().filter(|r| r.is_error()).count(),
            start.elapsed()
        );
        reports
    }
}

fn scan_path<E: RuleEngine>(
    engine: &E,
    rules: &E::Compiled,
    target: &Path,
    timeout: Duration,
) -> MatchReport {
    let executor = ScanExecutor::new(engine, rules, timeout);
    into_report(&target.display().to_string(), executor.execute(target))
}

fn into_report(target_name: &str, outcome: ScanOutcome) -> MatchReport {
    match outcome {
        ScanOutcome::Matched(events) => {
            MatchReport::matched(target_name, MatchNormalizer::normalize(events))
        }
        ScanOutcome::Failed(error) => MatchReport::failed(error),
    }
}
