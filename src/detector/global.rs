//! 全局扫描器单例管理
use std::path::Path;

use once_cell::sync::Lazy;
use tokio::sync::OnceCell;

use super::report::MatchReport;
use super::scanner::TiaScanner;
use crate::config::{ConfigManager, GlobalConfig};
use crate::error::{TiaError, TiaResult};

/// 全局扫描器实例
static GLOBAL_SCANNER: Lazy<OnceCell<TiaScanner>> = Lazy::new(OnceCell::new);

/// 初始化全局扫描器（默认配置）
pub async fn init_tia() -> TiaResult<()> {
    init_tia_with_config(ConfigManager::get_default()).await
}

/// 带自定义配置初始化全局扫描器；重复调用直接返回
pub async fn init_tia_with_config(config: GlobalConfig) -> TiaResult<()> {
    GLOBAL_SCANNER
        .get_or_try_init(|| TiaScanner::new(config))
        .await?;
    Ok(())
}

/// 获取全局扫描器
pub fn global_scanner() -> TiaResult<&'static TiaScanner> {
    GLOBAL_SCANNER.get().ok_or(TiaError::ScannerNotInitialized)
}

/// 使用全局扫描器扫描单个文件
pub fn scan_target(target: &Path) -> TiaResult<MatchReport> {
    Ok(global_scanner()?.scan_file(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_before_init_is_error() {
        // 本模块测试不初始化全局实例
        if GLOBAL_SCANNER.get().is_none() {
            assert!(matches!(
                scan_target(Path::new("/tmp/sample.bin")),
                Err(TiaError::ScannerNotInitialized)
            ));
        }
    }
}
