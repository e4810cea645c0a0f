//! 检测模块：扫描执行、结果规范化与扫描器封装
pub mod report;
pub mod normalizer;
pub mod executor;
pub mod scanner;
pub mod global;

// 导出核心接口
pub use self::report::{MatchInstance, MatchReport, RuleMatch, ScanError, ScanErrorKind, StringMatch};
pub use self::normalizer::MatchNormalizer;
pub use self::executor::{ScanExecutor, ScanOutcome};
pub use self::scanner::TiaScanner;
pub use self::global::{global_scanner, init_tia, init_tia_with_config, scan_target};
