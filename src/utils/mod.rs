//! 工具模块
pub mod fingerprint;

pub use self::fingerprint::RuleDirFingerprint;
