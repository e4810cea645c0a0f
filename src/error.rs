//! 全局错误类型定义

use std::io::Error as IoError;
use std::path::PathBuf;

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::compiler::EngineError;

#[derive(Error, Debug)]
pub enum TiaError {
    // 规则收集相关错误
    #[error("规则目录不存在：{0}")]
    RuleDirNotFound(PathBuf),
    #[error("未找到可编译的规则文件：{0}")]
    EmptyRegistry(PathBuf),

    // 编译相关错误
    #[error("回退编译存在语法错误：{0}")]
    FallbackSyntaxError(String),
    #[error("规则引擎错误：{0}")]
    EngineError(#[from] EngineError),

    // 缓存相关错误
    #[error("MessagePack序列化/反序列化失败：{0}")]
    MsgPackError(String),

    // 扫描相关错误
    #[error("扫描器未初始化")]
    ScannerNotInitialized,
    #[error("后台任务执行失败：{0}")]
    TaskJoinError(String),

    // 序列化/反序列化错误
    #[error("JSON解析失败：{0}")]
    JsonError(#[from] SerdeJsonError),

    // 基础错误
    #[error("IO操作失败：{0}")]
    IoError(#[from] IoError),
    #[error("无效输入：{0}")]
    InvalidInput(String),
}

// 全局Result类型
pub type TiaResult<T> = Result<T, TiaError>;
