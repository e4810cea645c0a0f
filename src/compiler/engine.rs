//! 规则匹配引擎抽象
//! 编译/匹配语义由外部引擎提供，这里只约定两个操作及其失败方式

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// 待编译的规则源
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub namespace: String,
    pub path: PathBuf,
}

impl SourceUnit {
    pub fn new(namespace: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            namespace: namespace.into(),
            path: path.into(),
        }
    }
}

/// 引擎编译期错误
#[derive(Error, Debug)]
pub enum EngineError {
    /// 规则语法错误（包括 include 无法解析、未知模块等）
    #[error("{path}: {message}")]
    Syntax { path: PathBuf, message: String },
    #[error("读取规则源失败 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 编译结果导出/导入失败
    #[error("规则序列化失败：{0}")]
    Serialization(String),
}

/// 引擎匹配期错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("扫描超时")]
    Timeout,
    #[error("{0}")]
    Failed(String),
}

/// 元数据原始值
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
}

/// 单次命中
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInstance {
    pub offset: usize,
    pub length: usize,
    pub data: Vec<u8>,
}

/// 单个字符串模式的命中
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternHit {
    pub identifier: String,
    pub instances: Vec<RawInstance>,
}

/// 引擎原生匹配事件（规范化之前）
#[derive(Debug, Clone, PartialEq)]
pub struct MatchEvent {
    pub rule: String,
    pub namespace: String,
    pub tags: Vec<String>,
    pub metadata: Vec<(String, MetaValue)>,
    pub patterns: Vec<PatternHit>,
}

/// 规则匹配引擎
pub trait RuleEngine: Send + Sync + 'static {
    /// 编译产物，编译后只读，可跨线程共享
    type Compiled: Send + Sync + 'static;

    /// 将所有规则源编译为一个规则集，任一源失败则整体失败
    fn compile(&self, units: &[SourceUnit]) -> Result<Self::Compiled, EngineError>;

    /// 在超时限制内对目标字节进行匹配
    fn evaluate(
        &self,
        rules: &Self::Compiled,
        target: &[u8],
        timeout: Duration,
    ) -> Result<Vec<MatchEvent>, EvalError>;

    /// 导出编译产物（用于缓存）
    fn export(&self, rules: &Self::Compiled) -> Result<Vec<u8>, EngineError>;

    /// 导入编译产物
    fn import(&self, bytes: &[u8]) -> Result<Self::Compiled, EngineError>;
}
