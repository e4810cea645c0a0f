//! 扫描执行器
//! 在超时限制内执行一次匹配，所有失败都转为 ScanError，不向上抛出

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::report::ScanError;
use crate::compiler::{EvalError, MatchEvent, RuleEngine};

/// 单次扫描结果
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Matched(Vec<MatchEvent>),
    Failed(ScanError),
}

/// 扫描执行器
pub struct ScanExecutor<'a, E: RuleEngine> {
    engine: &'a E,
    rules: &'a E::Compiled,
    timeout: Duration,
}

impl<'a, E: RuleEngine> ScanExecutor<'a, E> {
    pub fn new(engine: &'a E, rules: &'a E::Compiled, timeout: Duration) -> Self {
        Self {
            engine,
            rules,
            timeout,
        }
    }

    /// 扫描目标文件（无重试）
    pub fn execute(&self, target: &Path) -> ScanOutcome {
        let target_name = target.display().to_string();
        let data = match std::fs::read(target) {
            Ok(data) => data,
            Err(e) => {
                warn!("无法读取扫描目标 {}：{}", target_name, e);
                return ScanOutcome::Failed(ScanError::exception(target_name, e.to_string()));
            }
        };
        self.execute_bytes(&target_name, &data)
    }

    /// 扫描内存中的目标内容
    pub fn execute_bytes(&self, target_name: &str, data: &[u8]) -> ScanOutcome {
        let start = Instant::now();
        match self.engine.evaluate(self.rules, data, self.timeout) {
            Ok(events) => {
                debug!(
                    "扫描完成：{}，{} 字节，命中 {} 条规则，耗时{:?}",
                    target_name,
                    data.len(),
                    events.len(),
                    start.elapsed()
                );
                ScanOutcome::Matched(events)
            }
            Err(EvalError::Timeout) => {
                warn!("扫描超时（{:?}）：{}", self.timeout, target_name);
                ScanOutcome::Failed(ScanError::timeout(target_name))
            }
            Err(EvalError::Failed(message)) => {
                warn!("扫描失败：{}：{}", target_name, message);
                ScanOutcome::Failed(ScanError::exception(target_name, message))
            }
        }
    }
}
