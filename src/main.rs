//! rsyaratia 命令行入口：编译规则目录并扫描目标文件，输出 JSON 报告
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use rsyaratia::{ConfigManager, CustomConfigBuilder, GlobalConfig, RuleSetOrigin, TiaScanner};

#[derive(Debug, Parser)]
#[command(name = "rsyaratia", version, about = "YARA 规则聚合编译与结构化扫描")]
struct Cli {
    /// 扫描目标文件
    #[arg(required = true)]
    targets: Vec<PathBuf>,
    /// 规则根目录（覆盖配置文件）
    #[arg(short, long)]
    rules: Option<PathBuf>,
    /// JSON 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// 单个目标扫描超时（秒）
    #[arg(short, long)]
    timeout: Option<u64>,
    /// 批量扫描并发数
    #[arg(short, long)]
    jobs: Option<usize>,
    /// 编译结果缓存文件
    #[arg(long)]
    cache: Option<PathBuf>,
    /// 不可用模块（可重复或逗号分隔，覆盖配置文件）
    #[arg(long, value_delimiter = ',')]
    exclude_module: Option<Vec<String>>,
    /// 输出紧凑 JSON
    #[arg(long)]
    compact: bool,
    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn load_config(&self) -> Result<GlobalConfig> {
        let base = match &self.config {
            Some(path) => ConfigManager::load_from_file(path)
                .with_context(|| format!("加载配置文件失败：{}", path.display()))?,
            None => ConfigManager::get_default(),
        };

        let mut builder = CustomConfigBuilder::from_config(base);
        if let Some(rules) = &self.rules {
            builder = builder.rules_dir(rules.clone());
        }
        if let Some(timeout) = self.timeout {
            builder = builder.scan_timeout(timeout);
        }
        if let Some(jobs) = self.jobs {
            builder = builder.max_concurrency(jobs);
        }
        if let Some(cache) = &self.cache {
            builder = builder.cache_path(Some(cache.clone()));
        }
        if let Some(modules) = &self.exclude_module {
            builder = builder.excluded_modules(modules.clone());
        }
        if self.verbose {
            builder = builder.verbose(true);
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // 报告输出到 stdout，日志统一走 stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    init_tracing(config.verbose);

    let rules_dir = config.rules_dir.clone();
    let scanner = TiaScanner::new(config)
        .await
        .with_context(|| format!("规则编译失败：{}", rules_dir.display()))?;

    match scanner.origin() {
        RuleSetOrigin::TrustedIndex { path } => info!("规则集来源：可信索引 {}", path.display()),
        RuleSetOrigin::Fallback { reason, unit_count } => {
            info!("规则集来源：回退聚合（{}），共 {} 个规则文件", reason, unit_count)
        }
    }

    let mut reports = scanner.scan_batch(cli.targets.clone()).await;
    let output = if reports.len() == 1 {
        let report = reports.remove(0);
        if cli.compact {
            report.to_compact_json()?
        } else {
            report.to_pretty_json()?
        }
    } else if cli.compact {
        serde_json::to_string(&reports)?
    } else {
        serde_json::to_string_pretty(&reports)?
    };
    println!("{}", output);

    Ok(())
}
