//! redminesync：把 Redmine 上所有可访问的附件镜像到本地目录。
//!
//! 目录结构为 `{sync_dir}/{issue}/{download id}/{filename}`，已存在的文件不会重复下载，
//! 因此中断后直接重新运行即可续传。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/Ctrl-C 等基础设施
//! - `redmine`：HTTP 传输、JSON 模型、issue 拉取与最大编号探测
//! - `download`：附件下载与同步流程编排
//! - `error`：错误分类

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

mod base_system;
mod download;
mod error;
mod redmine;

use base_system::config::load_or_create;
use base_system::context::Config;
use base_system::logging::{LogOptions, LogSystem};
use redmine::transport::HttpTransport;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const AFTER_HELP: &str = "\
The target folder structure will look like:

    DIRECTORY/123/456/file.txt

Where 123 is the issue number and 456 the download id.

Limitation: all issue ids are rechecked on every invocation, since any
issue might have a new upload.";

#[derive(Debug, Parser)]
#[command(name = "redminesync")]
#[command(about = "Downloads all reachable attachments from redmine into a local folder")]
#[command(after_help = AFTER_HELP)]
struct Cli {
    /// redmine base url
    #[arg(short = 'b', value_name = "URL", env = "REDMINE_BASE_URL", hide_env_values = true)]
    base_url: Option<String>,

    /// redmine api key
    #[arg(short = 'k', value_name = "KEY", env = "REDMINE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// target directory [default: <user cache dir>/.redminesync]
    #[arg(short = 'd', value_name = "DIRECTORY")]
    sync_dir: Option<String>,

    /// start with this issue number, might shorten the process [default: 1]
    #[arg(short = 'f', value_name = "INT")]
    from: Option<u64>,

    /// end with this issue number, 0 means find the max issue number [default: 0]
    #[arg(short = 't', value_name = "INT")]
    to: Option<u64>,

    /// be verbose
    #[arg(long, default_value_t = false)]
    verbose: bool,

    /// show progressbar
    #[arg(short = 'P', default_value_t = false)]
    progress: bool,

    /// optional YAML config file, created with defaults if missing
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// 显示版本信息后退出
    #[arg(long, default_value_t = false)]
    version: bool,
}

impl Cli {
    /// 命令行覆盖配置文件中的值。
    fn apply(self, mut config: Config) -> Config {
        if let Some(url) = self.base_url.filter(|s| !s.trim().is_empty()) {
            config.base_url = url;
        }
        if let Some(key) = self.api_key.filter(|s| !s.trim().is_empty()) {
            config.api_key = key;
        }
        if let Some(dir) = self.sync_dir.filter(|s| !s.trim().is_empty()) {
            config.sync_dir = dir;
        }
        if let Some(from) = self.from {
            config.start_issue = from;
        }
        if let Some(to) = self.to {
            config.end_issue = to;
        }
        config.verbose |= self.verbose;
        config.show_progress |= self.progress;
        config
    }
}

/// Accept the historical single-dash `-verbose` spelling.
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| if arg == "-verbose" { OsString::from("--verbose") } else { arg })
        .collect()
}

fn main() -> Result<()> {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));

    if cli.version {
        println!("redminesync v{}", VERSION);
        return Ok(());
    }

    let base = match cli.config.as_deref() {
        Some(path) => load_or_create::<Config>(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => Config::default(),
    };
    let config = cli.apply(base);

    let log = init_logging(&config)?;
    let result = run(&config, &log);
    // anyhow prints the error on exit; keep a copy in the log file.
    if let Err(err) = &result {
        debug!("run failed: {err:#}");
    }
    log.flush();
    result
}

fn run(config: &Config, log: &LogSystem) -> Result<()> {
    let transport = HttpTransport::new(config).context("init http client")?;
    download::downloader::sync(config, transport, log.cancel_flag())?;
    Ok(())
}

fn init_logging(config: &Config) -> Result<LogSystem> {
    let opts = LogOptions {
        verbose: config.verbose,
        log_file: Some(config.log_file.trim())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from),
        ..LogOptions::default()
    };
    LogSystem::init(opts).context("init logging")
}
