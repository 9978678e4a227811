use std::fs;
use std::io::{self, IsTerminal};
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use time::macros::format_description;
use tracing::{error, warn};
use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Exit status used when a second Ctrl-C forces termination.
const INTERRUPTED_EXIT: i32 = 130;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("logging already initialized")]
    AlreadyInitialized,
    #[error("subscriber init failed: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid log file path: {0}")]
    InvalidPath(PathBuf),
    #[error("cannot open log file: {0}")]
    Appender(#[from] InitError),
}

#[derive(Clone, Debug)]
pub struct LogOptions {
    pub verbose: bool,
    pub use_color: bool,
    pub log_file: Option<PathBuf>,
    pub handle_signals: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            use_color: io::stderr().is_terminal(),
            log_file: None,
            handle_signals: true,
        }
    }
}

/// 由 Ctrl-C 置位；同步循环在每个 issue 之前检查。
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct LogSystem {
    guard: Mutex<Option<WorkerGuard>>,
    cancel: CancelFlag,
}

impl LogSystem {
    pub fn init(options: LogOptions) -> Result<Self, LogError> {
        let console_level = console_level(options.verbose);

        let console_layer = fmt::layer()
            .with_target(false)
            .with_level(true)
            .with_ansi(options.use_color)
            .with_writer(io::stderr)
            .with_filter(console_level);

        let (file_layer, guard) = match options.log_file.as_deref() {
            Some(path) => {
                let file_appender = open_log_file(path)?;
                let (file_writer, guard) = non_blocking::NonBlockingBuilder::default()
                    .lossy(false)
                    .finish(file_appender);
                let layer = fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_ansi(false)
                    .with_timer(UtcTime::new(format_description!(
                        "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
                    )))
                    .with_writer(file_writer)
                    .with_filter(LevelFilter::DEBUG);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("global subscriber") || msg.contains("already") {
                    LogError::AlreadyInitialized
                } else {
                    LogError::SubscriberInit(e)
                }
            })?;

        let system = Self {
            guard: Mutex::new(guard),
            cancel: CancelFlag::default(),
        };
        if options.handle_signals {
            system.install_signal_handler();
        }
        install_panic_hook();
        Ok(system)
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    fn install_signal_handler(&self) {
        let cancel = self.cancel.clone();
        let result = ctrlc::set_handler(move || {
            if cancel.is_cancelled() {
                std::process::exit(INTERRUPTED_EXIT);
            }
            warn!("interrupt received, stopping after the current issue (press Ctrl-C again to quit now)");
            cancel.cancel();
        });
        if let Err(err) = result {
            warn!("cannot install Ctrl-C handler: {err}");
        }
    }

    /// 刷新并关闭文件日志。
    pub fn flush(&self) {
        if let Ok(mut guard) = self.guard.lock() {
            guard.take();
        }
    }
}

impl Drop for LogSystem {
    fn drop(&mut self) {
        self.flush();
    }
}

/// WARN by default; `-verbose` adds the per-attachment INFO lines.
pub fn console_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::INFO
    } else {
        LevelFilter::WARN
    }
}

fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if let Some(location) = info.location() {
            error!("panic at {}:{}: {}", location.file(), location.line(), info);
        } else {
            error!("panic: {info}");
        }
        previous(info);
    }));
}

/// 打开（必要时创建）不轮转的日志文件；失败时返回错误而不是 panic。
fn open_log_file(path: &Path) -> Result<RollingFileAppender, LogError> {
    let (dir, name) = split_log_path(path)?;
    let name = name
        .to_str()
        .ok_or_else(|| LogError::InvalidPath(path.to_path_buf()))?;
    fs::create_dir_all(&dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(&dir)?;
    Ok(appender)
}

fn split_log_path(path: &Path) -> Result<(PathBuf, &std::ffi::OsStr), LogError> {
    let name = path
        .file_name()
        .ok_or_else(|| LogError::InvalidPath(path.to_path_buf()))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((dir, name))
}
