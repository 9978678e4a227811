//! 进度上报与 CLI 进度条管理。

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::models::{DownloadOutcome, IssueRange, ProgressSnapshot};
use crate::base_system::context::Config;

pub(crate) struct ProgressReporter {
    pub(crate) snapshot: ProgressSnapshot,
    pub(crate) cb: Option<Box<dyn FnMut(ProgressSnapshot) + Send>>, // optional observer
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    pub(crate) fn emit(&mut self) {
        if let Some(cb) = self.cb.as_mut() {
            cb(self.snapshot);
        }
    }

    /// 每处理一个 issue 调用一次（包括被跳过的）。
    pub(crate) fn inc_issue(&mut self) {
        self.snapshot.issues_done += 1;
        if let Some(bar) = self.bar.as_ref() {
            bar.inc(1);
        }
        self.emit();
    }

    pub(crate) fn inc_skipped(&mut self) {
        self.snapshot.issues_skipped += 1;
        self.emit();
    }

    pub(crate) fn record(&mut self, outcome: &DownloadOutcome) {
        match outcome {
            DownloadOutcome::Downloaded { bytes, .. } => {
                self.snapshot.attachments_downloaded += 1;
                self.snapshot.bytes_downloaded += bytes;
            }
            DownloadOutcome::AlreadyPresent(_) => {
                self.snapshot.attachments_present += 1;
            }
        }
        self.emit();
    }

    pub(crate) fn finish(&mut self) {
        let Some(bar) = self.bar.take() else {
            return;
        };
        bar.finish_and_clear();
    }

    pub(crate) fn has_bar(&self) -> bool {
        self.bar.is_some()
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.finish();
    }
}

// ── 构造函数 ──────────────────────────────────────────────────

/// `-P` 且非 `-verbose` 时才显示进度条，避免与日志互相打乱。
pub(crate) fn bar_enabled(cfg: &Config) -> bool {
    cfg.show_progress && !cfg.verbose
}

pub(crate) fn make_reporter(
    config: &Config,
    range: IssueRange,
    progress: Option<Box<dyn FnMut(ProgressSnapshot) + Send>>,
) -> ProgressReporter {
    let total = range.len();

    let bar = if bar_enabled(config) && total > 0 {
        let style = ProgressStyle::with_template(
            "{prefix} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr());
        bar.set_style(style);
        bar.set_prefix("issues");
        Some(bar)
    } else {
        None
    };

    let mut reporter = ProgressReporter {
        snapshot: ProgressSnapshot {
            issues_total: total,
            ..ProgressSnapshot::default()
        },
        cb: progress,
        bar,
    };
    reporter.emit();
    reporter
}
