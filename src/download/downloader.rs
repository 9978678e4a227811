//! 同步主流程编排：确定范围 -> 逐个 issue 拉取 -> 逐个附件下载。
//!
//! 严格串行：issue 按 id 升序，附件按 API 返回顺序。

use tracing::{debug, info};

use super::attachment::AttachmentDownloader;
use super::models::{IssueRange, ProgressSnapshot, SyncReport};
use super::progress::make_reporter;
use crate::base_system::context::Config;
use crate::base_system::logging::CancelFlag;
use crate::error::SyncError;
use crate::redmine::client::{IssueLookup, RedmineClient};
use crate::redmine::range::find_max_issue;
use crate::redmine::transport::Transport;

pub struct SyncDriver<'a, T> {
    config: &'a Config,
    client: &'a RedmineClient<T>,
    downloader: AttachmentDownloader<'a, T>,
    cancel: CancelFlag,
    progress: Option<Box<dyn FnMut(ProgressSnapshot) + Send>>,
}

impl<'a, T: Transport> SyncDriver<'a, T> {
    pub fn new(config: &'a Config, client: &'a RedmineClient<T>, cancel: CancelFlag) -> Self {
        Self {
            config,
            client,
            downloader: AttachmentDownloader::new(client, config.sync_root(), config.temp_root()),
            cancel,
            progress: None,
        }
    }

    pub fn with_progress(mut self, cb: Box<dyn FnMut(ProgressSnapshot) + Send>) -> Self {
        self.progress = Some(cb);
        self
    }

    /// `end_issue == 0` 时通过 API 求出上界。
    pub fn resolve_range(&self) -> Result<IssueRange, SyncError> {
        let start = self.config.start_issue;
        let end = if self.config.end_issue == 0 {
            find_max_issue(self.client)?
        } else {
            self.config.end_issue
        };
        Ok(IssueRange::new(start, end))
    }

    pub fn run(&mut self, range: IssueRange) -> Result<SyncReport, SyncError> {
        info!(
            "syncing redmine attachments to {}",
            self.downloader.sync_root().display()
        );
        if range.is_empty() {
            info!("empty issue range {}..={}, nothing to do", range.start, range.end);
        }
        let mut reporter = make_reporter(self.config, range, self.progress.take());

        for id in range.ids() {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            reporter.inc_issue();

            let issue = match self.client.fetch_issue(id)? {
                IssueLookup::Found(issue) => issue,
                IssueLookup::NotVisible(status) => {
                    debug!("skip issue {} ({})", id, status);
                    reporter.inc_skipped();
                    continue;
                }
            };

            debug!(
                "issue {} {:?}: {} attachments",
                issue.id,
                issue.subject.as_deref().unwrap_or_default(),
                issue.attachments.len()
            );
            for attachment in &issue.attachments {
                debug!(
                    "issue {}: {} ({} bytes) -> {}",
                    id, attachment.filename, attachment.filesize, attachment.content_url
                );
                let outcome = self.downloader.download(&attachment.content_url, id)?;
                reporter.record(&outcome);
            }
        }

        reporter.finish();
        let report = SyncReport::from(reporter.snapshot);
        info!(
            "checked {} issues ({} not visible), downloaded {} attachments ({} bytes), {} already present",
            report.issues_checked,
            report.issues_skipped,
            report.attachments_downloaded,
            report.bytes_downloaded,
            report.attachments_present
        );
        Ok(report)
    }
}

/// 完整一次同步：校验配置、求范围、跑循环。
pub fn sync<T: Transport>(
    config: &Config,
    transport: T,
    cancel: CancelFlag,
) -> Result<SyncReport, SyncError> {
    config.validate()?;
    let client = RedmineClient::new(&config.base_url, transport);
    let mut driver = SyncDriver::new(config, &client, cancel);
    let range = driver.resolve_range()?;
    driver.run(range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redmine::mock::MockTransport;
    use crate::redmine::range::listing_url;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const BASE: &str = "https://example.org";

    fn issue_url(id: u64) -> String {
        format!("{BASE}/issues/{id}.json?include=attachments")
    }

    fn issue_json(id: u64, urls: &[&str]) -> String {
        let attachments: Vec<String> = urls
            .iter()
            .map(|u| format!(r#"{{"id": 1, "filename": "f", "content_url": "{u}"}}"#))
            .collect();
        format!(
            r#"{{"issue": {{"id": {id}, "subject": "s", "attachments": [{}]}}}}"#,
            attachments.join(",")
        )
    }

    fn config(root: &Path, tmp: &Path, start: u64, end: u64) -> Config {
        Config {
            base_url: BASE.to_string(),
            api_key: "secret".to_string(),
            sync_dir: root.display().to_string(),
            temp_dir: tmp.display().to_string(),
            start_issue: start,
            end_issue: end,
            ..Config::default()
        }
    }

    fn tree(root: &Path) -> Vec<(String, Vec<u8>)> {
        fn walk(dir: &Path, root: &Path, out: &mut Vec<(String, Vec<u8>)>) {
            let mut entries: Vec<_> = fs::read_dir(dir).unwrap().map(|e| e.unwrap().path()).collect();
            entries.sort();
            for path in entries {
                if path.is_dir() {
                    walk(&path, root, out);
                } else {
                    let rel = path.strip_prefix(root).unwrap().display().to_string();
                    out.push((rel, fs::read(&path).unwrap()));
                }
            }
        }
        let mut out = Vec::new();
        walk(root, root, &mut out);
        out
    }

    #[test]
    fn end_to_end_with_missing_issue() {
        let root = TempDir::new().unwrap();
        let tmp = TempDir::new().unwrap();
        let report_url = "https://example.org/attachments/download/55/report.pdf";
        let mock = MockTransport::new()
            .with_json(&issue_url(1), &issue_json(1, &[report_url]))
            .with_status(&issue_url(2), 404, b"")
            .with_status(report_url, 200, b"quarterly numbers");

        let cfg = config(root.path(), tmp.path(), 1, 2);
        let report = sync(&cfg, &mock, CancelFlag::default()).unwrap();

        assert_eq!(
            fs::read(root.path().join("1/55/report.pdf")).unwrap(),
            b"quarterly numbers"
        );
        assert!(!root.path().join("2").exists());
        assert_eq!(
            report,
            SyncReport {
                issues_checked: 2,
                issues_skipped: 1,
                attachments_downloaded: 1,
                attachments_present: 0,
                bytes_downloaded: 17,
            }
        );
    }

    #[test]
    fn forbidden_issue_creates_no_directory_and_loop_continues() {
        let root = TempDir::new().unwrap();
        let tmp = TempDir::new().unwrap();
        let url = "https://example.org/attachments/download/8/notes.txt";
        let mock = MockTransport::new()
            .with_status(&issue_url(1), 403, b"")
            .with_json(&issue_url(2), &issue_json(2, &[url]))
            .with_status(url, 200, b"n");

        let cfg = config(root.path(), tmp.path(), 1, 2);
        sync(&cfg, &mock, CancelFlag::default()).unwrap();

        assert!(!root.path().join("1").exists());
        assert!(root.path().join("2/8/notes.txt").is_file());
    }

    #[test]
    fn second_run_makes_no_attachment_requests() {
        let root = TempDir::new().unwrap();
        let tmp = TempDir::new().unwrap();
        let a = "https://example.org/attachments/download/3/a.log";
        let b = "https://example.org/attachments/download/4/b.png";
        let mock = MockTransport::new()
            .with_json(&issue_url(1), &issue_json(1, &[a, b]))
            .with_json(&issue_url(3), &issue_json(3, &[]))
            .with_status(a, 200, b"log line")
            .with_status(b, 200, b"\x89PNG");
        let cfg = config(root.path(), tmp.path(), 1, 3);

        sync(&cfg, &mock, CancelFlag::default()).unwrap();
        let first = tree(root.path());
        assert_eq!(mock.calls_to(a), 1);
        assert_eq!(mock.calls_to(b), 1);

        let report = sync(&cfg, &mock, CancelFlag::default()).unwrap();
        assert_eq!(tree(root.path()), first);
        assert_eq!(mock.calls_to(a), 1);
        assert_eq!(mock.calls_to(b), 1);
        assert_eq!(report.attachments_downloaded, 0);
        assert_eq!(report.attachments_present, 2);
    }

    #[test]
    fn issues_are_visited_in_ascending_order() {
        let root = TempDir::new().unwrap();
        let tmp = TempDir::new().unwrap();
        let mock = MockTransport::new();
        let cfg = config(root.path(), tmp.path(), 4, 7);
        sync(&cfg, &mock, CancelFlag::default()).unwrap();
        assert_eq!(
            mock.calls(),
            (4..=7).map(issue_url).collect::<Vec<_>>()
        );
    }

    #[test]
    fn server_error_aborts_the_run() {
        let root = TempDir::new().unwrap();
        let tmp = TempDir::new().unwrap();
        let mock = MockTransport::new().with_status(&issue_url(2), 500, b"");
        let cfg = config(root.path(), tmp.path(), 1, 5);

        let err = sync(&cfg, &mock, CancelFlag::default()).unwrap_err();
        assert!(matches!(err, SyncError::Status { .. }));
        // nothing after the failing issue is requested
        assert_eq!(mock.calls(), vec![issue_url(1), issue_url(2)]);
    }

    #[test]
    fn malformed_attachment_url_aborts_the_run() {
        let root = TempDir::new().unwrap();
        let tmp = TempDir::new().unwrap();
        let mock = MockTransport::new().with_json(
            &issue_url(1),
            &issue_json(1, &["https://example.org/files/9/x.bin"]),
        );
        let cfg = config(root.path(), tmp.path(), 1, 2);
        assert!(matches!(
            sync(&cfg, &mock, CancelFlag::default()),
            Err(SyncError::MalformedAttachmentUrl(_))
        ));
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn resolves_end_when_zero_and_reaches_it() {
        let root = TempDir::new().unwrap();
        let tmp = TempDir::new().unwrap();
        let url = "https://example.org/attachments/download/70/last.txt";
        let mock = MockTransport::new()
            .with_json(&listing_url(BASE), r#"{"issues": [{"id": 3}], "total_count": 2}"#)
            .with_json(&issue_url(3), &issue_json(3, &[url]))
            .with_status(url, 200, b"end");
        let cfg = config(root.path(), tmp.path(), 1, 0);

        let report = sync(&cfg, &mock, CancelFlag::default()).unwrap();
        assert_eq!(report.issues_checked, 3);
        assert!(root.path().join("3/70/last.txt").is_file());
        assert_eq!(mock.calls_to(&issue_url(4)), 0);
    }

    #[test]
    fn resolves_end_by_probing_when_listing_is_forbidden() {
        let root = TempDir::new().unwrap();
        let tmp = TempDir::new().unwrap();
        let url = "https://example.org/attachments/download/91/tail.txt";
        // low ids deleted, a long hole before the newest issue
        let mock = MockTransport::new()
            .with_status(&listing_url(BASE), 403, b"")
            .with_json(&issue_url(20), &issue_json(20, &[]))
            .with_json(&issue_url(21), &issue_json(21, &[]))
            .with_json(&issue_url(50), &issue_json(50, &[url]))
            .with_status(url, 200, b"tail");
        let cfg = config(root.path(), tmp.path(), 1, 0);

        let report = sync(&cfg, &mock, CancelFlag::default()).unwrap();
        assert_eq!(report.issues_checked, 50);
        assert_eq!(report.issues_skipped, 47);
        assert!(root.path().join("50/91/tail.txt").is_file());
    }

    #[test]
    fn probing_without_any_issue_fails_instead_of_syncing_nothing() {
        let root = TempDir::new().unwrap();
        let tmp = TempDir::new().unwrap();
        let mock = MockTransport::new().with_status(&listing_url(BASE), 404, b"");
        let cfg = config(root.path(), tmp.path(), 1, 0);

        assert!(matches!(
            sync(&cfg, &mock, CancelFlag::default()),
            Err(SyncError::RangeResolution(_))
        ));
    }

    #[test]
    fn explicit_end_skips_range_resolution() {
        let root = TempDir::new().unwrap();
        let tmp = TempDir::new().unwrap();
        let mock = MockTransport::new();
        let cfg = config(root.path(), tmp.path(), 1, 1);
        sync(&cfg, &mock, CancelFlag::default()).unwrap();
        assert_eq!(mock.calls_to(&listing_url(BASE)), 0);
    }

    #[test]
    fn missing_credentials_fail_before_any_request() {
        let root = TempDir::new().unwrap();
        let tmp = TempDir::new().unwrap();
        let mock = MockTransport::new();
        let mut cfg = config(root.path(), tmp.path(), 1, 3);
        cfg.api_key.clear();
        assert!(matches!(
            sync(&cfg, &mock, CancelFlag::default()),
            Err(SyncError::Config(_))
        ));
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn cancelled_run_stops_before_next_issue() {
        let root = TempDir::new().unwrap();
        let tmp = TempDir::new().unwrap();
        let mock = MockTransport::new();
        let cfg = config(root.path(), tmp.path(), 1, 3);
        let client = RedmineClient::new(BASE, &mock);
        let cancel = CancelFlag::default();
        let trigger = cancel.clone();

        let mut driver = SyncDriver::new(&cfg, &client, cancel).with_progress(Box::new(
            move |s: ProgressSnapshot| {
                if s.issues_done == 2 {
                    trigger.cancel();
                }
            },
        ));
        let err = driver.run(IssueRange::new(1, 3)).unwrap_err();
        assert!(matches!(err, SyncError::Cancelled));
        assert_eq!(mock.calls(), vec![issue_url(1), issue_url(2)]);
    }
}
