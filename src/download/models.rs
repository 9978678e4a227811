//! 下载相关的数据模型定义。
//!
//! 包含单个附件的下载结果、issue 范围、进度快照与整次同步的汇总。

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded { path: PathBuf, bytes: u64 },
    /// 目标路径已有文件：不联网、不校验内容。
    AlreadyPresent(PathBuf),
}

/// 闭区间 `[start, end]`；`end < start` 时为空。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueRange {
    pub start: u64,
    pub end: u64,
}

impl IssueRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> std::ops::RangeInclusive<u64> {
        self.start..=self.end
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub issues_done: u64,
    pub issues_total: u64,
    pub issues_skipped: u64,
    pub attachments_downloaded: u64,
    pub attachments_present: u64,
    pub bytes_downloaded: u64,
}

/// 一次完整同步的汇总，来自最后一个进度快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub issues_checked: u64,
    pub issues_skipped: u64,
    pub attachments_downloaded: u64,
    pub attachments_present: u64,
    pub bytes_downloaded: u64,
}

impl From<ProgressSnapshot> for SyncReport {
    fn from(s: ProgressSnapshot) -> Self {
        Self {
            issues_checked: s.issues_done,
            issues_skipped: s.issues_skipped,
            attachments_downloaded: s.attachments_downloaded,
            attachments_present: s.attachments_present,
            bytes_downloaded: s.bytes_downloaded,
        }
    }
}
