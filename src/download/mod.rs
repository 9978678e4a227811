//! 附件同步模块入口。
//!
//! 子模块：
//! - `models`：数据模型（DownloadOutcome / IssueRange / ProgressSnapshot / SyncReport）
//! - `progress`：进度上报与 CLI 进度条
//! - `attachment`：单个附件：路径推导、存在即跳过、临时文件 + rename
//! - `downloader`：同步主流程编排

pub mod attachment;
pub mod downloader;
pub mod models;
pub(crate) mod progress;
