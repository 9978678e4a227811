//! 附件下载：计算目标路径，已存在则跳过，否则经临时文件下载后 rename 到位。

use std::fs::{self, DirBuilder};
use std::io;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use reqwest::Url;
use tracing::info;

use super::models::DownloadOutcome;
use crate::error::SyncError;
use crate::redmine::client::RedmineClient;
use crate::redmine::transport::Transport;

pub const DOWNLOAD_PREFIX: &str = "attachments/download";
const TEMP_PREFIX: &str = "redminesync-";

/// `{root}/{issue}/{content_url 路径去掉 attachments/download}`。
pub fn destination_path(
    content_url: &str,
    sync_root: &Path,
    issue_id: u64,
) -> Result<PathBuf, SyncError> {
    let malformed = || SyncError::MalformedAttachmentUrl(content_url.to_string());

    let url = Url::parse(content_url).map_err(|_| malformed())?;
    let path = url.path();
    let Some(idx) = path.find(DOWNLOAD_PREFIX) else {
        return Err(malformed());
    };
    let stripped = format!("{}{}", &path[..idx], &path[idx + DOWNLOAD_PREFIX.len()..]);

    let mut dst = sync_root.join(issue_id.to_string());
    let mut segments = 0usize;
    for raw in stripped.split('/') {
        if raw.is_empty() || raw == "." {
            continue;
        }
        let segment = percent_decode_str(raw)
            .decode_utf8()
            .map_err(|_| malformed())?;
        if segment == ".." || segment.contains('/') || segment.contains('\\') {
            return Err(malformed());
        }
        dst.push(segment.as_ref());
        segments += 1;
    }
    if segments == 0 {
        return Err(malformed());
    }
    Ok(dst)
}

pub struct AttachmentDownloader<'a, T> {
    client: &'a RedmineClient<T>,
    sync_root: PathBuf,
    temp_dir: PathBuf,
}

impl<'a, T: Transport> AttachmentDownloader<'a, T> {
    pub fn new(client: &'a RedmineClient<T>, sync_root: PathBuf, temp_dir: PathBuf) -> Self {
        Self {
            client,
            sync_root,
            temp_dir,
        }
    }

    pub fn sync_root(&self) -> &Path {
        &self.sync_root
    }

    pub fn download(&self, content_url: &str, issue_id: u64) -> Result<DownloadOutcome, SyncError> {
        let dst = destination_path(content_url, &self.sync_root, issue_id)?;

        match fs::symlink_metadata(&dst) {
            Ok(_) => {
                info!("already downloaded: {}", dst.display());
                return Ok(DownloadOutcome::AlreadyPresent(dst));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(SyncError::io(&dst, e)),
        }

        if let Some(parent) = dst.parent() {
            create_dir_all(parent)?;
        }

        let bytes = self.fetch_to(content_url, &dst)?;
        info!("downloaded [{}]: {}", bytes, content_url);
        Ok(DownloadOutcome::Downloaded { path: dst, bytes })
    }

    fn fetch_to(&self, content_url: &str, dst: &Path) -> Result<u64, SyncError> {
        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.temp_dir)
            .map_err(|e| SyncError::io(&self.temp_dir, e))?;

        let mut resp = self.client.get(content_url)?;
        if !resp.is_ok() {
            return Err(SyncError::Status {
                status: format!("bad status: {}", resp.status_line()),
                url: content_url.to_string(),
            });
        }

        let bytes = io::copy(&mut resp.body, tmp.as_file_mut()).map_err(|e| {
            SyncError::Transport {
                url: content_url.to_string(),
                source: e.into(),
            }
        })?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| SyncError::io(tmp.path(), e))?;

        let from = tmp.path().to_path_buf();
        tmp.persist(dst).map_err(|e| SyncError::Rename {
            from,
            to: dst.to_path_buf(),
            source: e.error,
        })?;
        Ok(bytes)
    }
}

fn create_dir_all(dir: &Path) -> Result<(), SyncError> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(dir).map_err(|e| SyncError::io(dir, e))
}
