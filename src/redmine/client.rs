use tracing::debug;

use super::models::{Issue, IssueEnvelope};
use super::transport::{Transport, TransportResponse};
use crate::error::SyncError;

/// 单个 issue 的查询结果。
#[derive(Debug)]
pub enum IssueLookup {
    Found(Issue),
    /// 404/403：不存在，或当前 API key 无权查看。
    NotVisible(u16),
}

pub struct RedmineClient<T> {
    transport: T,
    base_url: String,
}

impl<T: Transport> RedmineClient<T> {
    pub fn new(base_url: &str, transport: T) -> Self {
        Self {
            transport,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn issue_url(&self, id: u64) -> String {
        format!("{}/issues/{}.json?include=attachments", self.base_url, id)
    }

    pub fn fetch_issue(&self, id: u64) -> Result<IssueLookup, SyncError> {
        let url = self.issue_url(id);
        let resp = self.get(&url)?;

        if resp.status == 404 || resp.status == 403 {
            debug!("issue {} not visible ({})", id, resp.status);
            return Ok(IssueLookup::NotVisible(resp.status));
        }
        if resp.status >= 400 {
            return Err(SyncError::Status {
                status: resp.status_line(),
                url,
            });
        }

        let envelope: IssueEnvelope = serde_json::from_reader(resp.body)
            .map_err(|source| SyncError::Decode { url, source })?;
        Ok(IssueLookup::Found(envelope.issue))
    }

    /// 原始 GET，供附件下载与范围探测使用。
    pub fn get(&self, url: &str) -> Result<TransportResponse, SyncError> {
        self.transport
            .get(url)
            .map_err(|source| SyncError::Transport {
                url: url.to_string(),
                source,
            })
    }
}
