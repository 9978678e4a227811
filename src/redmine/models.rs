//! Redmine REST API 的数据模型。
//!
//! 见 <http://www.redmine.org/projects/redmine/wiki/Rest_Issues#Showing-an-issue>。
//! 同步只用到 issue id 与附件列表，其余字段原样保留。

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[allow(dead_code)]
pub struct NamedRef {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

/// `GET /issues/{id}.json` 的外层包装。
#[derive(Debug, Clone, Deserialize)]
pub struct IssueEnvelope {
    pub issue: Issue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub id: u64,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub project: Option<NamedRef>,
    #[serde(default)]
    #[allow(dead_code)]
    pub tracker: Option<NamedRef>,
    #[serde(default)]
    #[allow(dead_code)]
    pub status: Option<NamedRef>,
    #[serde(default)]
    #[allow(dead_code)]
    pub author: Option<NamedRef>,
    #[serde(default)]
    #[allow(dead_code)]
    pub created_on: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub updated_on: Option<String>,
    /// journals / custom_fields / changesets 等：不解析，仅透传。
    #[serde(flatten)]
    #[allow(dead_code)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    #[allow(dead_code)]
    pub id: u64,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub filesize: u64,
    #[serde(default)]
    #[allow(dead_code)]
    pub content_type: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub description: Option<String>,
    pub content_url: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub author: Option<NamedRef>,
    #[serde(default)]
    #[allow(dead_code)]
    pub created_on: Option<String>,
}

/// `GET /issues.json` 列表接口，仅用于求最大 issue id。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueList {
    #[serde(default)]
    pub issues: Vec<IssueStub>,
    #[serde(default)]
    #[allow(dead_code)]
    pub total_count: Option<u64>,
    #[serde(default)]
    #[allow(dead_code)]
    pub offset: Option<u64>,
    #[serde(default)]
    #[allow(dead_code)]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IssueStub {
    pub id: u64,
}

impl IssueList {
    pub fn max_id(&self) -> Option<u64> {
        self.issues.iter().map(|i| i.id).max()
    }
}
