//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成配置文件的字段元信息。最终生效的 Config 在 `main`
//! 中合并（命令行 > 环境变量 > 配置文件 > 默认值）后只构造一次，按引用传递。

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};
use crate::error::SyncError;

/// 默认同步目录位于用户缓存目录下的这个子目录。
pub const SYNC_DIR_NAME: &str = ".redminesync";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 服务端配置
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,

    // 路径配置
    #[serde(default)]
    pub sync_dir: String,
    #[serde(default)]
    pub temp_dir: String,

    // 范围配置
    #[serde(default = "default_start_issue")]
    pub start_issue: u64,
    #[serde(default)]
    pub end_issue: u64,

    // 网络配置
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    // 输出配置
    #[serde(default = "default_false")]
    pub verbose: bool,
    #[serde(default = "default_false")]
    pub show_progress: bool,
    #[serde(default)]
    pub log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            sync_dir: String::new(),
            temp_dir: String::new(),
            start_issue: default_start_issue(),
            end_issue: 0,
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
            verbose: default_false(),
            show_progress: default_false(),
            log_file: String::new(),
        }
    }
}

impl ConfigSpec for Config {
    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 12] = [
            FieldMeta {
                name: "base_url",
                description: "Redmine 地址（环境变量 REDMINE_BASE_URL / -b 优先）",
            },
            FieldMeta {
                name: "api_key",
                description: "Redmine API key（环境变量 REDMINE_API_KEY / -k 优先）",
            },
            FieldMeta {
                name: "sync_dir",
                description: "同步目录，留空使用 <用户缓存目录>/.redminesync",
            },
            FieldMeta {
                name: "temp_dir",
                description: "下载临时目录，留空使用系统临时目录；与同步目录不在同一文件系统时 rename 会失败",
            },
            FieldMeta {
                name: "start_issue",
                description: "起始 issue 编号",
            },
            FieldMeta {
                name: "end_issue",
                description: "结束 issue 编号，0 表示自动探测最大编号",
            },
            FieldMeta {
                name: "request_timeout",
                description: "单次请求超时（秒），0 表示不限制",
            },
            FieldMeta {
                name: "connect_timeout",
                description: "连接超时（秒）",
            },
            FieldMeta {
                name: "user_agent",
                description: "User-Agent",
            },
            FieldMeta {
                name: "verbose",
                description: "输出每个下载/跳过的附件",
            },
            FieldMeta {
                name: "show_progress",
                description: "显示进度条（verbose 时不显示）",
            },
            FieldMeta {
                name: "log_file",
                description: "额外写入的日志文件路径，留空不写",
            },
        ];
        &FIELDS
    }
}

impl Config {
    pub fn sync_root(&self) -> PathBuf {
        if self.sync_dir.trim().is_empty() {
            default_sync_dir()
        } else {
            PathBuf::from(self.sync_dir.trim())
        }
    }

    pub fn temp_root(&self) -> PathBuf {
        if self.temp_dir.trim().is_empty() {
            std::env::temp_dir()
        } else {
            PathBuf::from(self.temp_dir.trim())
        }
    }

    /// 在任何网络请求之前调用。
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.api_key.trim().is_empty() {
            return Err(SyncError::Config(
                "REDMINE_API_KEY not defined and -k not given".to_string(),
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(SyncError::Config(
                "REDMINE_BASE_URL not defined and -b not given".to_string(),
            ));
        }
        if self.start_issue == 0 {
            return Err(SyncError::Config(
                "start issue number must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn default_sync_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(SYNC_DIR_NAME)
}

fn default_false() -> bool {
    false
}

fn default_start_issue() -> u64 {
    1
}

fn default_request_timeout() -> u64 {
    300
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("redminesync/{}", env!("CARGO_PKG_VERSION"))
}
