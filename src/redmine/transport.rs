//! HTTP 传输层：对 Redmine 的所有请求都经过 [`Transport`]。
//!
//! 生产环境使用基于 reqwest blocking client 的 [`HttpTransport`]，
//! 测试中替换为脚本化的 mock。

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CONNECTION, HeaderMap, HeaderValue, USER_AGENT};
use thiserror::Error;
use tracing::debug;

use crate::base_system::context::Config;

pub const API_KEY_HEADER: &str = "X-Redmine-API-Key";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),
}

pub struct TransportResponse {
    pub status: u16,
    pub reason: String,
    pub body: Box<dyn Read + Send>,
}

impl TransportResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// `"404 Not Found"` 形式的状态描述，用于错误信息。
    pub fn status_line(&self) -> String {
        if self.reason.is_empty() {
            self.status.to_string()
        } else {
            format!("{} {}", self.status, self.reason)
        }
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

pub trait Transport {
    /// 发起一次已鉴权的 GET。非 2xx 状态不视为错误，由调用方判断。
    fn get(&self, url: &str) -> Result<TransportResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        (**self).get(url)
    }
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        // reqwest is built without the gzip decoder; ask for raw bytes.
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|_| TransportError::InvalidHeader("User-Agent"))?,
        );
        let mut key = HeaderValue::from_str(config.api_key.trim())
            .map_err(|_| TransportError::InvalidHeader(API_KEY_HEADER))?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);

        let mut builder = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(config.connect_timeout.max(1)));
        builder = if config.request_timeout > 0 {
            builder.timeout(Duration::from_secs(config.request_timeout))
        } else {
            builder.timeout(None)
        };

        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        debug!("GET {}", url);
        let resp = self.client.get(url).send()?;
        let status = resp.status();
        debug!("GET {} -> {}", url, status.as_u16());
        Ok(TransportResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body: Box::new(resp),
        })
    }
}
