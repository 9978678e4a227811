//! 测试用的脚本化 Transport。
//!
//! 按 URL 预置响应，并记录每次请求，便于断言“没有发起网络请求”。

use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::Mutex;

use super::transport::{Transport, TransportError, TransportResponse};

#[derive(Debug, Clone)]
enum Scripted {
    Body { status: u16, body: Vec<u8> },
    /// 先返回 `prefix`，随后读取失败，模拟传输中断。
    Interrupted { prefix: Vec<u8> },
    ConnectFailure,
}

#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json(self, url: &str, body: &str) -> Self {
        self.with_status(url, 200, body.as_bytes())
    }

    pub fn with_status(self, url: &str, status: u16, body: &[u8]) -> Self {
        self.route(
            url,
            Scripted::Body {
                status,
                body: body.to_vec(),
            },
        );
        self
    }

    pub fn with_interrupted(self, url: &str, prefix: &[u8]) -> Self {
        self.route(
            url,
            Scripted::Interrupted {
                prefix: prefix.to_vec(),
            },
        );
        self
    }

    pub fn with_connect_failure(self, url: &str) -> Self {
        self.route(url, Scripted::ConnectFailure);
        self
    }

    fn route(&self, url: &str, scripted: Scripted) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(url.to_string(), scripted);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == url).count()
    }
}

impl Transport for MockTransport {
    fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }
        let scripted = self
            .routes
            .lock()
            .ok()
            .and_then(|routes| routes.get(url).cloned());

        match scripted {
            Some(Scripted::Body { status, body }) => Ok(TransportResponse {
                status,
                reason: reason(status).to_string(),
                body: Box::new(io::Cursor::new(body)),
            }),
            Some(Scripted::Interrupted { prefix }) => Ok(TransportResponse {
                status: 200,
                reason: "OK".to_string(),
                body: Box::new(io::Cursor::new(prefix).chain(FailingReader)),
            }),
            Some(Scripted::ConnectFailure) => Err(TransportError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
            None => Ok(TransportResponse {
                status: 404,
                reason: "Not Found".to_string(),
                body: Box::new(io::empty()),
            }),
        }
    }
}

struct FailingReader;

impl Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        ))
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "",
    }
}
