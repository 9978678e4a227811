//! Redmine REST API 访问层。
//!
//! - `transport`：HTTP 传输抽象与 reqwest 实现（鉴权 header、超时）
//! - `models`：issue / 附件 / 列表的 JSON 模型
//! - `client`：单个 issue 的拉取与 404/403 判定
//! - `range`：最大 issue 编号探测

pub mod client;
pub mod models;
pub mod range;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;
