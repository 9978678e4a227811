//! 求最大 issue 编号（`-t 0` 时使用）。
//!
//! 优先读取按 id 倒序的列表接口；列表接口不可用（403/404）时
//! 退化为对单个 issue 的存在性探测：倍增 + 二分，每次探测检查
//! `GAP_WINDOW` 个连续 id，以越过被删除 issue 留下的空洞。

use tracing::{debug, info};

use super::client::RedmineClient;
use super::models::IssueList;
use super::transport::Transport;
use crate::error::SyncError;

/// 二分结束后继续向后检查的 id 数量。
pub const GAP_WINDOW: u64 = 16;

/// 找到第一个 issue 之后，连续这么多个空窗口才停止倍增。
const MAX_EMPTY_WINDOWS: u32 = 3;

/// 超过此 id 仍未找到任何 issue 时放弃探测。
const FIRST_HIT_LIMIT: u64 = 1 << 20;

const PROBE_LIMIT: u64 = 1 << 40;

pub fn find_max_issue<T: Transport>(client: &RedmineClient<T>) -> Result<u64, SyncError> {
    match max_from_listing(client)? {
        Some(max) => {
            info!("found max issue number via listing: {}", max);
            Ok(max)
        }
        None => {
            debug!("issue listing unavailable, probing issue ids");
            let max = max_by_probing(client)?;
            info!("found max issue number via probing: {}", max);
            Ok(max)
        }
    }
}

pub fn listing_url(base_url: &str) -> String {
    format!("{base_url}/issues.json?status_id=*&sort=id:desc&limit=1")
}

/// `Ok(None)` 表示列表接口不可用，需要探测。
fn max_from_listing<T: Transport>(client: &RedmineClient<T>) -> Result<Option<u64>, SyncError> {
    let url = listing_url(client.base_url());
    let resp = client
        .get(&url)
        .map_err(|e| SyncError::RangeResolution(e.to_string()))?;

    if resp.status == 403 || resp.status == 404 {
        return Ok(None);
    }
    if resp.status >= 400 {
        return Err(SyncError::RangeResolution(format!(
            "{}: {}",
            resp.status_line(),
            url
        )));
    }

    let list: IssueList = serde_json::from_reader(resp.body)
        .map_err(|e| SyncError::RangeResolution(format!("decode {url}: {e}")))?;
    Ok(Some(list.max_id().unwrap_or(0)))
}

fn issue_exists<T: Transport>(client: &RedmineClient<T>, id: u64) -> Result<bool, SyncError> {
    let url = client.issue_url(id);
    let resp = client
        .get(&url)
        .map_err(|e| SyncError::RangeResolution(e.to_string()))?;
    match resp.status {
        200..=299 | 403 => Ok(true),
        404 => Ok(false),
        _ => Err(SyncError::RangeResolution(format!(
            "{}: {}",
            resp.status_line(),
            url
        ))),
    }
}

/// `[start, start + GAP_WINDOW)` 中第一个存在的 id。
fn first_in_window<T: Transport>(
    client: &RedmineClient<T>,
    start: u64,
) -> Result<Option<u64>, SyncError> {
    for id in start..start + GAP_WINDOW {
        if issue_exists(client, id)? {
            return Ok(Some(id));
        }
    }
    Ok(None)
}

fn max_by_probing<T: Transport>(client: &RedmineClient<T>) -> Result<u64, SyncError> {
    // Gallop over powers of two, each probe looking at a whole window.
    // hit = largest id seen existing, miss = first empty window after it.
    let mut hit: Option<u64> = None;
    let mut miss = 0u64;
    let mut empty_in_a_row = 0u32;
    let mut probe = 1u64;
    while probe <= PROBE_LIMIT {
        if hit.is_none() && probe > FIRST_HIT_LIMIT {
            break;
        }
        match first_in_window(client, probe)? {
            Some(id) => {
                hit = Some(id);
                empty_in_a_row = 0;
                probe = (probe * 2).max(id + 1);
            }
            None if hit.is_some() => {
                if empty_in_a_row == 0 {
                    miss = probe;
                }
                empty_in_a_row += 1;
                if empty_in_a_row >= MAX_EMPTY_WINDOWS {
                    break;
                }
                probe *= 2;
            }
            None => probe *= 2,
        }
    }

    let Some(mut hit) = hit else {
        return Err(SyncError::RangeResolution(format!(
            "issue listing unavailable and no issue found below {FIRST_HIT_LIMIT}"
        )));
    };
    if miss <= hit {
        miss = probe.max(hit + 1);
    }

    while miss - hit > 1 {
        let mid = hit + (miss - hit) / 2;
        match first_in_window(client, mid)? {
            Some(id) => {
                hit = id;
                if hit >= miss {
                    miss = hit + 1;
                }
            }
            None => miss = mid,
        }
    }

    // Ids past a deleted run are still reachable; keep scanning while we find them.
    let mut candidate = hit + 1;
    let mut last_hit = hit;
    while candidate <= last_hit + GAP_WINDOW {
        if issue_exists(client, candidate)? {
            last_hit = candidate;
        }
        candidate += 1;
    }
    Ok(last_hit)
}
