//! Pagination envelope: windowed view over a collection with first/last/prev/next links.

use crate::query::Window;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Envelope<T> {
    pub offset: u64,
    pub limit: u64,
    pub size: u64,
    pub first: Option<String>,
    pub last: Option<String>,
    pub prev: Option<String>,
    pub next: Option<String>,
    pub items: Vec<T>,
}

/// Links point at `base` with `offset` and `limit` query parameters. All links are null for an empty collection.
/// A window whose end overflows has no next link.
pub fn envelope<T>(base: &str, window: Window, size: u64, items: Vec<T>) -> Envelope<T> {
    let Window { offset, limit } = window;
    let limit = limit.max(1);
    let link = |at: u64| format!("{}?offset={}&limit={}", base, at, limit);
    let non_empty = size > 0;
    let next = offset.checked_add(limit).filter(|end| *end < size);

    Envelope {
        offset,
        limit,
        size,
        first: non_empty.then(|| link(0)),
        last: non_empty.then(|| link((size - 1) / limit * limit)),
        prev: (non_empty && offset != 0).then(|| link(offset.saturating_sub(limit))),
        next: next.map(link),
        items,
    }
}
