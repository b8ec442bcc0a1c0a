use serde::{Deserialize, Serialize};

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
}

/// Slices an already-fetched full result set into one page. The store
/// traits have no server-side pagination (spec §4.3/§4.9 don't call for
/// it), so the `server` crate paginates in memory.
pub fn paginate<T>(mut items: Vec<T>, page: PageQuery) -> Paginated<T> {
    let total = items.len();
    let page_num = page.page.max(1);
    let limit = page.limit.max(1);
    let start = (page_num - 1) * limit;
    if start >= items.len() {
        items.clear();
    } else {
        let end = (start + limit).min(items.len());
        items = items.split_off(start);
        items.truncate(end - start);
    }
    Paginated { items, page: page_num, limit, total }
}
