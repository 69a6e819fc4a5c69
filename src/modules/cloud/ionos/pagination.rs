//! Walking offset/limit paginated listings.

use crate::modules::ModuleResult;
use serde_json::Value;
use tracing::{debug, warn};

/// Page size used by listings that paginate
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// One page of a listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    /// Link to the following page, absent on the last one
    pub next: Option<String>,
}

impl Page {
    pub fn new(items: Vec<Value>, next: Option<String>) -> Self {
        Self { items, next }
    }

    pub fn last(items: Vec<Value>) -> Self {
        Self { items, next: None }
    }
}

/// Fetch every page of a listing, in order.
///
/// `list_fn` is called with `(offset, limit)`; the offset starts at zero and
/// grows by `page_size` after each call until a page carries no next link.
/// A page that links onwards but holds no items also ends the walk. Errors
/// from `list_fn` are returned as they are.
pub fn fetch_all<F>(mut list_fn: F, page_size: u32) -> ModuleResult<Vec<Value>>
where
    F: FnMut(u32, u32) -> ModuleResult<Page>,
{
    let limit = page_size.max(1);
    let mut offset = 0u32;
    let mut items = Vec::new();

    loop {
        debug!(offset, limit, "fetching page");
        let page = list_fn(offset, limit)?;
        let empty = page.items.is_empty();
        items.extend(page.items);

        match page.next {
            None => break,
            Some(next) if empty => {
                warn!(%next, offset, "empty page links to another page, stopping");
                break;
            }
            Some(_) => {}
        }

        offset = match offset.checked_add(limit) {
            Some(offset) => offset,
            None => {
                warn!("listing offset overflowed, stopping");
                break;
            }
        };
    }

    Ok(items)
}
