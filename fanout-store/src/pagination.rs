//! Page reconstruction over a flattened result set.
//!
//! The cache can only hold one flattened snapshot of a feed per key; it
//! cannot hold a live paginator bound to the current request's page
//! number. [`paginate_slice`] rebuilds a page-accurate view from that
//! snapshot as a pure function over `(items, page size, page request)`.

use serde::{Deserialize, Serialize};

/// Page context resolved by the caller's request layer.
///
/// The page number and the echo-back path are external inputs; nothing
/// in this layer derives them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number. Zero is treated as page one.
    pub page: u32,
    /// Opaque path token echoed back for link construction.
    pub path: Option<String>,
}

impl PageRequest {
    pub fn new(page: u32) -> Self {
        Self { page, path: None }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// One page of a feed, with enough totals to build page links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedPage<T> {
    pub items: Vec<T>,
    /// Size of the full result set, not of this page.
    pub total: usize,
    pub per_page: usize,
    pub current_page: u32,
    pub path: Option<String>,
}

impl<T> FeedPage<T> {
    /// Number of the last non-empty page; at least one.
    pub fn last_page(&self) -> u32 {
        if self.per_page == 0 || self.total == 0 {
            return 1;
        }
        (self.total.div_ceil(self.per_page)) as u32
    }

    pub fn has_more(&self) -> bool {
        self.current_page < self.last_page()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Map the page items to a new type, keeping the page shape.
    pub fn map<U, F>(self, f: F) -> FeedPage<U>
    where
        F: FnMut(T) -> U,
    {
        FeedPage {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            per_page: self.per_page,
            current_page: self.current_page,
            path: self.path,
        }
    }
}

/// Slice a flattened result set into the requested page.
///
/// Out-of-range pages yield an empty page, never an error; the total
/// always reflects the full flattened set.
pub fn paginate_slice<T>(items: Vec<T>, per_page: usize, request: &PageRequest) -> FeedPage<T> {
    let total = items.len();
    let current_page = request.page.max(1);
    let start = (current_page as usize - 1).saturating_mul(per_page);

    let items = if per_page == 0 || start >= total {
        Vec::new()
    } else {
        items.into_iter().skip(start).take(per_page).collect()
    };

    FeedPage {
        items,
        total,
        per_page,
        current_page,
        path: request.path.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(n: usize) -> Vec<usize> {
        (1..=n).collect()
    }

    #[test]
    fn test_middle_page() {
        let page = paginate_slice(numbers(25), 10, &PageRequest::new(2));
        assert_eq!(page.items, (11..=20).collect::<Vec<_>>());
        assert_eq!(page.total, 25);
        assert_eq!(page.last_page(), 3);
        assert!(page.has_more());
    }

    #[test]
    fn test_short_last_page() {
        let page = paginate_slice(numbers(25), 10, &PageRequest::new(3));
        assert_eq!(page.items, (21..=25).collect::<Vec<_>>());
        assert_eq!(page.total, 25);
        assert!(!page.has_more());
    }

    #[test]
    fn test_out_of_range_page_is_empty() {
        let page = paginate_slice(numbers(25), 10, &PageRequest::new(99));
        assert!(page.is_empty());
        assert_eq!(page.total, 25);
        assert_eq!(page.current_page, 99);
    }

    #[test]
    fn test_page_zero_is_page_one() {
        let page = paginate_slice(numbers(5), 2, &PageRequest::new(0));
        assert_eq!(page.items, vec![1, 2]);
        assert_eq!(page.current_page, 1);
    }

    #[test]
    fn test_empty_input() {
        let page = paginate_slice(Vec::<usize>::new(), 10, &PageRequest::new(1));
        assert!(page.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(page.last_page(), 1);
        assert!(!page.has_more());
    }

    #[test]
    fn test_path_is_echoed() {
        let request = PageRequest::new(1).with_path("/inbox");
        let page = paginate_slice(numbers(3), 2, &request);
        assert_eq!(page.path.as_deref(), Some("/inbox"));
    }

    #[test]
    fn test_map_keeps_shape() {
        let page = paginate_slice(numbers(5), 2, &PageRequest::new(2));
        let mapped = page.map(|n| n.to_string());
        assert_eq!(mapped.items, vec!["3".to_string(), "4".to_string()]);
        assert_eq!(mapped.total, 5);
        assert_eq!(mapped.current_page, 2);
    }
}
