//! Page requests and paged results

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default page size when the caller does not supply one
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound applied to caller-supplied page sizes
pub const MAX_PAGE_SIZE: u32 = 100;

/// 1-based page request as bound from a query string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Validate)]
pub struct PageRequest {
    #[serde(default = "default_page_number")]
    #[validate(range(min = 1))]
    pub page_number: u32,

    #[serde(default = "default_page_size")]
    #[validate(range(min = 1))]
    pub page_size: u32,
}

fn default_page_number() -> u32 {
    1
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page_number: u32, page_size: u32) -> Self {
        Self {
            page_number,
            page_size,
        }
    }

    /// Normalizes out-of-range values instead of rejecting them
    ///
    /// Page numbers below 1 become 1; page sizes are clamped to
    /// `1..=max_page_size`.
    pub fn clamped(self, max_page_size: u32) -> Self {
        Self {
            page_number: self.page_number.max(1),
            page_size: self.page_size.clamp(1, max_page_size.max(1)),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page_number.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// One page of results with totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_number: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_count: u64) -> Self {
        let page_size = u64::from(request.page_size.max(1));
        let total_pages = total_count.div_ceil(page_size);
        let page_number = u64::from(request.page_number);
        Self {
            items,
            page_number: request.page_number,
            page_size: request.page_size,
            total_count,
            total_pages,
            has_previous: page_number > 1,
            has_next: page_number < total_pages,
        }
    }

    /// Converts the items while keeping the totals
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page_number: self.page_number,
            page_size: self.page_size,
            total_count: self.total_count,
            total_pages: self.total_pages,
            has_previous: self.has_previous,
            has_next: self.has_next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        assert!(PageRequest::new(1, 10).validate().is_ok());
        assert!(PageRequest::new(0, 10).validate().is_err());
        assert!(PageRequest::new(1, 0).validate().is_err());
    }

    #[test]
    fn test_clamped() {
        let page = PageRequest::new(0, 5000).clamped(MAX_PAGE_SIZE);
        assert_eq!(page, PageRequest::new(1, 100));
        assert_eq!(PageRequest::new(3, 25).offset(), 50);
    }

    #[test]
    fn test_page_totals() {
        let page = Page::new(vec![1, 2], PageRequest::new(2, 2), 5);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_previous);
        assert!(page.has_next);

        let last = Page::new(vec![5], PageRequest::new(3, 2), 5);
        assert!(!last.has_next);

        let empty: Page<i32> = Page::new(vec![], PageRequest::default(), 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
    }

    #[test]
    fn test_defaults_from_query() {
        let page: PageRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(page, PageRequest::default());
    }
}
