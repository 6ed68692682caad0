//! Page windows and next/prev metadata

use serde::Serialize;

/// One page of a result set: 1-based page number and page size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub limit: u32,
}

impl PageWindow {
    /// Both values are clamped to at least 1
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    /// Number of matching records before this page
    pub fn skip(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Metadata for this page given the number of matching records
    ///
    /// `next` is set iff records remain past this window, `prev` iff this is
    /// not the first page.
    pub fn pagination(&self, total: u64) -> Pagination {
        let next = (self.skip() + u64::from(self.limit) < total).then(|| PageRef {
            page: self.page + 1,
            limit: self.limit,
        });
        let prev = (self.page > 1).then(|| PageRef {
            page: self.page - 1,
            limit: self.limit,
        });
        Pagination { next, prev }
    }
}

/// A link to a neighbouring page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRef {
    pub page: u32,
    pub limit: u32,
}

/// Pagination block of a list response; absent links are omitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page_of_many() {
        let pagination = PageWindow::new(1, 10).pagination(25);
        assert_eq!(pagination.next, Some(PageRef { page: 2, limit: 10 }));
        assert_eq!(pagination.prev, None);
    }

    #[test]
    fn test_last_partial_page() {
        let window = PageWindow::new(2, 10);
        assert_eq!(window.skip(), 10);
        let pagination = window.pagination(12);
        assert_eq!(pagination.next, None);
        assert_eq!(pagination.prev, Some(PageRef { page: 1, limit: 10 }));
    }

    #[test]
    fn test_exact_fit_has_no_next() {
        let pagination = PageWindow::new(2, 10).pagination(20);
        assert_eq!(pagination.next, None);
    }

    #[test]
    fn test_empty_result() {
        assert_eq!(PageWindow::new(1, 25).pagination(0), Pagination::default());
    }

    #[test]
    fn test_zero_clamped() {
        let window = PageWindow::new(0, 0);
        assert_eq!(window, PageWindow { page: 1, limit: 1 });
        assert_eq!(window.skip(), 0);
    }

    #[test]
    fn test_serialization_omits_absent_links() {
        let json = serde_json::to_value(PageWindow::new(1, 5).pagination(3)).unwrap();
        assert_eq!(json, serde_json::json!({}));

        let json = serde_json::to_value(PageWindow::new(2, 5).pagination(30)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"next": {"page": 3, "limit": 5}, "prev": {"page": 1, "limit": 5}})
        );
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn skip_is_page_minus_one_times_limit(page in 1u32..10_000, limit in 1u32..1_000) {
            let window = PageWindow::new(page, limit);
            prop_assert_eq!(window.skip(), u64::from(page - 1) * u64::from(limit));
        }

        #[test]
        fn next_iff_records_remain(page in 1u32..100, limit in 1u32..100, total in 0u64..20_000) {
            let window = PageWindow::new(page, limit);
            let pagination = window.pagination(total);
            prop_assert_eq!(pagination.next.is_some(), window.skip() + u64::from(limit) < total);
            prop_assert_eq!(pagination.prev.is_some(), page > 1);
            if let Some(next) = pagination.next {
                prop_assert_eq!(next, PageRef { page: page + 1, limit });
            }
            if let Some(prev) = pagination.prev {
                prop_assert_eq!(prev, PageRef { page: page - 1, limit });
            }
        }
    }
}
