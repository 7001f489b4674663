//! Page windows for the HTML list views.

use serde::Serialize;

pub const DEFAULT_ITEMS_PER_PAGE: usize = 20;

/// Page numbers to render, with `None` standing for an ellipsis.
///
/// Shows `edge` pages at both ends and `before`/`after` pages around the
/// current one.
fn page_window(total_pages: usize, current: usize, edge: usize, before: usize, after: usize) -> Vec<Option<usize>> {
    if total_pages == 0 {
        return Vec::new();
    }

    let mut pages = Vec::new();
    let head_end = (edge + 1).min(total_pages + 1);
    pages.extend((1..head_end).map(Some));

    let middle_start = head_end.max(current.saturating_sub(before));
    let middle_end = (current + after + 1).min(total_pages + 1);
    if middle_start > head_end {
        pages.push(None);
    }
    pages.extend((middle_start..middle_end).map(Some));

    let tail_start = middle_end.max(total_pages.saturating_sub(edge) + 1);
    if tail_start > middle_end {
        pages.push(None);
    }
    pages.extend((tail_start..=total_pages).map(Some));

    pages
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pages: Vec<Option<usize>>,
    pub page: usize,
    pub total_pages: usize,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, current_page: usize, total_pages: usize) -> Self {
        let page = current_page.max(1);
        Self {
            items,
            pages: page_window(total_pages, page, 2, 2, 4),
            page,
            total_pages,
        }
    }

    /// Builds the page from a total row count.
    pub fn from_total(items: Vec<T>, current_page: usize, total: usize, per_page: usize) -> Self {
        Self::new(items, current_page, total.div_ceil(per_page.max(1)))
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_ranges_have_no_gaps() {
        let pages = page_window(3, 2, 2, 2, 4);
        assert_eq!(pages, vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn long_ranges_collapse_into_ellipses() {
        let pages = page_window(20, 10, 2, 2, 4);
        assert_eq!(
            pages,
            vec![
                Some(1),
                Some(2),
                None,
                Some(8),
                Some(9),
                Some(10),
                Some(11),
                Some(12),
                Some(13),
                Some(14),
                None,
                Some(19),
                Some(20)
            ]
        );
    }

    #[test]
    fn page_zero_is_treated_as_first() {
        let page = Paginated::from_total(vec![1, 2], 0, 45, 20);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next());
        assert!(Paginated::<i32>::new(vec![], 1, 0).pages.is_empty());
    }
}
