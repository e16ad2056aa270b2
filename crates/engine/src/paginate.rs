/// One window over an ordered result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page actually served, after clamping.
    pub page: usize,
    /// Zero only when there are no items.
    pub total_pages: usize,
    pub total_items: usize,
}

impl<T> Page<T> {
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            total_pages: self.total_pages,
            total_items: self.total_items,
        }
    }
}

/// Slice `[(page-1)*size, page*size)` out of `items`. The requested page is
/// clamped into `[1, total_pages]`, so out-of-range requests land on the first
/// or last page. A zero page size is treated as one.
pub fn paginate<T: Clone>(items: &[T], page_number: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_pages = items.len().div_ceil(page_size);
    let page = page_number.clamp(1, total_pages.max(1));
    let start = ((page - 1) * page_size).min(items.len());
    let end = (page * page_size).min(items.len());
    Page {
        items: items[start..end].to_vec(),
        page,
        total_pages,
        total_items: items.len(),
    }
}
