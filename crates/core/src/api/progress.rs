//! Page-completion progress events.

/// Emitted once per finished page (successful or not).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Fraction of pages done, in (0, 1]
    pub progress: f64,
    /// 1-based number of the page just finished
    pub page: usize,
    /// Number of pages in the run
    pub total: usize,
}

impl Progress {
    /// Progress after the page at zero-based `index` of `total`.
    pub fn after_page(index: usize, total: usize) -> Self {
        let page = index + 1;
        Self {
            progress: if total == 0 { 1.0 } else { page as f64 / total as f64 },
            page,
            total,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.page >= self.total
    }
}
