//! Pagination.

use serde::Serialize;

/// Default number of records per page.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// A page request. Page numbers start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    number: u64,
    size: u64,
    count: bool,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            number: 1,
            size: DEFAULT_PAGE_SIZE,
            count: true,
        }
    }
}

impl Page {
    /// Page `number` of [`DEFAULT_PAGE_SIZE`] records. `0` is read as page 1.
    #[must_use]
    pub fn new(number: u64) -> Self {
        Self {
            number: number.max(1),
            ..Self::default()
        }
    }

    /// First `size` records, without a total count.
    #[must_use]
    pub fn limit(size: u64) -> Self {
        Self::new(1).size(size).count(false)
    }

    /// Sets the page size. `0` is read as 1.
    #[must_use]
    pub fn size(mut self, size: u64) -> Self {
        self.size = size.max(1);
        self
    }

    /// Sets whether a total count is queried before the page.
    #[must_use]
    pub const fn count(mut self, count: bool) -> Self {
        self.count = count;
        self
    }

    /// Page number.
    #[must_use]
    pub const fn number(&self) -> u64 {
        self.number
    }

    /// Records per page.
    #[must_use]
    pub const fn page_size(&self) -> u64 {
        self.size
    }

    /// Whether a total count is wanted.
    #[must_use]
    pub const fn wants_count(&self) -> bool {
        self.count
    }

    /// Rows skipped before this page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.number - 1).saturating_mul(self.size)
    }
}

/// One page of records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSet<E> {
    /// Records on this page.
    pub records: Vec<E>,
    /// Page number.
    pub page_number: u64,
    /// Records per page.
    pub page_size: u64,
    /// Total matching records, when counted.
    pub record_count: Option<u64>,
}

impl<E> ResultSet<E> {
    /// Page with no records.
    #[must_use]
    pub const fn empty(page: &Page, record_count: Option<u64>) -> Self {
        Self {
            records: Vec::new(),
            page_number: page.number,
            page_size: page.size,
            record_count,
        }
    }

    /// Number of pages, when counted. A page size of 0 holds every record on
    /// one page.
    #[must_use]
    pub fn page_count(&self) -> Option<u64> {
        self.record_count.map(|total| match self.page_size {
            0 => u64::from(total > 0),
            size => total.div_ceil(size),
        })
    }

    /// Whether the page has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Maps the records, keeping paging data.
    #[must_use]
    pub fn map<T>(self, f: impl FnMut(E) -> T) -> ResultSet<T> {
        ResultSet {
            records: self.records.into_iter().map(f).collect(),
            page_number: self.page_number,
            page_size: self.page_size,
            record_count: self.record_count,
        }
    }
}
