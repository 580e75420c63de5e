//! Paging, filtering and sorting options for catalog reads.
//!
//! The SQL fragments produced here only ever contain fixed column names and
//! keywords; values are never interpolated.

use serde::{Deserialize, Serialize};

/// Page-based window over a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub total_items: u64,
    pub total_pages: u64,
    /// Zero-based.
    pub current_page: u64,
    pub page_size: u64,
}

impl Paging {
    pub fn new(current_page: u64, page_size: u64) -> Self {
        Self {
            total_items: 0,
            total_pages: 0,
            current_page,
            page_size,
        }
    }

    /// Rows skipped before this page. Saturates at `u64::MAX`.
    pub fn offset(&self) -> u64 {
        self.page_size.saturating_mul(self.current_page)
    }

    /// `None` when the offset does not fit in a `u64`.
    pub fn checked_offset(&self) -> Option<u64> {
        self.page_size.checked_mul(self.current_page)
    }

    /// Record the total row count and recompute the page count.
    pub fn set_total_items(&mut self, total: u64) {
        self.total_items = total;
        self.total_pages = if self.page_size == 0 {
            0
        } else {
            total.div_ceil(self.page_size)
        };
    }

    pub fn has_next(&self) -> bool {
        self.current_page.saturating_add(1) < self.total_pages
    }

    pub fn next_page(&self) -> Self {
        Self {
            current_page: self.current_page.saturating_add(1),
            ..*self
        }
    }
}

impl Default for Paging {
    fn default() -> Self {
        Self::new(0, 100)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub favorites_only: bool,
}

impl Filter {
    pub fn favorites() -> Self {
        Self {
            favorites_only: true,
        }
    }

    /// WHERE clause (including the keyword) or an empty string.
    pub fn to_sql(&self) -> &'static str {
        if self.favorites_only {
            " WHERE favorite = 1"
        } else {
            ""
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortField {
    #[default]
    Name,
    Random,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn keyword(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Sort {
    pub fn by_name(direction: SortDirection) -> Self {
        Self {
            field: SortField::Name,
            direction,
        }
    }

    pub fn random() -> Self {
        Self {
            field: SortField::Random,
            direction: SortDirection::Asc,
        }
    }

    /// ORDER BY clause. Random order ignores the direction.
    pub fn to_sql(&self) -> String {
        match self.field {
            SortField::Name => {
                let dir = self.direction.keyword();
                format!(" ORDER BY name COLLATE NOCASE {dir}, id {dir}")
            }
            SortField::Random => " ORDER BY RANDOM()".to_owned(),
        }
    }
}

/// Filter, sort and paging applied to a single read.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOpts {
    pub paging: Paging,
    pub filter: Filter,
    pub sort: Sort,
}

impl QueryOpts {
    pub fn page(current_page: u64, page_size: u64) -> Self {
        Self {
            paging: Paging::new(current_page, page_size),
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }
}

/// Rows of one page together with the paging totals of the whole query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub paging: Paging,
}

impl<T> Page<T> {
    pub fn total_items(&self) -> u64 {
        self.paging.total_items
    }

    pub fn is_last(&self) -> bool {
        !self.paging.has_next()
    }
}
