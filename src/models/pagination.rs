use serde::{Deserialize, Serialize};

const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

impl Default for PaginationQuery {
    fn default() -> Self {
        PaginationQuery {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PaginationQuery {
    pub fn validate(&mut self) {
        if self.page < 1 {
            self.page = 1;
        }
        if self.per_page < 1 || self.per_page > MAX_PER_PAGE {
            self.per_page = default_per_page();
        }
    }

    pub fn validated(mut self) -> Self {
        self.validate();
        self
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn meta(&self, total_items: i64) -> PaginationMeta {
        PaginationMeta::new(self.page, self.per_page, total_items)
    }
}

/// Free-text `?search=` filter shared by list endpoints.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PaginationMeta {
    pub current_page: i64,
    pub per_page: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(current_page: i64, per_page: i64, total_items: i64) -> Self {
        let total_pages = if total_items == 0 {
            1
        } else {
            (total_items + per_page - 1) / per_page
        };

        Self {
            current_page,
            per_page,
            total_items,
            total_pages,
        }
    }
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    12
}
