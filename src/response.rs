use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

/// Body shape shared by every response: either `data` (+ optional `meta`) or `error`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

impl<T: Serialize> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            data: Some(data),
            meta: None,
            error: None,
        }
    }

    pub fn page(data: T, meta: PageMeta) -> Self {
        Self {
            data: Some(data),
            meta: Some(meta),
            error: None,
        }
    }

    pub fn failure(error: ErrorBody) -> Self {
        Self {
            data: None,
            meta: None,
            error: Some(error),
        }
    }
}

/// A page of results plus the unpaginated total.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

impl<T: Serialize> Page<T> {
    pub fn into_envelope(self) -> Envelope<Vec<T>> {
        let meta = PageMeta {
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        };
        Envelope::page(self.items, meta)
    }
}

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Page/size as requested, with non-positive values replaced by the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
}

impl Pagination {
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE);
        let page_size = page_size.filter(|s| *s > 0).unwrap_or(DEFAULT_PAGE_SIZE);
        Self { page, page_size }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// True when the requested window starts at or past the end of `total` rows.
    pub fn is_past_end(&self, total: i64) -> bool {
        self.offset() >= total
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}
