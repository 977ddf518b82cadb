use serde::Serialize;

pub(crate) const DEFAULT_LIMIT: i64 = 20;
pub(crate) const MAX_LIMIT: i64 = 100;

/// Resolved `page`/`limit` pair; page is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Page {
    pub(crate) page: i64,
    pub(crate) limit: i64,
}

impl Page {
    pub(crate) fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    pub(crate) fn skip(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Pagination {
    pub(crate) page: i64,
    pub(crate) limit: i64,
    pub(crate) total: i64,
    pub(crate) total_pages: i64,
}

impl Pagination {
    pub(crate) fn new(page: Page, total: i64) -> Self {
        let total_pages = if total <= 0 { 0 } else { (total + page.limit - 1) / page.limit };
        Self { page: page.page, limit: page.limit, total, total_pages }
    }
}

/// Success body shared by the CRUD endpoints.
#[derive(Debug, Serialize)]
pub(crate) struct Envelope<T> {
    pub(crate) success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) pagination: Option<Pagination>,
}

impl<T> Envelope<T> {
    pub(crate) fn data(data: T) -> Self {
        Self { success: true, message: None, data: Some(data), pagination: None }
    }

    pub(crate) fn with_message(message: impl Into<String>, data: T) -> Self {
        Self { success: true, message: Some(message.into()), data: Some(data), pagination: None }
    }

    pub(crate) fn page(items: T, page: Page, total: i64) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(items),
            pagination: Some(Pagination::new(page, total)),
        }
    }
}

impl Envelope<()> {
    pub(crate) fn message(message: impl Into<String>) -> Self {
        Self { success: true, message: Some(message.into()), data: None, pagination: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_clamps() {
        assert_eq!(Page::new(None, None), Page { page: 1, limit: DEFAULT_LIMIT });
        assert_eq!(Page::new(Some(0), Some(1_000)), Page { page: 1, limit: MAX_LIMIT });
        assert_eq!(Page::new(Some(3), Some(10)).skip(), 20);
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = Page::new(Some(1), Some(20));
        assert_eq!(Pagination::new(page, 0).total_pages, 0);
        assert_eq!(Pagination::new(page, 20).total_pages, 1);
        assert_eq!(Pagination::new(page, 41).total_pages, 3);
    }

    #[test]
    fn envelope_omits_empty_fields() {
        let json = serde_json::to_value(Envelope::message("Deleted")).expect("json");
        assert_eq!(json, serde_json::json!({"success": true, "message": "Deleted"}));

        let json = serde_json::to_value(Envelope::page(vec![1, 2], Page::new(Some(2), Some(2)), 5))
            .expect("json");
        assert_eq!(json["pagination"]["totalPages"], 3);
        assert_eq!(json["data"], serde_json::json!([1, 2]));
    }
}
