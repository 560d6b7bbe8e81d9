//! Page window for list endpoints

use crate::error::{AppError, AppResult};

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
    /// Rows to skip
    pub offset: i64,
}

impl Pagination {
    /// Normalize query paging. Pages whose offset does not fit in an i64
    /// are rejected rather than wrapped.
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> AppResult<Self> {
        let page = page.unwrap_or(1).max(1);
        let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
        let offset = (page - 1)
            .checked_mul(per_page)
            .ok_or_else(|| AppError::BadRequest(format!("Page {} is out of range", page)))?;
        Ok(Self { page, per_page, offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_clamping() {
        assert_eq!(
            Pagination::new(None, None).unwrap(),
            Pagination { page: 1, per_page: 20, offset: 0 }
        );
        assert_eq!(
            Pagination::new(Some(-4), Some(1000)).unwrap(),
            Pagination { page: 1, per_page: 200, offset: 0 }
        );
        assert_eq!(Pagination::new(Some(3), Some(25)).unwrap().offset, 50);
    }

    #[test]
    fn test_huge_page_rejected() {
        assert!(matches!(
            Pagination::new(Some(i64::MAX), Some(20)),
            Err(AppError::BadRequest(_))
        ));
        // Largest page that still fits
        let last = i64::MAX / 200 + 1;
        assert_eq!(Pagination::new(Some(last), Some(200)).unwrap().page, last);
    }
}
