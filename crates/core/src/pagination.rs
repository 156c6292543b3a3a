//! Page-size defaults and clamping for list endpoints.

/// Default page size for job and record listings.
pub const DEFAULT_PAGE_LIMIT: i64 = 50;

/// Upper bound on any page size.
pub const MAX_PAGE_LIMIT: i64 = 500;

/// Default page size for the transformed-row preview.
pub const DEFAULT_PREVIEW_PAGE_SIZE: usize = 20;

/// Upper bound on preview page size.
pub const MAX_PREVIEW_PAGE_SIZE: usize = 200;

/// Clamp a user-provided limit to valid bounds.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, max)
}

/// Clamp a user-provided offset to non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

/// Resolve a 1-based preview page into a `(start, len)` slice window.
pub fn preview_window(page: Option<usize>, page_size: Option<usize>) -> (usize, usize) {
    let size = page_size
        .unwrap_or(DEFAULT_PREVIEW_PAGE_SIZE)
        .clamp(1, MAX_PREVIEW_PAGE_SIZE);
    let page = page.unwrap_or(1).max(1);
    ((page - 1) * size, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(clamp_limit(None, 50, 500), 50);
        assert_eq!(clamp_limit(Some(0), 50, 500), 1);
        assert_eq!(clamp_limit(Some(10_000), 50, 500), 500);
    }

    #[test]
    fn offset_never_negative() {
        assert_eq!(clamp_offset(Some(-4)), 0);
        assert_eq!(clamp_offset(None), 0);
        assert_eq!(clamp_offset(Some(30)), 30);
    }

    #[test]
    fn preview_window_is_one_based() {
        assert_eq!(preview_window(None, None), (0, DEFAULT_PREVIEW_PAGE_SIZE));
        assert_eq!(preview_window(Some(3), Some(10)), (20, 10));
        assert_eq!(preview_window(Some(0), Some(0)), (0, 1));
        assert_eq!(preview_window(Some(1), Some(9999)), (0, MAX_PREVIEW_PAGE_SIZE));
    }
}
