//! Page numbers taken from query strings.

/// Highest page a listing will serve. Anything past it shows an empty page.
pub const MAX_PAGE: i64 = 100_000;

/// Clamp a requested 1-based page and return it with its row offset.
///
/// ```
/// use threadly_core::page_offset;
///
/// assert_eq!(page_offset(None, 20), (1, 0));
/// assert_eq!(page_offset(Some(3), 20), (3, 40));
/// ```
#[must_use]
pub fn page_offset(page: Option<i64>, per_page: i64) -> (i64, i64) {
    let page = page.unwrap_or(1).clamp(1, MAX_PAGE);
    (page, (page - 1).saturating_mul(per_page.max(0)))
}

/// Number of pages needed for `total` rows, never less than one.
#[must_use]
pub fn total_pages(total: i64, per_page: i64) -> i64 {
    if per_page <= 0 {
        return 1;
    }
    (total.max(0) / per_page + i64::from(total % per_page > 0)).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_pages_fall_back_to_first() {
        assert_eq!(page_offset(Some(0), 20), (1, 0));
        assert_eq!(page_offset(Some(-5), 20), (1, 0));
        assert_eq!(page_offset(Some(i64::MIN), 20), (1, 0));
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let (page, offset) = page_offset(Some(i64::MAX), 20);
        assert_eq!(page, MAX_PAGE);
        assert_eq!(offset, (MAX_PAGE - 1) * 20);
        assert!(offset >= 0);
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
        assert_eq!(total_pages(i64::MAX, 20), i64::MAX / 20 + 1);
    }
}
