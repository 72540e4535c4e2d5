//! Page math for bounded source reads.

/// Rows fetched per page query against the legacy database.
pub const PAGE_SIZE: i64 = 1000;

/// Offsets for reading `total` rows in pages of `page_size`.
/// `ceil(total / page_size)` entries: 0, page_size, 2 * page_size, ...
pub fn page_plan(total: i64, page_size: i64) -> Vec<i64> {
    if total <= 0 || page_size <= 0 {
        return Vec::new();
    }
    let mut pages = total / page_size;
    if total % page_size > 0 {
        pages += 1;
    }
    (0..pages).map(|page| page * page_size).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_pages_up() {
        assert_eq!(page_plan(2500, 1000), vec![0, 1000, 2000]);
        assert_eq!(page_plan(1001, 1000), vec![0, 1000]);
    }

    #[test]
    fn exact_multiple_gets_no_extra_page() {
        assert_eq!(page_plan(2000, 1000), vec![0, 1000]);
        assert_eq!(page_plan(1000, 1000), vec![0]);
    }

    #[test]
    fn small_totals_fit_one_page() {
        assert_eq!(page_plan(1, 1000), vec![0]);
        assert_eq!(page_plan(999, 1000), vec![0]);
    }

    #[test]
    fn empty_or_invalid_input_plans_nothing() {
        assert!(page_plan(0, 1000).is_empty());
        assert!(page_plan(-5, 1000).is_empty());
        assert!(page_plan(10, 0).is_empty());
    }
}
