//! Code formatting

/// Format `"{prefix}-{value}"` with `value` zero-padded to at least
/// `min_digits` digits. Wider values are never truncated.
#[inline]
#[must_use]
pub fn format_code(prefix: &str, value: u64, min_digits: usize) -> String {
    format!("{prefix}-{value:0min_digits$}")
}

/// Numeric part of a code produced by [`format_code`] for `prefix`
///
/// `None` when `code` belongs to another prefix or has a non-numeric tail,
/// e.g. an assay code checked against its program's prefix.
#[must_use]
pub fn code_suffix(code: &str, prefix: &str) -> Option<u64> {
    let tail = code.strip_prefix(prefix)?.strip_prefix('-')?;
    if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    tail.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pads_to_min_digits() {
        assert_eq!(format_code("CPA", 10001, 5), "CPA-10001");
        assert_eq!(format_code("PPB-10001", 1, 3), "PPB-10001-001");
    }

    #[test]
    fn never_truncates() {
        assert_eq!(format_code("X", 12345, 3), "X-12345");
    }

    #[test]
    fn suffix_only_for_own_prefix() {
        assert_eq!(code_suffix("CPA-10002", "CPA"), Some(10002));
        assert_eq!(code_suffix("CPA-10002-001", "CPA"), None);
        assert_eq!(code_suffix("CPAB-10002", "CPA"), None);
        assert_eq!(code_suffix("CPA-", "CPA"), None);
        assert_eq!(code_suffix("CPA-+7", "CPA"), None);
    }

    proptest! {
        #[test]
        fn prop_suffix_parses_back(value in 0u64..10_000_000, digits in 1usize..10) {
            let code = format_code("ABC", value, digits);
            prop_assert!(code.len() >= "ABC-".len() + digits);
            prop_assert_eq!(code_suffix(&code, "ABC"), Some(value));
        }
    }
}
