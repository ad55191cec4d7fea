//! Version Comparison
//!
//! Dot-separated numeric versions compared segment by segment, missing segments
//! counting as zero. Segments that are not plain integers also count as zero.

use std::cmp::Ordering;

/// Split a version string into numeric segments
pub fn parse_segments(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|segment| segment.trim().parse::<u64>().unwrap_or(0))
        .collect()
}

/// Total order over dot-integer versions, zero-padding the shorter one
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let a_parts = parse_segments(a);
    let b_parts = parse_segments(b);
    let len = a_parts.len().max(b_parts.len());

    for i in 0..len {
        let a_part = a_parts.get(i).copied().unwrap_or(0);
        let b_part = b_parts.get(i).copied().unwrap_or(0);
        match a_part.cmp(&b_part) {
            Ordering::Equal => continue,
            decided => return decided,
        }
    }

    Ordering::Equal
}

/// True when `candidate` is strictly newer than `current`
pub fn is_newer(candidate: &str, current: &str) -> bool {
    compare_versions(candidate, current) == Ordering::Greater
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_newer_examples() {
        assert!(is_newer("1.2.0", "1.1.9"));
        assert!(!is_newer("1.2", "1.2.0"));
        assert!(!is_newer("1.0", "1.0.1"));
        assert!(is_newer("1.0.1", "1.0"));
        assert!(is_newer("10.0", "9.99.99"));
    }

    #[test]
    fn test_equal_versions_are_not_newer() {
        assert!(!is_newer("2.0.0", "2.0.0"));
        assert_eq!(compare_versions("2", "2.0.0.0"), Ordering::Equal);
    }

    #[test]
    fn test_non_numeric_segments_count_as_zero() {
        assert_eq!(parse_segments("1.beta.3"), vec![1, 0, 3]);
        assert_eq!(compare_versions("1.x", "1.0"), Ordering::Equal);
        assert!(!is_newer("1.0.0-rc1", "1.0.0"));
        assert_eq!(parse_segments(""), vec![0]);
    }

    #[test]
    fn test_ordering_is_antisymmetric() {
        let versions = ["0.9", "1", "1.0.1", "1.2", "1.10", "2.0.0"];
        for a in versions {
            for b in versions {
                assert_eq!(compare_versions(a, b), compare_versions(b, a).reverse());
                assert!(!(is_newer(a, b) && is_newer(b, a)));
            }
        }
    }
}
