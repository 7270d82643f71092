//! Legacy version strings: parsing, ordering and "next release" increments.
//!
//! Versions in the module tree look like `4-2`, `6-7-1dls8`, `dls2-3` or
//! `1-4dls-alpha`. They are treated as a sequence of numeric components
//! separated by `-`, `.`, `_` or the vendor token. Any other character ends
//! the scan, so parsing is best-effort and never fails.
//!
//! The same module owns the *version segment* rule used when splitting
//! filesystem paths into coordinates.

use std::fs;
use std::path::Path;

use tracing::debug;

/// Vendor suffix that separates a site patch number from the upstream version
pub const VENDOR_TOKEN: &str = "dls";

/// Placeholder version used by unresolved symbolic links in the release tree
pub const SYMLINK_VERSION: &str = "Prod";

/// Decompose a version string into its numeric components.
///
/// `"4-2dls7"` gives `[4, 2, 7]`, `"4-2dls"` gives `[4, 2]`,
/// `"1-2beta3"` stops at `beta` and gives `[1, 2]`.
pub fn parse_version(version: &str) -> Vec<u64> {
    let mut out = Vec::new();
    let mut rest = version;

    while let Some(c) = rest.chars().next() {
        if c.is_ascii_digit() {
            let end = rest
                .find(|ch: char| !ch.is_ascii_digit())
                .unwrap_or(rest.len());
            match rest[..end].parse::<u64>() {
                Ok(n) => out.push(n),
                // Overlong run: keep what we have
                Err(_) => break,
            }
            rest = &rest[end..];
        } else if matches!(c, '-' | '.' | '_') {
            rest = &rest[1..];
        } else if let Some(tail) = rest.strip_prefix(VENDOR_TOKEN) {
            rest = tail;
        } else {
            break;
        }
    }

    out
}

/// Bump the trailing numeric component, keeping every other character.
///
/// Returns the input unchanged when the string does not end in a digit run.
pub fn increment_version(version: &str) -> String {
    let start = version
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);

    let Some(start) = start else {
        return version.to_string();
    };

    match version[start..].parse::<u64>() {
        Ok(n) => match n.checked_add(1) {
            Some(next) => format!("{}{next}", &version[..start]),
            None => version.to_string(),
        },
        Err(_) => version.to_string(),
    }
}

/// True when `a` is strictly newer than `b`.
///
/// `None` is older than any concrete version. Components are compared over
/// the common prefix only; versions that agree on that prefix are not newer
/// than each other whatever their lengths.
pub fn is_newer(a: Option<&str>, b: Option<&str>) -> bool {
    let Some(a) = a else {
        return false;
    };
    let Some(b) = b else {
        return true;
    };

    let (pa, pb) = (parse_version(a), parse_version(b));
    for (x, y) in pa.iter().zip(pb.iter()) {
        if x > y {
            return true;
        }
        if x < y {
            return false;
        }
    }
    false
}

/// A path segment names a version when it starts with a digit or is the
/// symbolic-link placeholder.
pub fn is_version_segment(segment: &str) -> bool {
    segment
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit())
        || segment == SYMLINK_VERSION
}

/// Newest version directory directly under `module_dir`, if any.
///
/// Names are visited in sorted order so that ties resolve the same way on
/// every run: the first of two equal versions wins.
pub fn latest_version(module_dir: &Path) -> Option<String> {
    let mut names: Vec<String> = fs::read_dir(module_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|ft| ft.is_dir()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.') && is_version_segment(name))
        .collect();
    names.sort();

    let mut best: Option<String> = None;
    for name in names {
        if is_newer(Some(&name), best.as_deref()) {
            best = Some(name);
        }
    }

    debug!(dir = %module_dir.display(), latest = ?best, "scanned version directories");
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vendor_suffix_components() {
        assert_eq!(parse_version("4-2dls7"), vec![4, 2, 7]);
        assert_eq!(parse_version("4-2dls"), vec![4, 2]);
        assert_eq!(parse_version("dls2-3"), vec![2, 3]);
        assert_eq!(parse_version("3-4-2dls3"), vec![3, 4, 2, 3]);
    }

    #[test]
    fn parse_stops_at_unknown_text() {
        assert_eq!(parse_version("1-2beta3"), vec![1, 2]);
        assert_eq!(parse_version("1-4dls-alpha"), vec![1, 4]);
        assert!(parse_version("work").is_empty());
        assert!(parse_version("").is_empty());
    }

    #[test]
    fn increments_trailing_run_only() {
        assert_eq!(increment_version("0-1"), "0-2");
        assert_eq!(increment_version("3-19"), "3-20");
        assert_eq!(increment_version("3-4-2dls3"), "3-4-2dls4");
        assert_eq!(increment_version("1-4dls-alpha"), "1-4dls-alpha");
        assert_eq!(increment_version("1-9"), "1-10");
        assert_eq!(increment_version(""), "");
    }

    #[test]
    fn increment_saturates_at_largest_run() {
        let max = format!("1-{}", u64::MAX);
        assert_eq!(increment_version(&max), max);
        assert_eq!(
            increment_version(&format!("1-{}", u64::MAX - 1)),
            format!("1-{}", u64::MAX)
        );
    }

    #[test]
    fn increment_keeps_component_count() {
        for v in ["0-1", "6-7-1dls8", "2.3.4", "dls2-3", "Prod"] {
            assert_eq!(
                parse_version(&increment_version(v)).len(),
                parse_version(v).len(),
                "component count changed for {v}"
            );
        }
    }

    #[test]
    fn newer_handles_missing_versions() {
        assert!(!is_newer(None, Some("1-0")));
        assert!(!is_newer(None, None));
        assert!(is_newer(Some("1-0"), None));
    }

    #[test]
    fn newer_compares_components() {
        assert!(is_newer(Some("1-10"), Some("1-9")));
        assert!(!is_newer(Some("1-9"), Some("1-10")));
        assert!(is_newer(Some("6-7-1dls9"), Some("6-7-1dls8")));
        assert!(!is_newer(Some("2-1"), Some("2-1")));
    }

    #[test]
    fn newer_ignores_components_past_common_prefix() {
        // Neither direction counts as newer once the shared prefix is equal.
        assert!(!is_newer(Some("1-2-1"), Some("1-2")));
        assert!(!is_newer(Some("1-2"), Some("1-2-1")));
    }

    #[test]
    fn version_segments() {
        assert!(is_version_segment("4-2"));
        assert!(is_version_segment("Prod"));
        assert!(!is_version_segment("motor"));
        assert!(!is_version_segment("dls2-3"));
        assert!(!is_version_segment(""));
    }

    #[test]
    fn latest_version_picks_max() {
        let tmp = tempfile::tempdir().unwrap();
        for v in ["1-9", "1-10", "1-2", "work", ".hidden1"] {
            std::fs::create_dir_all(tmp.path().join(v)).unwrap();
        }
        std::fs::write(tmp.path().join("9-9"), "not a dir").unwrap();

        assert_eq!(latest_version(tmp.path()).as_deref(), Some("1-10"));
        assert_eq!(latest_version(&tmp.path().join("missing")), None);
    }
}
