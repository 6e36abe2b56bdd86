//! Folder and repository name derivation
//!
//! Storage folders are named `"{code} - {sanitized name}"`, notebook folders
//! `"{code}: {name}"`. Sanitization keeps `[A-Za-z0-9.-]` and maps every
//! other character to `_`.

use once_cell::sync::Lazy;
use regex::Regex;

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9.\-]").expect("static pattern"));

static REPO_UNSAFE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("static pattern"));

/// Replace characters outside `[A-Za-z0-9.-]` with `_`
#[must_use]
pub fn sanitize(name: &str) -> String {
    UNSAFE_CHARS.replace_all(name, "_").into_owned()
}

/// Storage folder name for an entity
#[must_use]
pub fn storage_folder_name(code: &str, name: &str) -> String {
    format!("{code} - {}", sanitize(name))
}

/// Notebook folder name for an entity
#[must_use]
pub fn notebook_folder_name(code: &str, name: &str) -> String {
    format!("{code}: {name}")
}

/// Lowercase, dash-separated repository slug
#[must_use]
pub fn repository_slug(code: &str, name: &str) -> String {
    let raw = format!("{code}-{name}").to_lowercase();
    REPO_UNSAFE
        .replace_all(&raw, "-")
        .trim_matches('-')
        .to_string()
}

/// Join a folder path and a child name with a single `/`
#[must_use]
pub fn join_path(parent: &str, child: &str) -> String {
    let parent = parent.trim_end_matches('/');
    if parent.is_empty() {
        format!("/{child}")
    } else {
        format!("{parent}/{child}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sanitize_replaces_spaces_and_symbols() {
        assert_eq!(sanitize("Dose response (rat)"), "Dose_response__rat_");
        assert_eq!(sanitize("v1.2-final"), "v1.2-final");
    }

    #[test]
    fn storage_name_format() {
        assert_eq!(
            storage_folder_name("PPB-10001-001", "Plasma binding/QC"),
            "PPB-10001-001 - Plasma_binding_QC"
        );
    }

    #[test]
    fn notebook_name_keeps_raw_name() {
        assert_eq!(
            notebook_folder_name("CPA-10001", "Dose response (rat)"),
            "CPA-10001: Dose response (rat)"
        );
    }

    #[test]
    fn repository_slug_format() {
        assert_eq!(repository_slug("CPA-10001", "Dose Response!"), "cpa-10001-dose-response");
    }

    #[test]
    fn join_path_handles_trailing_slash() {
        assert_eq!(join_path("/programs/", "CPA - Alpha"), "/programs/CPA - Alpha");
        assert_eq!(join_path("", "CPA"), "/CPA");
    }

    proptest! {
        #[test]
        fn prop_sanitized_names_only_contain_safe_chars(name in ".{0,64}") {
            let out = sanitize(&name);
            prop_assert!(out
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_'));
            prop_assert_eq!(out.chars().count(), name.chars().count());
        }

        #[test]
        fn prop_sanitize_is_idempotent(name in ".{0,64}") {
            let once = sanitize(&name);
            prop_assert_eq!(sanitize(&once), once);
        }
    }
}
