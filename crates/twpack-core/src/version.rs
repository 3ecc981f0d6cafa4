//! Version derivation.
//!
//! Major, minor and patch are edited by hand; a build only rewrites the mode
//! label and the `+BUILD` counter.

use semver::{BuildMetadata, Prerelease, Version};
use twpack_plugin::mode_label;

use crate::{CoreError, CoreResult};

/// Parses a manifest version string.
///
/// Only `MAJOR.MINOR.PATCH` must be a semantic version. The `-MODE` and
/// `+BUILD` suffixes are kept when they are valid semver identifiers and
/// dropped otherwise, so any label a build wrote can be read back.
///
/// # Errors
///
/// Returns [`CoreError::Version`] if `MAJOR.MINOR.PATCH` is malformed.
pub fn parse_version(version: &str) -> CoreResult<Version> {
    let trimmed = version.trim();
    let (rest, build) = trimmed.rsplit_once('+').unwrap_or((trimmed, ""));
    let (core, pre) = rest.split_once('-').unwrap_or((rest, ""));

    let mut parsed = Version::parse(core).map_err(|source| CoreError::Version {
        version: version.to_string(),
        source,
    })?;
    parsed.pre = Prerelease::new(pre).unwrap_or(Prerelease::EMPTY);
    parsed.build = BuildMetadata::new(build).unwrap_or(BuildMetadata::EMPTY);
    Ok(parsed)
}

/// Returns the build counter carried in the `+BUILD` suffix.
///
/// Absent or non-numeric build metadata counts as 0.
#[must_use]
pub fn build_counter(version: &Version) -> u64 {
    version.build.as_str().parse().unwrap_or(0)
}

/// Derives the next version string for a build.
///
/// The result is `MAJOR.MINOR.PATCH`, followed by `-<mode>` unless the mode is
/// absent or `"master"`, followed by `+<counter + 1>` when `auto_increment` is
/// set. Any pre-release label on `current` is replaced.
///
/// # Errors
///
/// Returns [`CoreError::BuildCounterOverflow`] if the counter is already at
/// its maximum.
pub fn derive_version(
    current: &Version,
    mode: Option<&str>,
    auto_increment: bool,
) -> CoreResult<String> {
    let label = mode_label(mode)
        .map(|mode| format!("-{mode}"))
        .unwrap_or_default();

    let build_suffix = if auto_increment {
        let next = build_counter(current)
            .checked_add(1)
            .ok_or_else(|| CoreError::BuildCounterOverflow(current.to_string()))?;
        format!("+{next}")
    } else {
        String::new()
    };

    Ok(format!(
        "{}.{}.{}{label}{build_suffix}",
        current.major, current.minor, current.patch
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derive(current: &str, mode: Option<&str>, auto_increment: bool) -> String {
        derive_version(&parse_version(current).unwrap(), mode, auto_increment).unwrap()
    }

    #[test]
    fn test_mode_and_increment() {
        assert_eq!(derive("1.2.5+3", Some("develop"), true), "1.2.5-develop+4");
    }

    #[test]
    fn test_master_without_increment() {
        assert_eq!(derive("1.2.5", Some("master"), false), "1.2.5");
    }

    #[test]
    fn test_no_mode_with_increment() {
        assert_eq!(derive("2.0.0+9", None, true), "2.0.0+10");
    }

    #[test]
    fn test_master_equals_absent() {
        for current in ["0.1.0", "3.4.5+12", "1.0.0-develop+2"] {
            assert_eq!(derive(current, Some("master"), true), derive(current, None, true));
            assert_eq!(
                derive(current, Some("master"), false),
                derive(current, None, false)
            );
        }
    }

    #[test]
    fn test_empty_mode_equals_absent() {
        assert_eq!(derive("1.0.0+1", Some(""), true), "1.0.0+2");
    }

    #[test]
    fn test_first_build_starts_at_one() {
        assert_eq!(derive("0.3.0", None, true), "0.3.0+1");
    }

    #[test]
    fn test_previous_mode_replaced() {
        assert_eq!(derive("1.2.5-develop+4", Some("testing"), true), "1.2.5-testing+5");
        assert_eq!(derive("1.2.5-develop+4", None, true), "1.2.5+5");
    }

    #[test]
    fn test_build_dropped_without_increment() {
        assert_eq!(derive("1.2.5+7", Some("develop"), false), "1.2.5-develop");
    }

    #[test]
    fn test_non_numeric_build_counts_as_zero() {
        assert_eq!(derive("1.0.0+sha.abc", None, true), "1.0.0+1");
    }

    #[test]
    fn test_pure() {
        let current = parse_version("4.1.2+30").unwrap();
        let before = current.clone();
        let first = derive_version(&current, Some("develop"), true).unwrap();
        let second = derive_version(&current, Some("develop"), true).unwrap();
        assert_eq!(first, second);
        assert_eq!(current, before);
    }

    #[test]
    fn test_derived_versions_parse_back() {
        let next = derive("1.2.5+3", Some("develop"), true);
        let parsed = parse_version(&next).unwrap();
        assert_eq!(build_counter(&parsed), 4);
        assert_eq!(parsed.pre.as_str(), "develop");
    }

    #[test]
    fn test_build_counter() {
        assert_eq!(build_counter(&parse_version("1.0.0").unwrap()), 0);
        assert_eq!(build_counter(&parse_version("1.0.0+41").unwrap()), 41);
    }

    #[test]
    fn test_parse_invalid() {
        let err = parse_version("not-a-version").unwrap_err();
        assert!(matches!(err, CoreError::Version { .. }));
        assert!(err.to_string().starts_with("invalid version 'not-a-version'"));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(parse_version(" 1.2.3 \n").unwrap(), Version::new(1, 2, 3));
    }

    #[test]
    fn test_free_form_modes_parse_back() {
        for mode in ["feature_x", "feature/x", "rc.01"] {
            let next = derive("1.2.5+3", Some(mode), true);
            assert_eq!(next, format!("1.2.5-{mode}+4"));

            let parsed = parse_version(&next).unwrap();
            assert_eq!(build_counter(&parsed), 4);
            assert_eq!(derive(&next, Some(mode), true), format!("1.2.5-{mode}+5"));
        }
    }

    #[test]
    fn test_mode_with_plus_keeps_counter() {
        let next = derive("1.0.0+7", Some("a+b"), true);
        assert_eq!(next, "1.0.0-a+b+8");
        assert_eq!(derive(&next, None, true), "1.0.0+9");
    }

    #[test]
    fn test_parse_keeps_valid_suffixes() {
        let parsed = parse_version("1.2.5-develop+4").unwrap();
        assert_eq!(parsed.pre.as_str(), "develop");
        assert_eq!(parsed.build.as_str(), "4");
    }

    #[test]
    fn test_parse_invalid_core() {
        assert!(parse_version("1.2-develop+3").is_err());
        assert!(parse_version("").is_err());
    }

    #[test]
    fn test_build_counter_overflow() {
        let current = parse_version("1.0.0+18446744073709551615").unwrap();
        let err = derive_version(&current, None, true).unwrap_err();
        assert!(matches!(err, CoreError::BuildCounterOverflow(_)));
        assert_eq!(derive_version(&current, None, false).unwrap(), "1.0.0");
    }
}
