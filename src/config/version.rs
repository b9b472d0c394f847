//! Gating patch sets on the app's react-native version.
//!
//! A patch set may declare `version_range = ">=0.60.0, <0.71.0"`. The app's
//! version comes from the `react-native` dependency in `package.json`, which
//! is an npm spec (`^0.72.4`, `~0.63`) rather than a bare version, so it is
//! reduced with [`version_from_dependency_spec`] before matching.

use semver::{Version, VersionReq};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("react-native version '{value}' is not a semantic version: {reason}")]
    InvalidVersion { value: String, reason: String },

    #[error("invalid version_range '{value}': {reason}")]
    InvalidRange { value: String, reason: String },
}

/// How a patch set's `version_range` relates to the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeCheck {
    /// No range declared, or the app satisfies it.
    Satisfied,
    /// The app's react-native version falls outside the range.
    Outside { version: String, range: String },
    /// A range is declared but the app's version is not known
    /// (monorepos, git or `latest` dependencies).
    Unknown { range: String },
}

/// Check `range` against the app's react-native version.
///
/// The range is validated even when the version is unknown, so a typo in a
/// patch set surfaces on every project.
///
/// # Examples
///
/// ```
/// use native_patcher::config::version::{check_range, RangeCheck};
///
/// assert_eq!(check_range(Some(">=0.60.0"), Some("^0.63.4")).unwrap(), RangeCheck::Satisfied);
/// assert_eq!(check_range(None, None).unwrap(), RangeCheck::Satisfied);
/// assert!(matches!(
///     check_range(Some(">=0.60.0"), Some("0.59.10")).unwrap(),
///     RangeCheck::Outside { .. }
/// ));
/// assert!(matches!(
///     check_range(Some(">=0.60.0"), None).unwrap(),
///     RangeCheck::Unknown { .. }
/// ));
/// ```
pub fn check_range(
    range: Option<&str>,
    framework_version: Option<&str>,
) -> Result<RangeCheck, VersionError> {
    let Some(range) = range.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(RangeCheck::Satisfied);
    };

    let requirement = VersionReq::parse(range).map_err(|e| VersionError::InvalidRange {
        value: range.to_string(),
        reason: e.to_string(),
    })?;

    let Some(raw) = framework_version else {
        return Ok(RangeCheck::Unknown {
            range: range.to_string(),
        });
    };

    let normalized = version_from_dependency_spec(raw).unwrap_or_else(|| raw.trim().to_string());
    let version = Version::parse(&normalized).map_err(|e| VersionError::InvalidVersion {
        value: raw.to_string(),
        reason: e.to_string(),
    })?;

    if requirement.matches(&version) {
        Ok(RangeCheck::Satisfied)
    } else {
        Ok(RangeCheck::Outside {
            version: version.to_string(),
            range: range.to_string(),
        })
    }
}

/// Reduce an npm dependency spec like `^0.72.4` or `~0.63` to a version.
///
/// Returns `None` for specs that do not name one (git URLs, `latest`, `*`).
pub fn version_from_dependency_spec(spec: &str) -> Option<String> {
    let trimmed = spec
        .trim()
        .trim_start_matches(['^', '~', '=', 'v', ' '])
        .trim_start_matches(">=")
        .trim();
    if !trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    // Pad "0.63" to "0.63.0" so semver accepts it.
    let core_end = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (core, rest) = trimmed.split_at(core_end);
    let mut parts: Vec<&str> = core.split('.').filter(|p| !p.is_empty()).collect();
    while parts.len() < 3 {
        parts.push("0");
    }
    let version = format!("{}{}", parts[..3].join("."), rest);
    Version::parse(&version).ok().map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_range_always_satisfied() {
        assert_eq!(check_range(None, Some("0.63.0")).unwrap(), RangeCheck::Satisfied);
        assert_eq!(check_range(Some("   "), None).unwrap(), RangeCheck::Satisfied);
    }

    #[test]
    fn test_react_native_ranges() {
        let legacy = ">=0.60.0, <0.71.0";
        assert_eq!(check_range(Some(legacy), Some("0.60.0")).unwrap(), RangeCheck::Satisfied);
        assert_eq!(check_range(Some(legacy), Some("0.70.9")).unwrap(), RangeCheck::Satisfied);
        assert_eq!(
            check_range(Some(legacy), Some("0.71.0")).unwrap(),
            RangeCheck::Outside {
                version: "0.71.0".to_string(),
                range: legacy.to_string(),
            }
        );
        assert!(matches!(
            check_range(Some(legacy), Some("0.59.10")).unwrap(),
            RangeCheck::Outside { .. }
        ));
    }

    #[test]
    fn test_dependency_specs_are_normalized() {
        assert_eq!(check_range(Some(">=0.60.0"), Some("^0.72.4")).unwrap(), RangeCheck::Satisfied);
        assert_eq!(check_range(Some("<0.64.0"), Some("~0.63")).unwrap(), RangeCheck::Satisfied);
    }

    #[test]
    fn test_unknown_version() {
        assert_eq!(
            check_range(Some(">=0.60.0"), None).unwrap(),
            RangeCheck::Unknown {
                range: ">=0.60.0".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_version() {
        assert!(matches!(
            check_range(Some(">=0.60.0"), Some("not-a-version")),
            Err(VersionError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn test_invalid_range_even_without_version() {
        assert!(matches!(
            check_range(Some(">=bad-version"), Some("0.63.0")),
            Err(VersionError::InvalidRange { .. })
        ));
        assert!(matches!(
            check_range(Some(">=bad-version"), None),
            Err(VersionError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_prerelease_versions() {
        let range = Some(">=0.72.0-rc.1");
        assert_eq!(check_range(range, Some("0.72.0-rc.1")).unwrap(), RangeCheck::Satisfied);
        assert_eq!(check_range(range, Some("0.72.0")).unwrap(), RangeCheck::Satisfied);
        assert!(matches!(
            check_range(range, Some("0.72.0-rc.0")).unwrap(),
            RangeCheck::Outside { .. }
        ));
    }

    #[test]
    fn test_version_from_dependency_spec() {
        assert_eq!(version_from_dependency_spec("0.72.4").as_deref(), Some("0.72.4"));
        assert_eq!(version_from_dependency_spec("^0.72.4").as_deref(), Some("0.72.4"));
        assert_eq!(version_from_dependency_spec("~0.63").as_deref(), Some("0.63.0"));
        assert_eq!(
            version_from_dependency_spec("0.72.0-rc.1").as_deref(),
            Some("0.72.0-rc.1")
        );
        assert_eq!(version_from_dependency_spec(">=0.70.0").as_deref(), Some("0.70.0"));
        assert_eq!(version_from_dependency_spec("latest"), None);
        assert_eq!(
            version_from_dependency_spec("github:facebook/react-native"),
            None
        );
    }
}
