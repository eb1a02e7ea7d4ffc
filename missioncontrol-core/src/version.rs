//! Version - Platform version compatibility checks
//!
//! Wire formats differ between platform generations, so converters ask
//! whether the detected platform version meets a threshold.

use semver::Version;

/// Error raised when a version string cannot be interpreted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version '{input}': {reason}")]
pub struct VersionError {
    pub input: String,
    pub reason: String,
}

/// Parse a platform version, accepting a leading `v` and missing
/// minor/patch components ("7", "7.41" -> "7.0.0", "7.41.0").
pub fn parse_version(input: &str) -> Result<Version, VersionError> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

    if let Ok(version) = Version::parse(trimmed) {
        return Ok(version);
    }

    let (core, rest) = match trimmed.find(['-', '+']) {
        Some(idx) => trimmed.split_at(idx),
        None => (trimmed, ""),
    };
    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(VersionError {
            input: input.to_string(),
            reason: "expected MAJOR[.MINOR[.PATCH]]".to_string(),
        });
    }
    while parts.len() < 3 {
        parts.push("0");
    }

    Version::parse(&format!("{}{}", parts.join("."), rest)).map_err(|e| VersionError {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

/// Returns true when `current` is at least `minimum`
pub fn check_version(current: &str, minimum: &str) -> Result<bool, VersionError> {
    let current = parse_version(current)?;
    let minimum = parse_version(minimum)?;
    Ok(current >= minimum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_versions_pass_threshold() {
        assert!(check_version("7.0.0", "7.0.0").unwrap());
        assert!(check_version("7.77.5", "7.0.0").unwrap());
        assert!(check_version("10.1.0", "7.0.0").unwrap());
    }

    #[test]
    fn legacy_versions_fail_threshold() {
        assert!(!check_version("6.23.42", "7.0.0").unwrap());
        assert!(!check_version("6.9", "7.0.0").unwrap());
    }

    #[test]
    fn lenient_parsing() {
        assert_eq!(parse_version("v7.41").unwrap(), Version::new(7, 41, 0));
        assert_eq!(parse_version(" 7 ").unwrap(), Version::new(7, 0, 0));
        assert!(parse_version("7.41-rc1").is_ok());
    }

    #[test]
    fn garbage_is_rejected() {
        let err = check_version("unknown", "7.0.0").unwrap_err();
        assert_eq!(err.input, "unknown");
        assert!(parse_version("").is_err());
        assert!(parse_version("7..1").is_err());
    }
}
