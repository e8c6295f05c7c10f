//! Wheel file name parsing and composition.
//!
//! A wheel name is a hyphen-delimited token sequence
//! `{distribution}-{version}-{tags...}-{platform}.whl`. Only the version
//! token is ever replaced; build tags are spliced in right after it.
use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::fmt;

use crate::probe::DependencyVersions;

/// Wheel file extension, without the leading dot.
pub const WHEEL_EXTENSION: &str = "whl";

const DATE_STAMP_FORMAT: &str = "%Y%m%d";

/// Eight-digit `YYYYMMDD` stamp appended to wheel versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct DateStamp(NaiveDate);

impl DateStamp {
    pub fn today() -> Self {
        DateStamp(Local::now().date_naive())
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.len() != 8 || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(anyhow!("date stamp must be 8 digits (YYYYMMDD), got {raw:?}"));
        }
        let date = NaiveDate::parse_from_str(raw, DATE_STAMP_FORMAT)
            .map_err(|err| anyhow!("invalid date stamp {raw:?}: {err}"))?;
        Ok(DateStamp(date))
    }
}

impl fmt::Display for DateStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_STAMP_FORMAT))
    }
}

impl From<DateStamp> for String {
    fn from(stamp: DateStamp) -> Self {
        stamp.to_string()
    }
}

/// Borrowed view of a wheel file name split into its tokens.
///
/// The `.whl` extension is held apart so the version token never absorbs it.
#[derive(Debug)]
pub struct WheelName<'a> {
    tokens: Vec<&'a str>,
    extension: Option<&'a str>,
}

impl<'a> WheelName<'a> {
    /// Split a file name; `None` when fewer than two tokens are present.
    pub fn parse(file_name: &'a str) -> Option<Self> {
        let suffix_len = WHEEL_EXTENSION.len() + 1;
        let (stem, extension) = match file_name.len().checked_sub(suffix_len) {
            Some(split) if is_wheel_file_name(file_name) => {
                (&file_name[..split], Some(&file_name[split..]))
            }
            _ => (file_name, None),
        };
        let tokens: Vec<&str> = stem.split('-').collect();
        if tokens.len() < 2 {
            return None;
        }
        Some(WheelName { tokens, extension })
    }

    pub fn distribution(&self) -> &'a str {
        self.tokens[0]
    }

    pub fn version(&self) -> &'a str {
        self.tokens[1]
    }

    /// Rebuild the name with a new version token and `tags` inserted after it.
    pub fn compose(&self, version: &str, tags: &[String]) -> String {
        let mut tokens: Vec<&str> = Vec::with_capacity(self.tokens.len() + tags.len());
        tokens.push(self.tokens[0]);
        tokens.push(version);
        tokens.extend(tags.iter().map(String::as_str));
        tokens.extend_from_slice(&self.tokens[2..]);
        let mut name = tokens.join("-");
        if let Some(extension) = self.extension {
            name.push_str(extension);
        }
        name
    }
}

/// True for `*.whl` file names (case-sensitive, matching the packaging tools).
pub fn is_wheel_file_name(file_name: &str) -> bool {
    file_name
        .strip_suffix(WHEEL_EXTENSION)
        .is_some_and(|stem| stem.len() > 1 && stem.ends_with('.'))
}

/// Compose a new wheel file name; `None` when the name cannot be processed.
pub fn compose_name(file_name: &str, version: &str, tags: &[String]) -> Option<String> {
    WheelName::parse(file_name).map(|name| name.compose(version, tags))
}

/// `{version}.{stamp}`
pub fn stamped_version(version: &str, stamp: DateStamp) -> String {
    format!("{version}.{stamp}")
}

/// True when `version` already carries this stamp as its last segment.
pub fn is_already_stamped(version: &str, stamp: DateStamp) -> bool {
    version
        .strip_suffix(&stamp.to_string())
        .is_some_and(|rest| rest.ends_with('.'))
}

/// Build tag encoding the dependency versions.
///
/// Wheel build tags must start with a digit, hence the leading `0`.
pub fn build_tag(versions: &DependencyVersions) -> String {
    format!("0torch{}numpy{}", versions.torch, versions.numpy)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MMCV: &str = "mmcv-2.1.0-cp310-cp310-linux_x86_64.whl";

    fn stamp() -> DateStamp {
        DateStamp::parse("20250709").expect("valid stamp")
    }

    #[test]
    fn compose_without_tags_only_replaces_version() {
        let name = compose_name(MMCV, "2.1.0.20250709", &[]).expect("compose");
        assert_eq!(name, "mmcv-2.1.0.20250709-cp310-cp310-linux_x86_64.whl");

        let original: Vec<&str> = MMCV.split('-').collect();
        let composed: Vec<&str> = name.split('-').collect();
        assert_eq!(original.len(), composed.len());
        assert_eq!(composed[0], original[0]);
        assert_eq!(composed[2..], original[2..]);
    }

    #[test]
    fn compose_inserts_tags_after_version() {
        let tags = vec!["0torch2.4.1numpy1.26.4".to_string(), "extra".to_string()];
        let name = compose_name(MMCV, "2.1.0.20250709", &tags).expect("compose");
        let tokens: Vec<&str> = name.split('-').collect();
        assert_eq!(
            tokens,
            vec![
                "mmcv",
                "2.1.0.20250709",
                "0torch2.4.1numpy1.26.4",
                "extra",
                "cp310",
                "cp310",
                "linux_x86_64.whl",
            ]
        );
    }

    #[test]
    fn compose_handles_two_token_names() {
        let name = compose_name("pkg-1.0.whl", "1.0.20250709", &[]).expect("compose");
        assert_eq!(name, "pkg-1.0.20250709.whl");
        assert_eq!(compose_name("pkg-1.0", "2.0", &[]).as_deref(), Some("pkg-2.0"));
    }

    #[test]
    fn names_with_fewer_than_two_tokens_are_rejected() {
        assert!(compose_name("weird.whl", "1.0", &[]).is_none());
        assert!(WheelName::parse("").is_none());
        assert!(WheelName::parse(".whl").is_none());
    }

    #[test]
    fn wheel_suffix_detection() {
        assert!(is_wheel_file_name(MMCV));
        assert!(is_wheel_file_name("a.whl"));
        assert!(!is_wheel_file_name(".whl"));
        assert!(!is_wheel_file_name("mmcv-2.1.0.tar.gz"));
        assert!(!is_wheel_file_name("mmcvwhl"));
    }

    #[test]
    fn wheel_name_exposes_distribution_and_version() {
        let name = WheelName::parse(MMCV).expect("parse");
        assert_eq!(name.distribution(), "mmcv");
        assert_eq!(name.version(), "2.1.0");
    }

    #[test]
    fn concrete_scenario_with_build_tag() {
        let versions = DependencyVersions {
            torch: "2.4.1".to_string(),
            numpy: "1.26.4".to_string(),
        };
        let version = stamped_version("2.1.0", stamp());
        assert_eq!(version, "2.1.0.20250709");
        let name = compose_name(MMCV, &version, &[build_tag(&versions)]).expect("compose");
        assert_eq!(
            name,
            "mmcv-2.1.0.20250709-0torch2.4.1numpy1.26.4-cp310-cp310-linux_x86_64.whl"
        );
    }

    #[test]
    fn date_stamp_parses_only_real_eight_digit_dates() {
        assert_eq!(stamp().to_string(), "20250709");
        assert!(DateStamp::parse("2025-07-09").is_err());
        assert!(DateStamp::parse("20251340").is_err());
        assert!(DateStamp::parse("2025079").is_err());
        assert_eq!(DateStamp::today().to_string().len(), 8);
    }

    #[test]
    fn already_stamped_detection_requires_dot_separator() {
        assert!(is_already_stamped("2.1.0.20250709", stamp()));
        assert!(!is_already_stamped("2.1.0", stamp()));
        assert!(!is_already_stamped("2.1.020250709", stamp()));
        assert!(!is_already_stamped("2.1.0.20250708", stamp()));
    }
}
