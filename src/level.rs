//! Syslog severity vocabulary exposed to host logging frameworks.
//!
//! Level names follow the syslog convention (`emerg` through `debug`). Lower
//! numeric values are more severe.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Facility code for user-level messages.
pub const USER_FACILITY: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Severity {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    #[default]
    Info = 6,
    Debug = 7,
}

/// Returned when a level name is not part of the syslog vocabulary.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown syslog level: {0}")]
pub struct UnknownLevel(pub String);

impl Severity {
    /// Every severity, most severe first.
    pub const ALL: [Severity; 8] = [
        Severity::Emergency,
        Severity::Alert,
        Severity::Critical,
        Severity::Error,
        Severity::Warning,
        Severity::Notice,
        Severity::Info,
        Severity::Debug,
    ];

    /// The syslog level name, e.g. `"crit"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Emergency => "emerg",
            Severity::Alert => "alert",
            Severity::Critical => "crit",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Notice => "notice",
            Severity::Info => "info",
            Severity::Debug => "debug",
        }
    }

    pub fn value(self) -> u8 {
        self as u8
    }

    /// Syslog PRI value for this severity under the user-level facility.
    pub fn priority(self) -> u8 {
        USER_FACILITY * 8 + self.value()
    }

    /// Resolve `name`, falling back to [`Severity::Info`] for unknown names.
    pub fn parse_or_info(name: &str) -> Self {
        name.parse().unwrap_or(Self::Info)
    }

    /// Whether a record at `other` passes a threshold set at `self`.
    pub fn allows(self, other: Severity) -> bool {
        other <= self
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .into_iter()
            .find(|severity| severity.as_str() == s)
            .ok_or_else(|| UnknownLevel(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("emerg", 8)]
    #[case("alert", 9)]
    #[case("crit", 10)]
    #[case("error", 11)]
    #[case("warning", 12)]
    #[case("notice", 13)]
    #[case("info", 14)]
    #[case("debug", 15)]
    fn known_levels_map_to_user_priority(#[case] name: &str, #[case] priority: u8) {
        assert_eq!(Severity::parse_or_info(name).priority(), priority);
    }

    #[rstest]
    #[case("warn")]
    #[case("verbose")]
    #[case("INFO")]
    #[case("")]
    fn unknown_levels_fall_back_to_info(#[case] name: &str) {
        assert_eq!(Severity::parse_or_info(name), Severity::Info);
        assert_eq!(Severity::parse_or_info(name).priority(), 14);
    }

    #[test]
    fn parse_reports_unknown_name() {
        let err = "silly".parse::<Severity>().unwrap_err();
        assert_eq!(err, UnknownLevel("silly".into()));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for severity in Severity::ALL {
            assert_eq!(severity.to_string().parse::<Severity>(), Ok(severity));
        }
    }

    #[test]
    fn threshold_admits_more_severe_levels() {
        assert!(Severity::Warning.allows(Severity::Error));
        assert!(Severity::Warning.allows(Severity::Warning));
        assert!(!Severity::Warning.allows(Severity::Info));
    }
}
