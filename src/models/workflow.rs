use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowStatus {
    #[serde(rename = "To Do")]
    ToDo,
    #[serde(rename = "In Progress")]
    InProgress,
    Blocked,
    Done,
}

impl WorkflowStatus {
    pub const ALL: [Self; 4] = [Self::ToDo, Self::InProgress, Self::Blocked, Self::Done];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ToDo => "To Do",
            Self::InProgress => "In Progress",
            Self::Blocked => "Blocked",
            Self::Done => "Done",
        }
    }

    /// Single-character marker used by the text Gantt chart.
    #[must_use]
    pub const fn marker(self) -> char {
        match self {
            Self::ToDo => '.',
            Self::InProgress => '>',
            Self::Blocked => '!',
            Self::Done => '*',
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown status: {0} (expected To Do, In Progress, Blocked or Done)")]
pub struct UnknownStatus(pub String);

impl FromStr for WorkflowStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();

        match normalized.as_str() {
            "todo" | "open" | "notstarted" => Ok(Self::ToDo),
            "inprogress" | "active" | "started" => Ok(Self::InProgress),
            "blocked" => Ok(Self::Blocked),
            "done" | "complete" | "completed" => Ok(Self::Done),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Criticality {
    #[serde(rename = "Must be complete")]
    MustComplete,
    #[default]
    #[serde(rename = "Should be complete")]
    ShouldComplete,
    #[serde(rename = "Does not block")]
    NonBlocking,
}

impl Criticality {
    pub const ALL: [Self; 3] = [Self::MustComplete, Self::ShouldComplete, Self::NonBlocking];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MustComplete => "Must be complete",
            Self::ShouldComplete => "Should be complete",
            Self::NonBlocking => "Does not block",
        }
    }

    #[must_use]
    pub const fn blocks_milestone(self) -> bool {
        matches!(self, Self::MustComplete)
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown criticality: {0} (expected must, should or none)")]
pub struct UnknownCriticality(pub String);

impl FromStr for Criticality {
    type Err = UnknownCriticality;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();

        match normalized.as_str() {
            "must" | "mustbecomplete" | "mustcomplete" => Ok(Self::MustComplete),
            "should" | "shouldbecomplete" | "shouldcomplete" => Ok(Self::ShouldComplete),
            "none" | "nonblocking" | "doesnotblock" => Ok(Self::NonBlocking),
            _ => Err(UnknownCriticality(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid date '{0}' (expected YYYY-MM-DD or MM/DD/YYYY)")]
pub struct InvalidDate(pub String);

/// Parses the date formats accepted from forms and imported sheets.
pub fn parse_date(input: &str) -> Result<NaiveDate, InvalidDate> {
    let input = input.trim();

    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(input, fmt) {
            return Ok(date);
        }
    }

    NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.date())
        .map_err(|_| InvalidDate(input.to_string()))
}

/// Like [`parse_date`] but treats blank input as absent.
pub fn parse_optional_date(input: Option<&str>) -> Result<Option<NaiveDate>, InvalidDate> {
    match input.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_date(value).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing_is_lenient() {
        assert_eq!("to-do".parse::<WorkflowStatus>().unwrap(), WorkflowStatus::ToDo);
        assert_eq!(
            "In Progress".parse::<WorkflowStatus>().unwrap(),
            WorkflowStatus::InProgress
        );
        assert_eq!("DONE".parse::<WorkflowStatus>().unwrap(), WorkflowStatus::Done);
        assert_eq!(
            "Completed".parse::<WorkflowStatus>().unwrap(),
            WorkflowStatus::Done
        );
        assert!("maybe".parse::<WorkflowStatus>().is_err());
    }

    #[test]
    fn test_status_labels_round_trip() {
        for status in WorkflowStatus::ALL {
            assert_eq!(status.as_str().parse::<WorkflowStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_criticality_labels() {
        assert_eq!(
            "Must be complete".parse::<Criticality>().unwrap(),
            Criticality::MustComplete
        );
        assert_eq!(
            "Should be Complete".parse::<Criticality>().unwrap(),
            Criticality::ShouldComplete
        );
        assert_eq!(
            "non-blocking".parse::<Criticality>().unwrap(),
            Criticality::NonBlocking
        );
        assert!(Criticality::MustComplete.blocks_milestone());
        assert!(!Criticality::ShouldComplete.blocks_milestone());
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(parse_date("2024-03-15").unwrap(), expected);
        assert_eq!(parse_date("03/15/2024").unwrap(), expected);
        assert_eq!(parse_date("2024-03-15 08:30:00").unwrap(), expected);
        assert!(parse_date("15.03.2024").is_err());
        assert!(parse_date("2024-02-30").is_err());
    }

    #[test]
    fn test_parse_optional_date_blank() {
        assert_eq!(parse_optional_date(None).unwrap(), None);
        assert_eq!(parse_optional_date(Some("  ")).unwrap(), None);
        assert!(parse_optional_date(Some("soon")).is_err());
    }
}
