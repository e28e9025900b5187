use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use jiff::{Timestamp, civil, tz::TimeZone};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("failed to read schedule file {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse schedule JSON in {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("round {id} must start before it ends")]
    InvalidRound { id: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(rename = "hackathon", default)]
    pub event: EventInfo,
    #[serde(default)]
    pub rounds: Vec<Round>,
    #[serde(default)]
    pub audio: Option<AudioConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub institute: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "deserialize_instant")]
    pub start_time: Timestamp,
    #[serde(deserialize_with = "deserialize_instant")]
    pub end_time: Timestamp,
    #[serde(skip)]
    pub announced: Announced,
}

/// How far a round has progressed through its announcements.
///
/// Only moves forward while polling. A round whose start window was missed
/// can go straight to `EndAnnounced`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Announced {
    #[default]
    NotAnnounced,
    StartAnnounced,
    EndAnnounced,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConfig {
    #[serde(default)]
    pub round_start: Option<String>,
    #[serde(default)]
    pub round_end: Option<String>,
    #[serde(default)]
    pub rounds: BTreeMap<String, String>,
}

impl Schedule {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScheduleError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ScheduleError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let schedule =
            serde_json::from_str::<Schedule>(&contents).map_err(|source| ScheduleError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        schedule.validate()?;
        info!(
            path = %path.display(),
            rounds = schedule.rounds.len(),
            "schedule loaded"
        );
        Ok(schedule)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::from_file(path) {
            Ok(schedule) => schedule,
            Err(err) => {
                warn!(error = ?err, "schedule unavailable, using an empty one");
                Self::default()
            }
        }
    }

    fn validate(&self) -> Result<(), ScheduleError> {
        for round in &self.rounds {
            if round.start_time >= round.end_time {
                return Err(ScheduleError::InvalidRound {
                    id: round.id.clone(),
                });
            }
        }
        let ordered = self
            .rounds
            .windows(2)
            .all(|pair| pair[0].end_time <= pair[1].start_time);
        if !ordered {
            warn!("rounds overlap or are not in chronological order");
        }
        Ok(())
    }

    pub fn round(&self, id: &str) -> Option<&Round> {
        self.rounds.iter().find(|round| round.id == id)
    }

    pub fn round_clip(&self, round_id: &str) -> Option<&str> {
        self.audio.as_ref()?.rounds.get(round_id).map(String::as_str)
    }

    pub fn start_clip(&self) -> Option<&str> {
        self.audio.as_ref()?.round_start.as_deref()
    }

    pub fn end_clip(&self) -> Option<&str> {
        self.audio.as_ref()?.round_end.as_deref()
    }
}

impl Round {
    pub fn new(id: &str, name: &str, start_time: Timestamp, end_time: Timestamp) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            start_time,
            end_time,
            announced: Announced::NotAnnounced,
        }
    }
}

/// Parses an ISO 8601 instant. Values without an offset are read as wall
/// clock time in the system time zone.
pub fn parse_instant(raw: &str) -> Result<Timestamp, jiff::Error> {
    if let Ok(ts) = raw.parse::<Timestamp>() {
        return Ok(ts);
    }
    let local: civil::DateTime = raw.parse()?;
    Ok(local.to_zoned(TimeZone::system())?.timestamp())
}

fn deserialize_instant<'de, D>(deserializer: D) -> Result<Timestamp, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_instant(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = r#"{
        "hackathon": {
            "name": "Campus Hackathon",
            "theme": "Code for Coexistence",
            "institute": "Institute of Technology"
        },
        "rounds": [
            { "id": "r1", "name": "Opening", "startTime": "2025-01-01T10:00:00Z", "endTime": "2025-01-01T10:01:00Z" },
            { "id": "r2", "name": "Hacking", "startTime": "2025-01-01T10:01:00+00:00", "endTime": "2025-01-01T12:00:00Z" }
        ],
        "audio": {
            "roundStart": "round-start.wav",
            "roundEnd": "round-end.wav",
            "rounds": { "r1": "opening.wav" }
        }
    }"#;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_sample_schedule() {
        let file = write_temp(SAMPLE);
        let schedule = Schedule::from_file(file.path()).unwrap();

        assert_eq!(schedule.event.name, "Campus Hackathon");
        assert_eq!(schedule.rounds.len(), 2);
        assert_eq!(
            schedule.rounds[0].start_time,
            "2025-01-01T10:00:00Z".parse::<Timestamp>().unwrap()
        );
        assert_eq!(schedule.rounds[1].start_time, schedule.rounds[0].end_time);
        assert_eq!(schedule.rounds[0].announced, Announced::NotAnnounced);
        assert_eq!(schedule.round_clip("r1"), Some("opening.wav"));
        assert_eq!(schedule.round_clip("r2"), None);
        assert_eq!(schedule.start_clip(), Some("round-start.wav"));
        assert_eq!(schedule.end_clip(), Some("round-end.wav"));
    }

    #[test]
    fn test_audio_section_is_optional() {
        let file = write_temp(r#"{ "hackathon": { "name": "X" }, "rounds": [] }"#);
        let schedule = Schedule::from_file(file.path()).unwrap();
        assert!(schedule.audio.is_none());
        assert_eq!(schedule.start_clip(), None);
    }

    #[test]
    fn test_rejects_round_ending_before_start() {
        let file = write_temp(
            r#"{ "rounds": [
                { "id": "bad", "name": "Bad", "startTime": "2025-01-01T11:00:00Z", "endTime": "2025-01-01T10:00:00Z" }
            ] }"#,
        );
        let err = Schedule::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidRound { id } if id == "bad"));
    }

    #[test]
    fn test_missing_file_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let schedule = Schedule::load_or_default(dir.path().join("nope.json"));
        assert!(schedule.rounds.is_empty());
    }

    #[test]
    fn test_malformed_file_falls_back_to_empty() {
        let file = write_temp("{ not json");
        assert!(matches!(
            Schedule::from_file(file.path()),
            Err(ScheduleError::Parse { .. })
        ));
        assert!(Schedule::load_or_default(file.path()).rounds.is_empty());
    }

    #[test]
    fn test_instant_without_offset_uses_system_zone() {
        let ts = parse_instant("2025-10-08T09:00:00").unwrap();
        let expected = "2025-10-08T09:00:00"
            .parse::<civil::DateTime>()
            .unwrap()
            .to_zoned(TimeZone::system())
            .unwrap()
            .timestamp();
        assert_eq!(ts, expected);
        assert!(parse_instant("yesterday-ish").is_err());
    }
}
