use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::schedule::{Round, Schedule};

pub const START_PHRASE: &str = "Starting now";
pub const END_PHRASE: &str = "Round over";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementKind {
    Start,
    End,
}

impl FromStr for AnnouncementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "end" => Ok(Self::End),
            other => Err(format!("expected `start` or `end`, got `{other}`")),
        }
    }
}

impl std::fmt::Display for AnnouncementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::End => f.write_str("end"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Announcement {
    pub kind: AnnouncementKind,
    pub round: Round,
    pub enqueued_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Clip {
        path: PathBuf,
        fallback: String,
        optional: bool,
    },
    Speech(String),
    Pause(Duration),
}

impl Announcement {
    pub fn new(kind: AnnouncementKind, round: &Round, enqueued_at: Timestamp) -> Self {
        Self {
            kind,
            round: round.clone(),
            enqueued_at,
        }
    }

    pub fn segments(&self, schedule: &Schedule, audio_dir: &Path, gap: Duration) -> Vec<Segment> {
        let mut segments = Vec::new();
        match self.kind {
            AnnouncementKind::Start => {
                if let Some(file) = schedule.round_clip(&self.round.id) {
                    segments.push(Segment::Clip {
                        path: audio_dir.join(file),
                        fallback: self.round.name.clone(),
                        optional: true,
                    });
                    if !gap.is_zero() {
                        segments.push(Segment::Pause(gap));
                    }
                }
                segments.push(match schedule.start_clip() {
                    Some(file) => Segment::Clip {
                        path: audio_dir.join(file),
                        fallback: START_PHRASE.to_string(),
                        optional: false,
                    },
                    None => Segment::Speech(format!("{} is starting now!", self.round.name)),
                });
            }
            AnnouncementKind::End => {
                segments.push(match schedule.end_clip() {
                    Some(file) => Segment::Clip {
                        path: audio_dir.join(file),
                        fallback: END_PHRASE.to_string(),
                        optional: false,
                    },
                    None => Segment::Speech(format!("{} is over!", self.round.name)),
                });
            }
        }
        segments
    }
}
