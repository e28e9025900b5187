use jiff::{SignedDuration, Timestamp};
use thiserror::Error;
use tracing::debug;

use crate::{
    announcement::{Announcement, AnnouncementKind},
    config::TriggerConfig,
    schedule::{Announced, Round},
};

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("no round with id {0}")]
    UnknownRound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerWindow {
    pub lead: SignedDuration,
    pub trail: SignedDuration,
}

impl TriggerWindow {
    pub fn contains(&self, boundary: Timestamp, now: Timestamp) -> bool {
        let offset = now.duration_since(boundary);
        -self.lead <= offset && offset <= self.trail
    }
}

pub struct TransitionDetector {
    rounds: Vec<Round>,
    start_window: TriggerWindow,
    end_window: TriggerWindow,
}

impl TransitionDetector {
    pub fn new(rounds: Vec<Round>, triggers: &TriggerConfig) -> Self {
        Self {
            rounds,
            start_window: TriggerWindow {
                lead: triggers.start_lead(),
                trail: triggers.start_trail(),
            },
            end_window: TriggerWindow {
                lead: triggers.end_lead(),
                trail: triggers.end_trail(),
            },
        }
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn state(&self, round_id: &str) -> Option<Announced> {
        self.round(round_id).map(|round| round.announced)
    }

    pub fn poll(&mut self, now: Timestamp) -> Vec<Announcement> {
        let mut due = Vec::new();
        for round in &mut self.rounds {
            if round.announced == Announced::NotAnnounced
                && self.start_window.contains(round.start_time, now)
            {
                round.announced = Announced::StartAnnounced;
                debug!(round = %round.id, "start window entered");
                due.push(Announcement::new(AnnouncementKind::Start, round, now));
            }
            if round.announced < Announced::EndAnnounced
                && self.end_window.contains(round.end_time, now)
            {
                round.announced = Announced::EndAnnounced;
                debug!(round = %round.id, "end window entered");
                due.push(Announcement::new(AnnouncementKind::End, round, now));
            }
        }
        due
    }

    pub fn reset(&mut self, round_id: &str) -> Result<(), DetectorError> {
        let round = self
            .rounds
            .iter_mut()
            .find(|round| round.id == round_id)
            .ok_or_else(|| DetectorError::UnknownRound(round_id.to_string()))?;
        round.announced = Announced::NotAnnounced;
        Ok(())
    }

    /// Announces a round regardless of its state, then marks it announced so
    /// the next poll inside the same window stays quiet.
    pub fn trigger(
        &mut self,
        round_id: &str,
        kind: AnnouncementKind,
        now: Timestamp,
    ) -> Result<Announcement, DetectorError> {
        let round = self
            .rounds
            .iter_mut()
            .find(|round| round.id == round_id)
            .ok_or_else(|| DetectorError::UnknownRound(round_id.to_string()))?;
        round.announced = match kind {
            AnnouncementKind::Start => Announced::StartAnnounced,
            AnnouncementKind::End => Announced::EndAnnounced,
        };
        Ok(Announcement::new(kind, round, now))
    }

    fn round(&self, round_id: &str) -> Option<&Round> {
        self.rounds.iter().find(|round| round.id == round_id)
    }
}
