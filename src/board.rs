use std::fmt::{self, Write};

use jiff::{Timestamp, tz::TimeZone};
use serde::Serialize;

use crate::{
    announcer::PlayerState,
    locator::{Countdown, current_round, next_round, progress_percent},
    schedule::{EventInfo, Round, Schedule},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Live,
    Upcoming,
    Ended,
    Idle,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
    pub id: String,
    pub name: String,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub start_label: String,
    pub end_label: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardStatus {
    pub event: EventInfo,
    pub now: Timestamp,
    pub phase: Phase,
    pub current: Option<RoundView>,
    pub next: Option<RoundView>,
    pub progress_percent: u8,
    pub countdown: Countdown,
    pub player: PlayerState,
}

impl BoardStatus {
    pub fn at(schedule: &Schedule, now: Timestamp, player: PlayerState) -> Self {
        let current = current_round(&schedule.rounds, now);
        let next = next_round(&schedule.rounds, now);

        let phase = match (current, next) {
            (Some(_), _) => Phase::Live,
            (None, Some(_)) => Phase::Upcoming,
            (None, None) if schedule.rounds.is_empty() => Phase::Idle,
            (None, None) => Phase::Ended,
        };

        let countdown = match (current, next) {
            (Some(round), _) => Countdown::until(round.end_time, now),
            (None, Some(round)) => Countdown::until(round.start_time, now),
            (None, None) => Countdown::zero(),
        };

        Self {
            event: schedule.event.clone(),
            now,
            phase,
            current: current.map(RoundView::from),
            next: next.map(RoundView::from),
            progress_percent: current.map_or(0, |round| progress_percent(round, now)),
            countdown,
            player,
        }
    }

    pub fn render(&self, out: &mut String) -> fmt::Result {
        let title: &str = if self.event.name.is_empty() {
            "Status board"
        } else {
            &self.event.name
        };
        writeln!(out, "{title}")?;
        if !self.event.theme.is_empty() {
            writeln!(out, "{}", self.event.theme)?;
        }
        writeln!(out)?;

        match &self.current {
            Some(round) => {
                writeln!(out, "NOW      {} (Live Now)", round.name)?;
                writeln!(out, "         {} - {}", round.start_label, round.end_label)?;
                writeln!(out, "         {}% complete", self.progress_percent)?;
            }
            None => {
                writeln!(out, "NOW      Hackathon Not Started (Upcoming)")?;
                writeln!(out, "         --:-- - --:--")?;
            }
        }
        match &self.next {
            Some(round) => writeln!(out, "NEXT     {} at {}", round.name, round.start_label)?,
            None => writeln!(out, "NEXT     Hackathon Ended")?,
        }
        writeln!(out, "TIME     {}", self.countdown)?;
        Ok(())
    }
}

impl From<&Round> for RoundView {
    fn from(round: &Round) -> Self {
        Self {
            id: round.id.clone(),
            name: round.name.clone(),
            start_time: round.start_time,
            end_time: round.end_time,
            start_label: clock_label(round.start_time),
            end_label: clock_label(round.end_time),
        }
    }
}

pub fn clock_label(ts: Timestamp) -> String {
    ts.to_zoned(TimeZone::system()).strftime("%I:%M %p").to_string()
}
