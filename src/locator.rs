use jiff::{SignedDuration, Timestamp};
use serde::Serialize;

use crate::schedule::Round;

pub fn current_round(rounds: &[Round], now: Timestamp) -> Option<&Round> {
    rounds
        .iter()
        .find(|round| round.start_time <= now && now <= round.end_time)
}

pub fn next_round(rounds: &[Round], now: Timestamp) -> Option<&Round> {
    rounds.iter().find(|round| round.start_time > now)
}

pub fn progress(round: &Round, now: Timestamp) -> f64 {
    let total = round.end_time.duration_since(round.start_time).as_secs_f64();
    if total <= 0.0 {
        return 100.0;
    }
    let elapsed = now.duration_since(round.start_time).as_secs_f64();
    (elapsed / total * 100.0).clamp(0.0, 100.0)
}

pub fn progress_percent(round: &Round, now: Timestamp) -> u8 {
    progress(round, now).round() as u8
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Countdown {
    pub hours: u64,
    pub minutes: u8,
    pub seconds: u8,
}

impl Countdown {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn until(target: Timestamp, now: Timestamp) -> Self {
        Self::from_remaining(target.duration_since(now))
    }

    pub fn from_remaining(remaining: SignedDuration) -> Self {
        if remaining <= SignedDuration::ZERO {
            return Self::zero();
        }
        let total = remaining.as_secs() as u64;
        Self {
            hours: total / 3600,
            minutes: ((total % 3600) / 60) as u8,
            seconds: (total % 60) as u8,
        }
    }

    pub fn total_seconds(self) -> u64 {
        self.hours * 3600 + u64::from(self.minutes) * 60 + u64::from(self.seconds)
    }
}

impl std::fmt::Display for Countdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds
        )
    }
}
