use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jiff::Timestamp;
use tokio::{sync::watch, time::MissedTickBehavior};
use tracing::info;

use crate::{
    announcement::AnnouncementKind,
    announcer::{AnnouncementQueue, Announcer, PlayerState, create_announcement_queue},
    audio::AudioBackend,
    board::BoardStatus,
    config::Config,
    detector::{DetectorError, TransitionDetector},
    schedule::Schedule,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub schedule: Arc<Schedule>,
    detector: Arc<Mutex<TransitionDetector>>,
    queue: AnnouncementQueue,
    player: watch::Receiver<PlayerState>,
}

impl AppState {
    pub fn build(
        config: Config,
        schedule: Schedule,
        backend: Arc<dyn AudioBackend>,
    ) -> (Self, Announcer) {
        let schedule = Arc::new(schedule);
        let detector = TransitionDetector::new(schedule.rounds.clone(), &config.triggers);
        let (queue, rx) = create_announcement_queue();
        let announcer = Announcer::new(
            rx,
            backend,
            Arc::clone(&schedule),
            &config.audio_path(),
            config.playback.clone(),
        );
        let state = Self {
            config: Arc::new(config),
            schedule,
            detector: Arc::new(Mutex::new(detector)),
            queue,
            player: announcer.subscribe(),
        };
        (state, announcer)
    }

    pub fn status(&self, now: Timestamp) -> BoardStatus {
        BoardStatus::at(&self.schedule, now, self.player.borrow().clone())
    }

    pub fn poll(&self, now: Timestamp) -> usize {
        let due = self.detector().poll(now);
        let count = due.len();
        for announcement in due {
            info!(
                round = %announcement.round.id,
                kind = %announcement.kind,
                "round transition"
            );
            self.queue.enqueue(announcement);
        }
        count
    }

    pub fn announce(&self, round_id: &str, kind: AnnouncementKind) -> Result<(), DetectorError> {
        let announcement = self.detector().trigger(round_id, kind, Timestamp::now())?;
        info!(round = %round_id, %kind, "manual announcement");
        self.queue.enqueue(announcement);
        Ok(())
    }

    pub fn reset(&self, round_id: &str) -> Result<(), DetectorError> {
        self.detector().reset(round_id)?;
        info!(round = %round_id, "announcement state reset");
        Ok(())
    }

    fn detector(&self) -> MutexGuard<'_, TransitionDetector> {
        self.detector.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub async fn run_ticker(state: AppState) {
    let mut interval = tokio::time::interval(state.config.poll_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        state.poll(Timestamp::now());
    }
}
