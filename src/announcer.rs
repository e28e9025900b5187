use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::{
    announcement::{Announcement, AnnouncementKind, Segment},
    audio::{AudioBackend, PlaybackError, Stop},
    config::PlaybackConfig,
    schedule::Schedule,
};

const STOP_GRACE: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct AnnouncementQueue {
    tx: mpsc::UnboundedSender<Announcement>,
}

impl AnnouncementQueue {
    pub fn enqueue(&self, announcement: Announcement) -> bool {
        let round = announcement.round.id.clone();
        let kind = announcement.kind;
        match self.tx.send(announcement) {
            Ok(()) => {
                debug!(%round, %kind, "announcement queued");
                true
            }
            Err(_) => {
                warn!(%round, %kind, "announcer stopped, dropping announcement");
                false
            }
        }
    }
}

pub fn create_announcement_queue() -> (AnnouncementQueue, mpsc::UnboundedReceiver<Announcement>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (AnnouncementQueue { tx }, rx)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlayerState {
    Idle,
    Playing { kind: AnnouncementKind, round: String },
}

pub struct Announcer {
    queue: mpsc::UnboundedReceiver<Announcement>,
    backend: Arc<dyn AudioBackend>,
    schedule: Arc<Schedule>,
    audio_dir: PathBuf,
    playback: PlaybackConfig,
    state: watch::Sender<PlayerState>,
}

impl Announcer {
    pub fn new(
        queue: mpsc::UnboundedReceiver<Announcement>,
        backend: Arc<dyn AudioBackend>,
        schedule: Arc<Schedule>,
        audio_dir: &Path,
        playback: PlaybackConfig,
    ) -> Self {
        let (state, _) = watch::channel(PlayerState::Idle);
        Self {
            queue,
            backend,
            schedule,
            audio_dir: audio_dir.to_path_buf(),
            playback,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerState> {
        self.state.subscribe()
    }

    pub async fn run(mut self) {
        while let Some(announcement) = self.queue.recv().await {
            if !self.playback.enabled {
                info!(
                    round = %announcement.round.id,
                    kind = %announcement.kind,
                    "playback disabled, skipping announcement"
                );
                continue;
            }

            self.state.send_replace(PlayerState::Playing {
                kind: announcement.kind,
                round: announcement.round.id.clone(),
            });
            self.play(&announcement).await;
            self.state.send_replace(PlayerState::Idle);
        }
        debug!("announcement queue closed");
    }

    pub async fn play(&self, announcement: &Announcement) {
        let waited = jiff::Timestamp::now().duration_since(announcement.enqueued_at);
        info!(
            round = %announcement.round.id,
            kind = %announcement.kind,
            queued_for = ?waited,
            "announcing"
        );
        let segments = announcement.segments(
            &self.schedule,
            &self.audio_dir,
            self.playback.segment_gap(),
        );
        for segment in segments {
            self.play_segment(segment).await;
        }
    }

    async fn play_segment(&self, segment: Segment) {
        match segment {
            Segment::Pause(gap) => tokio::time::sleep(gap).await,
            Segment::Speech(text) => self.speak(text).await,
            Segment::Clip {
                path,
                fallback,
                optional,
            } => {
                let clip = path.clone();
                match self
                    .blocking(move |backend, stop| backend.play_file(&clip, stop))
                    .await
                {
                    Ok(()) => {}
                    Err(PlaybackError::Missing { .. }) if optional => {
                        debug!(path = %path.display(), "optional clip missing, skipping");
                    }
                    Err(err @ PlaybackError::TimedOut(_)) => {
                        warn!(path = %path.display(), error = %err, "clip abandoned");
                    }
                    Err(err) => {
                        warn!(path = %path.display(), error = ?err, "clip failed, speaking instead");
                        self.speak(fallback).await;
                    }
                }
            }
        }
    }

    async fn speak(&self, text: String) {
        let phrase = text.clone();
        if let Err(err) = self
            .blocking(move |backend, stop| backend.speak(&phrase, stop))
            .await
        {
            warn!(%text, error = ?err, "speech failed");
        }
    }

    /// Runs blocking playback off the runtime, bounded by the playback
    /// timeout. A timed-out segment is stopped and joined before returning,
    /// so it cannot overlap whatever plays next.
    async fn blocking<F>(&self, play: F) -> Result<(), PlaybackError>
    where
        F: FnOnce(&dyn AudioBackend, &Stop) -> Result<(), PlaybackError> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let stop = Stop::new();
        let player_stop = stop.clone();
        let mut task =
            tokio::task::spawn_blocking(move || play(backend.as_ref(), &player_stop));
        let timeout = self.playback.timeout();
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(PlaybackError::Task(join_err.to_string())),
            Err(_) => {
                stop.request();
                if tokio::time::timeout(STOP_GRACE, task).await.is_err() {
                    warn!(grace = ?STOP_GRACE, "playback ignored stop request");
                }
                Err(PlaybackError::TimedOut(timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{BTreeMap, HashMap},
        sync::Mutex,
        time::{Duration, Instant},
    };

    use jiff::Timestamp;

    use crate::{
        config::PlaybackConfig,
        schedule::{AudioConfig, Round},
    };

    use super::*;

    #[derive(Clone, Copy)]
    enum Clip {
        Plays,
        Fails,
        Hangs,
    }

    struct RecordingBackend {
        clips: HashMap<PathBuf, Clip>,
        log: Arc<Mutex<Vec<String>>>,
        duration: Duration,
    }

    impl RecordingBackend {
        fn new(clips: &[(&str, Clip)]) -> (Self, Arc<Mutex<Vec<String>>>) {
            let log = Arc::new(Mutex::new(Vec::new()));
            let backend = Self {
                clips: clips
                    .iter()
                    .map(|(name, clip)| (Path::new("audio").join(name), *clip))
                    .collect(),
                log: Arc::clone(&log),
                duration: Duration::from_millis(20),
            };
            (backend, log)
        }

        fn record(&self, entry: String) {
            self.log.lock().unwrap().push(entry);
        }
    }

    impl AudioBackend for RecordingBackend {
        fn play_file(&self, path: &Path, stop: &Stop) -> Result<(), PlaybackError> {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            match self.clips.get(path).copied() {
                None => Err(PlaybackError::Missing {
                    path: path.to_path_buf(),
                }),
                Some(Clip::Fails) => Err(PlaybackError::Output("no device".into())),
                Some(Clip::Plays) => {
                    self.record(format!("begin {name}"));
                    std::thread::sleep(self.duration);
                    self.record(format!("end {name}"));
                    Ok(())
                }
                Some(Clip::Hangs) => {
                    self.record(format!("begin {name}"));
                    let deadline = Instant::now() + Duration::from_millis(500);
                    while Instant::now() < deadline {
                        if stop.is_requested() {
                            self.record(format!("stop {name}"));
                            return Ok(());
                        }
                        std::thread::sleep(Duration::from_millis(5));
                    }
                    self.record(format!("end {name}"));
                    Ok(())
                }
            }
        }

        fn speak(&self, text: &str, _stop: &Stop) -> Result<(), PlaybackError> {
            self.record(format!("speak {text}"));
            Ok(())
        }
    }

    fn schedule() -> Schedule {
        Schedule {
            rounds: vec![round("a", "Round A"), round("b", "Round B")],
            audio: Some(AudioConfig {
                round_start: Some("start.wav".into()),
                round_end: Some("end.wav".into()),
                rounds: BTreeMap::from([("b".to_string(), "b.wav".to_string())]),
            }),
            ..Schedule::default()
        }
    }

    fn round(id: &str, name: &str) -> Round {
        Round::new(
            id,
            name,
            "2025-01-01T10:00:00Z".parse().unwrap(),
            "2025-01-01T10:01:00Z".parse().unwrap(),
        )
    }

    fn playback(timeout_ms: u64) -> PlaybackConfig {
        PlaybackConfig {
            segment_gap_ms: 1,
            timeout_ms,
            ..PlaybackConfig::default()
        }
    }

    fn announcer(
        backend: RecordingBackend,
        playback: PlaybackConfig,
    ) -> (Announcer, AnnouncementQueue) {
        let (queue, rx) = create_announcement_queue();
        let announcer = Announcer::new(
            rx,
            Arc::new(backend),
            Arc::new(schedule()),
            Path::new("audio"),
            playback,
        );
        (announcer, queue)
    }

    fn announce(queue: &AnnouncementQueue, kind: AnnouncementKind, id: &str, name: &str) {
        assert!(queue.enqueue(Announcement::new(kind, &round(id, name), Timestamp::now())));
    }

    fn entries(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_plays_in_enqueue_order_without_overlap() {
        let (backend, log) = RecordingBackend::new(&[
            ("start.wav", Clip::Plays),
            ("end.wav", Clip::Plays),
            ("b.wav", Clip::Plays),
        ]);
        let (announcer, queue) = announcer(backend, playback(5_000));

        announce(&queue, AnnouncementKind::End, "a", "Round A");
        announce(&queue, AnnouncementKind::Start, "b", "Round B");
        drop(queue);
        announcer.run().await;

        assert_eq!(
            entries(&log),
            vec![
                "begin end.wav",
                "end end.wav",
                "begin b.wav",
                "end b.wav",
                "begin start.wav",
                "end start.wav",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_clip_falls_back_to_speech() {
        let (backend, log) =
            RecordingBackend::new(&[("start.wav", Clip::Fails), ("b.wav", Clip::Fails)]);
        let (announcer, queue) = announcer(backend, playback(5_000));

        announce(&queue, AnnouncementKind::Start, "b", "Round B");
        drop(queue);
        announcer.run().await;

        assert_eq!(entries(&log), vec!["speak Round B", "speak Starting now"]);
    }

    #[tokio::test]
    async fn test_missing_round_clip_is_skipped_but_generic_is_spoken() {
        let (backend, log) = RecordingBackend::new(&[("end.wav", Clip::Plays)]);
        let (announcer, queue) = announcer(backend, playback(5_000));

        announce(&queue, AnnouncementKind::Start, "b", "Round B");
        announce(&queue, AnnouncementKind::End, "b", "Round B");
        drop(queue);
        announcer.run().await;

        assert_eq!(
            entries(&log),
            vec!["speak Starting now", "begin end.wav", "end end.wav"]
        );
    }

    #[tokio::test]
    async fn test_hung_clip_does_not_stall_queue() {
        let (backend, log) =
            RecordingBackend::new(&[("start.wav", Clip::Hangs), ("end.wav", Clip::Plays)]);
        let (announcer, queue) = announcer(backend, playback(50));

        announce(&queue, AnnouncementKind::Start, "a", "Round A");
        announce(&queue, AnnouncementKind::End, "a", "Round A");
        drop(queue);

        let started = Instant::now();
        announcer.run().await;
        assert!(started.elapsed() < Duration::from_millis(450));

        assert_eq!(
            entries(&log),
            vec!["begin start.wav", "stop start.wav", "begin end.wav", "end end.wav"]
        );
    }

    #[tokio::test]
    async fn test_timed_out_clip_is_silenced_before_next_announcement() {
        let (backend, log) =
            RecordingBackend::new(&[("start.wav", Clip::Hangs), ("end.wav", Clip::Plays)]);
        let (announcer, queue) = announcer(backend, playback(50));

        announce(&queue, AnnouncementKind::Start, "a", "Round A");
        announce(&queue, AnnouncementKind::End, "a", "Round A");
        drop(queue);
        announcer.run().await;

        // Give a leaked player thread time to finish if it was not joined.
        tokio::time::sleep(Duration::from_millis(600)).await;
        let log = entries(&log);
        let next = log.iter().position(|e| e == "begin end.wav").unwrap();
        assert!(!log[next..].contains(&"end start.wav".to_string()));
        assert!(!log.contains(&"end start.wav".to_string()));
    }

    #[tokio::test]
    async fn test_disabled_playback_drains_silently() {
        let (backend, log) = RecordingBackend::new(&[("end.wav", Clip::Plays)]);
        let (announcer, queue) = announcer(
            backend,
            PlaybackConfig {
                enabled: false,
                ..playback(5_000)
            },
        );

        announce(&queue, AnnouncementKind::End, "a", "Round A");
        drop(queue);
        announcer.run().await;

        assert!(entries(&log).is_empty());
    }

    #[tokio::test]
    async fn test_player_state_returns_to_idle() {
        let (backend, _log) = RecordingBackend::new(&[("end.wav", Clip::Plays)]);
        let (announcer, queue) = announcer(backend, playback(5_000));
        let state = announcer.subscribe();

        announce(&queue, AnnouncementKind::End, "a", "Round A");
        drop(queue);
        announcer.run().await;

        assert_eq!(*state.borrow(), PlayerState::Idle);
    }

    #[test]
    fn test_enqueue_after_consumer_dropped() {
        let (queue, rx) = create_announcement_queue();
        drop(rx);
        assert!(!queue.enqueue(Announcement::new(
            AnnouncementKind::Start,
            &round("a", "Round A"),
            Timestamp::now()
        )));
    }
}
