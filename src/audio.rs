use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use thiserror::Error;

use crate::config::SpeechConfig;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio file {path} does not exist")]
    Missing { path: PathBuf },

    #[error("failed to open audio file {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode audio file {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: rodio::decoder::DecoderError,
    },

    #[error("audio output unavailable: {0}")]
    Output(String),

    #[error("speech synthesis failed: {0}")]
    Speech(String),

    #[error("playback did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("playback task failed: {0}")]
    Task(String),
}

const STOP_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Default)]
pub struct Stop {
    requested: Arc<AtomicBool>,
}

impl Stop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::Relaxed);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Relaxed)
    }
}

/// Plays one clip or phrase and returns once it has finished, or soon after
/// `stop` is requested.
pub trait AudioBackend: Send + Sync + 'static {
    fn play_file(&self, path: &Path, stop: &Stop) -> Result<(), PlaybackError>;

    fn speak(&self, text: &str, stop: &Stop) -> Result<(), PlaybackError>;
}

pub struct SystemAudio {
    volume: f32,
    speech: SpeechConfig,
}

impl SystemAudio {
    pub fn new(volume: u8, speech: SpeechConfig) -> Self {
        Self {
            volume: f32::from(volume.min(100)) / 100.0,
            speech,
        }
    }
}

impl AudioBackend for SystemAudio {
    fn play_file(&self, path: &Path, stop: &Stop) -> Result<(), PlaybackError> {
        use rodio::{Decoder, OutputStream, Sink};

        if !path.is_file() {
            return Err(PlaybackError::Missing {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path).map_err(|source| PlaybackError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let source =
            Decoder::new(BufReader::new(file)).map_err(|source| PlaybackError::Decode {
                path: path.to_path_buf(),
                source,
            })?;

        // The stream must outlive the sink.
        let (_stream, stream_handle) =
            OutputStream::try_default().map_err(|e| PlaybackError::Output(e.to_string()))?;
        let sink = Sink::try_new(&stream_handle).map_err(|e| PlaybackError::Output(e.to_string()))?;

        sink.set_volume(self.volume);
        sink.append(source);
        while !sink.empty() {
            if stop.is_requested() {
                sink.stop();
                break;
            }
            std::thread::sleep(STOP_POLL);
        }
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn speak(&self, text: &str, stop: &Stop) -> Result<(), PlaybackError> {
        let mut tts = tts::Tts::default().map_err(|e| PlaybackError::Speech(e.to_string()))?;

        let rate = (tts.normal_rate() * self.speech.rate).clamp(tts.min_rate(), tts.max_rate());
        let pitch =
            (tts.normal_pitch() * self.speech.pitch).clamp(tts.min_pitch(), tts.max_pitch());
        let volume = self.speech.volume.clamp(tts.min_volume(), tts.max_volume());
        let _ = tts.set_rate(rate);
        let _ = tts.set_pitch(pitch);
        let _ = tts.set_volume(volume);

        tts.speak(text, false)
            .map_err(|e| PlaybackError::Speech(e.to_string()))?;

        // Engines report completion asynchronously; give the utterance a
        // moment to begin before polling.
        std::thread::sleep(Duration::from_millis(100));
        while tts.is_speaking().unwrap_or(false) {
            if stop.is_requested() {
                let _ = tts.stop();
                break;
            }
            std::thread::sleep(STOP_POLL);
        }
        Ok(())
    }

    #[cfg(target_os = "linux")]
    fn speak(&self, text: &str, stop: &Stop) -> Result<(), PlaybackError> {
        use std::process::Command;

        let mut child = Command::new("espeak")
            .args(espeak_args(&self.speech))
            .arg(text)
            .spawn()
            .map_err(|e| PlaybackError::Speech(format!("espeak: {e}")))?;
        loop {
            let exited = child
                .try_wait()
                .map_err(|e| PlaybackError::Speech(format!("espeak: {e}")))?;
            if let Some(status) = exited {
                if !status.success() {
                    return Err(PlaybackError::Speech(format!("espeak exited with {status}")));
                }
                return Ok(());
            }
            if stop.is_requested() {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(());
            }
            std::thread::sleep(STOP_POLL);
        }
    }
}

pub fn espeak_args(speech: &SpeechConfig) -> Vec<String> {
    let words_per_minute = (175.0 * speech.rate).round().clamp(80.0, 450.0);
    let pitch = (50.0 * speech.pitch).round().clamp(0.0, 99.0);
    let amplitude = (100.0 * speech.volume).round().clamp(0.0, 200.0);
    vec![
        "-s".to_string(),
        format!("{words_per_minute}"),
        "-p".to_string(),
        format!("{pitch}"),
        "-a".to_string(),
        format!("{amplitude}"),
    ]
}
