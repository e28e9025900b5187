use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    announcement::{END_PHRASE, START_PHRASE},
    audio::espeak_args,
    config::SpeechConfig,
    schedule::Schedule,
};

const DEFAULT_START_CLIP: &str = "round-start.wav";
const DEFAULT_END_CLIP: &str = "round-end.wav";

#[derive(Debug, Error)]
pub enum RegenError {
    #[error("failed to create audio directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run espeak for {path}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("espeak failed for {path}: {status}")]
    Synthesis { path: PathBuf, status: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipRequest {
    pub path: PathBuf,
    pub phrase: String,
    pub required: bool,
}

#[derive(Debug, Default)]
pub struct RegenReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, RegenError)>,
}

pub fn clip_requests(schedule: &Schedule, audio_dir: &Path) -> Vec<ClipRequest> {
    let mut requests = vec![
        ClipRequest {
            path: audio_dir.join(schedule.start_clip().unwrap_or(DEFAULT_START_CLIP)),
            phrase: START_PHRASE.to_string(),
            required: true,
        },
        ClipRequest {
            path: audio_dir.join(schedule.end_clip().unwrap_or(DEFAULT_END_CLIP)),
            phrase: END_PHRASE.to_string(),
            required: true,
        },
    ];
    if let Some(audio) = &schedule.audio {
        for (round_id, file) in &audio.rounds {
            match schedule.round(round_id) {
                Some(round) => requests.push(ClipRequest {
                    path: audio_dir.join(file),
                    phrase: round.name.clone(),
                    required: false,
                }),
                None => warn!(round = %round_id, "clip configured for unknown round"),
            }
        }
    }
    requests
}

pub fn regenerate<F>(schedule: &Schedule, audio_dir: &Path, mut render: F) -> Result<RegenReport, RegenError>
where
    F: FnMut(&ClipRequest) -> Result<(), RegenError>,
{
    fs::create_dir_all(audio_dir).map_err(|source| RegenError::CreateDir {
        path: audio_dir.to_path_buf(),
        source,
    })?;

    let mut report = RegenReport::default();
    for request in clip_requests(schedule, audio_dir) {
        match render(&request) {
            Ok(()) => {
                info!(path = %request.path.display(), phrase = %request.phrase, "clip written");
                report.written.push(request.path);
            }
            Err(err) if request.required => {
                error!(path = %request.path.display(), error = ?err, "generic clip failed");
                return Err(err);
            }
            Err(err) => {
                warn!(path = %request.path.display(), error = ?err, "clip failed");
                report.failed.push((request.path, err));
            }
        }
    }
    Ok(report)
}

pub fn espeak_to_file(speech: &SpeechConfig, request: &ClipRequest) -> Result<(), RegenError> {
    let status = Command::new("espeak")
        .args(espeak_args(speech))
        .arg("-w")
        .arg(&request.path)
        .arg(&request.phrase)
        .status()
        .map_err(|source| RegenError::Spawn {
            path: request.path.clone(),
            source,
        })?;
    if !status.success() {
        return Err(RegenError::Synthesis {
            path: request.path.clone(),
            status: status.to_string(),
        });
    }
    Ok(())
}
