use std::{path::PathBuf, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use jiff::SignedDuration;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "roundcall.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub root: PathBuf,
    pub schedule: PathBuf,
    pub audio_dir: PathBuf,
    pub poll_interval_ms: u64,
    pub triggers: TriggerConfig,
    pub playback: PlaybackConfig,
    pub switch: SwitchConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub start_lead_ms: u64,
    pub start_trail_ms: u64,
    pub end_lead_ms: u64,
    pub end_trail_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    pub enabled: bool,
    pub volume: u8,
    pub segment_gap_ms: u64,
    pub timeout_ms: u64,
    pub speech: SpeechConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpeechConfig {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchConfig {
    pub test: PathBuf,
    pub backup: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_address: "0.0.0.0".to_string(),
            root: PathBuf::from("."),
            schedule: PathBuf::from("hackathon-config.json"),
            audio_dir: PathBuf::from("audio"),
            poll_interval_ms: 1000,
            triggers: TriggerConfig::default(),
            playback: PlaybackConfig::default(),
            switch: SwitchConfig::default(),
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            start_lead_ms: 0,
            start_trail_ms: 5000,
            end_lead_ms: 0,
            end_trail_ms: 5000,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 100,
            segment_gap_ms: 400,
            timeout_ms: 30_000,
            speech: SpeechConfig::default(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            rate: 0.8,
            pitch: 1.2,
            volume: 0.8,
        }
    }
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            test: PathBuf::from("hackathon-config-test.json"),
            backup: PathBuf::from("hackathon-config-backup.json"),
        }
    }
}

impl Config {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::raw().only(&["PORT"]))
            .merge(Env::prefixed("ROUNDCALL_").split("__"))
    }

    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    // Relative paths below are resolved against the served root, where the
    // board also fetches them from.
    pub fn schedule_path(&self) -> PathBuf {
        self.root.join(&self.schedule)
    }

    pub fn audio_path(&self) -> PathBuf {
        self.root.join(&self.audio_dir)
    }

    pub fn test_schedule_path(&self) -> PathBuf {
        self.root.join(&self.switch.test)
    }

    pub fn backup_schedule_path(&self) -> PathBuf {
        self.root.join(&self.switch.backup)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl TriggerConfig {
    pub fn start_lead(&self) -> SignedDuration {
        millis(self.start_lead_ms)
    }

    pub fn start_trail(&self) -> SignedDuration {
        millis(self.start_trail_ms)
    }

    pub fn end_lead(&self) -> SignedDuration {
        millis(self.end_lead_ms)
    }

    pub fn end_trail(&self) -> SignedDuration {
        millis(self.end_trail_ms)
    }
}

impl PlaybackConfig {
    pub fn segment_gap(&self) -> Duration {
        Duration::from_millis(self.segment_gap_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn millis(ms: u64) -> SignedDuration {
    SignedDuration::from_millis(i64::try_from(ms).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load()?;
            assert_eq!(config.port, 3000);
            assert_eq!(config.triggers, TriggerConfig::default());
            assert_eq!(config.playback.segment_gap(), Duration::from_millis(400));
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_precedence() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                port = 8080
                audio_dir = "clips"

                [triggers]
                start_trail_ms = 10000
                "#,
            )?;
            jail.set_env("PORT", "4000");
            jail.set_env("ROUNDCALL_TRIGGERS__END_TRAIL_MS", "0");

            let config = Config::load()?;
            assert_eq!(config.port, 4000);
            assert_eq!(config.audio_dir, PathBuf::from("clips"));
            assert_eq!(config.triggers.start_trail_ms, 10_000);
            assert_eq!(config.triggers.end_trail_ms, 0);
            assert_eq!(config.triggers.start_lead_ms, 0);
            assert_eq!(config.audio_path(), PathBuf::from(".").join("clips"));
            Ok(())
        });
    }

    #[test]
    fn test_prefixed_port_wins_over_bare_port() {
        Jail::expect_with(|jail| {
            jail.set_env("PORT", "4000");
            jail.set_env("ROUNDCALL_PORT", "5000");
            assert_eq!(Config::load()?.port, 5000);
            Ok(())
        });
    }
}
