use std::{io::Write, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use jiff::Timestamp;
use roundcall::{
    announcement::AnnouncementKind,
    app::{AppState, run_ticker},
    audio::SystemAudio,
    config::Config,
    logging,
    regen::{espeak_to_file, regenerate},
    schedule::Schedule,
};
use tracing::warn;

#[derive(Parser)]
struct Args {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Parser)]
enum Command {
    /// Print the board once.
    Status {
        #[clap(long)]
        json: bool,
    },
    /// Keep the board on screen and play announcements, without HTTP.
    Watch,
    /// Play a round's start or end announcement right away.
    Announce { round: String, kind: AnnouncementKind },
    /// Render placeholder clips for the schedule with espeak.
    RegenAudio,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let args = Args::parse();
    let config = Config::load().context("invalid configuration")?;

    match args.cmd {
        Command::Status { json } => {
            let schedule = Schedule::load_or_default(config.schedule_path());
            let (state, _) = build(config, schedule);
            let status = state.status(Timestamp::now());
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                let mut out = String::new();
                status.render(&mut out)?;
                print!("{out}");
            }
        }
        Command::Watch => {
            let schedule = Schedule::load_or_default(config.schedule_path());
            let (state, announcer) = build(config, schedule);
            let announcer = tokio::spawn(announcer.run());
            let ticker = tokio::spawn(run_ticker(state.clone()));

            let mut redraw = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = redraw.tick() => {
                        let mut out = String::new();
                        state.status(Timestamp::now()).render(&mut out)?;
                        let mut stdout = std::io::stdout().lock();
                        write!(stdout, "\x1b[2J\x1b[H{out}")?;
                        stdout.flush()?;
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            ticker.abort();
            announcer.abort();
        }
        Command::Announce { round, kind } => {
            let schedule = Schedule::from_file(config.schedule_path())?;
            let (state, announcer) = build(config, schedule);
            state
                .announce(&round, kind)
                .with_context(|| format!("cannot announce {kind} of {round}"))?;
            // Closing the queue lets the announcer return once it has played.
            drop(state);
            announcer.run().await;
        }
        Command::RegenAudio => {
            let schedule = Schedule::from_file(config.schedule_path())?;
            let speech = config.playback.speech;
            let report = regenerate(&schedule, &config.audio_path(), |request| {
                espeak_to_file(&speech, request)
            })
            .context("audio regeneration failed")?;
            println!(
                "{} clips written to {}",
                report.written.len(),
                config.audio_path().display()
            );
            for (path, err) in &report.failed {
                warn!(path = %path.display(), error = %err, "not regenerated");
            }
        }
    }
    Ok(())
}

fn build(config: Config, schedule: Schedule) -> (AppState, roundcall::announcer::Announcer) {
    let backend = Arc::new(SystemAudio::new(
        config.playback.volume,
        config.playback.speech,
    ));
    AppState::build(config, schedule, backend)
}
