use std::{io, sync::Arc};

use anyhow::Context;
use roundcall::{
    app::{AppState, run_ticker},
    audio::SystemAudio,
    config::Config,
    logging,
    schedule::Schedule,
    server,
};
use tokio::net::TcpListener;
use tracing::error;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = Config::load().context("invalid configuration")?;
    let schedule = Schedule::load_or_default(config.schedule_path());
    let backend = Arc::new(SystemAudio::new(
        config.playback.volume,
        config.playback.speech,
    ));
    let (state, announcer) = AppState::build(config, schedule, backend);

    let addr = state.config.bind_address();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            if err.kind() == io::ErrorKind::AddrInUse {
                error!(%addr, "port already in use, try another one with PORT=3001");
            }
            return Err(err).with_context(|| format!("failed to bind {addr}"));
        }
    };

    let announcer = tokio::spawn(announcer.run());
    let ticker = tokio::spawn(run_ticker(state.clone()));

    server::serve(listener, state).await?;

    ticker.abort();
    announcer.abort();
    Ok(())
}
