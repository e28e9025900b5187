use anyhow::Context;
use clap::Parser;
use roundcall::{
    config::Config,
    logging,
    switch::{Mode, ScheduleFiles},
};

/// Switch the active schedule between the test timetable and production.
#[derive(Parser)]
#[command(name = "switch-config")]
struct Args {
    #[arg(value_enum)]
    mode: Mode,
}

fn main() -> anyhow::Result<()> {
    logging::init();

    // Usage errors exit with 1 like every other failure here.
    let args = Args::try_parse().unwrap_or_else(|err| {
        if err.use_stderr() {
            let _ = err.print();
            std::process::exit(1);
        }
        err.exit()
    });

    let config = Config::load().context("invalid configuration")?;
    let files = ScheduleFiles {
        active: config.schedule_path(),
        test: config.test_schedule_path(),
        backup: config.backup_schedule_path(),
    };

    let switched = files.switch(args.mode)?;
    match switched.mode {
        Mode::Test => println!("Switched to TEST schedule"),
        Mode::Prod => println!("Switched to PRODUCTION schedule"),
    }
    if switched.backed_up {
        println!("Previous schedule saved to {}", files.backup.display());
    }
    Ok(())
}
