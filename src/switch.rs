use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Test,
    Prod,
}

#[derive(Debug, Error)]
pub enum SwitchError {
    #[error("{role} schedule {path} not found")]
    Missing { role: &'static str, path: PathBuf },

    #[error("failed to copy {from} to {to}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ScheduleFiles {
    pub active: PathBuf,
    pub test: PathBuf,
    pub backup: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Switched {
    pub mode: Mode,
    pub backed_up: bool,
}

impl ScheduleFiles {
    pub fn switch(&self, mode: Mode) -> Result<Switched, SwitchError> {
        match mode {
            Mode::Test => {
                require(&self.test, "test")?;
                let backed_up = self.active.exists() && !same_contents(&self.active, &self.test)?;
                if backed_up {
                    copy(&self.active, &self.backup)?;
                    info!(backup = %self.backup.display(), "saved production schedule");
                }
                copy(&self.test, &self.active)?;
                info!(active = %self.active.display(), "switched to test schedule");
                Ok(Switched { mode, backed_up })
            }
            Mode::Prod => {
                require(&self.backup, "backup")?;
                copy(&self.backup, &self.active)?;
                info!(active = %self.active.display(), "switched to production schedule");
                Ok(Switched {
                    mode,
                    backed_up: false,
                })
            }
        }
    }
}

fn require(path: &Path, role: &'static str) -> Result<(), SwitchError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(SwitchError::Missing {
            role,
            path: path.to_path_buf(),
        })
    }
}

fn copy(from: &Path, to: &Path) -> Result<(), SwitchError> {
    fs::copy(from, to).map_err(|source| SwitchError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn same_contents(a: &Path, b: &Path) -> Result<bool, SwitchError> {
    let read = |path: &Path| {
        fs::read(path).map_err(|source| SwitchError::Read {
            path: path.to_path_buf(),
            source,
        })
    };
    Ok(read(a)? == read(b)?)
}
