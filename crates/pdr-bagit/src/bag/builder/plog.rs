//! Per-bag preservation log.
//!
//! Each builder owns a `tracing` dispatcher whose only sink is a log file in
//! the bag root. Events sent through it are written there (info and above)
//! and never reach the process-wide subscriber; the builder mirrors them to
//! the global dispatcher itself. Events sent before the bag directory exists
//! are dropped.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::Dispatch;
use tracing_subscriber::fmt::writer::{MakeWriter, OptionalWriter};

/// Opens the log file in append mode for every event.
#[derive(Debug, Clone)]
struct LogFile {
    path: PathBuf,
}

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = OptionalWriter<File>;

    fn make_writer(&'a self) -> Self::Writer {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .ok()
            .into()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PreservationLog {
    path: PathBuf,
    dispatch: Dispatch,
}

impl PreservationLog {
    pub(crate) fn new(path: PathBuf) -> Self {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(LogFile { path: path.clone() })
            .with_ansi(false)
            .with_target(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        Self {
            path,
            dispatch: Dispatch::new(subscriber),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn info(&self, bag: &str, message: &str) {
        tracing::dispatcher::with_default(&self.dispatch, || {
            tracing::info!(bag, "{}", message);
        });
    }

    pub(crate) fn warn(&self, bag: &str, message: &str) {
        tracing::dispatcher::with_default(&self.dispatch, || {
            tracing::warn!(bag, "{}", message);
        });
    }
}
