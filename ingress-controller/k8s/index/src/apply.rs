use crate::{metrics::ApplyMetrics, secrets::Certs};
use nix::{
    sys::signal::{kill, Signal},
    unistd::Pid,
};
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// The name of the generated configuration file within the conf.d directory.
pub const CONFIG_FILE_NAME: &str = "ngress.conf";

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("failed to read pid file {}: {source}", .path.display())]
    ReadPid { path: PathBuf, source: io::Error },

    #[error("invalid pid file {}: {contents:?}", .path.display())]
    ParsePid { path: PathBuf, contents: String },

    #[error("failed to signal pid {pid}: {source}")]
    Signal { pid: i32, source: nix::Error },

    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to clear {}: {source}", .path.display())]
    Wipe { path: PathBuf, source: io::Error },
}

/// Asks the proxy to reload its configuration.
pub trait Reload: fmt::Debug + Send + Sync {
    fn reload(&self) -> Result<(), ApplyError>;
}

/// Reloads the proxy by sending `SIGHUP` to the pid in its pid file.
#[derive(Clone, Debug)]
pub struct PidFileReload {
    pid_file: PathBuf,
}

/// Writes rendered configuration and certificates, reloading the proxy only
/// when either changed since the last application.
#[derive(Debug)]
pub struct ConfigApplier {
    config_path: PathBuf,
    certs_dir: PathBuf,
    reload: Box<dyn Reload>,
    metrics: ApplyMetrics,

    /// The last configuration written successfully.
    config: String,

    /// The last certificate set written successfully.
    certs: Certs,
}

/// Describes what an application changed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Applied {
    pub certs_changed: bool,
    pub config_changed: bool,
    pub reloaded: bool,
}

// === impl PidFileReload ===

impl PidFileReload {
    pub fn new(pid_file: impl Into<PathBuf>) -> Self {
        Self {
            pid_file: pid_file.into(),
        }
    }

    fn read_pid(&self) -> Result<i32, ApplyError> {
        let contents =
            fs::read_to_string(&self.pid_file).map_err(|source| ApplyError::ReadPid {
                path: self.pid_file.clone(),
                source,
            })?;
        parse_pid(&contents).ok_or_else(|| ApplyError::ParsePid {
            path: self.pid_file.clone(),
            contents,
        })
    }
}

impl Reload for PidFileReload {
    fn reload(&self) -> Result<(), ApplyError> {
        let pid = self.read_pid()?;
        tracing::info!(pid, "Reloading nginx");
        kill(Pid::from_raw(pid), Signal::SIGHUP).map_err(|source| ApplyError::Signal { pid, source })
    }
}

fn parse_pid(contents: &str) -> Option<i32> {
    contents.trim().parse().ok().filter(|pid| *pid > 0)
}

// === impl ConfigApplier ===

impl ConfigApplier {
    pub fn new(
        conf_dir: &Path,
        certs_dir: impl Into<PathBuf>,
        reload: Box<dyn Reload>,
        metrics: ApplyMetrics,
    ) -> Self {
        Self {
            config_path: conf_dir.join(CONFIG_FILE_NAME),
            certs_dir: certs_dir.into(),
            reload,
            metrics,
            config: String::new(),
            certs: Certs::new(),
        }
    }

    pub fn apply(&mut self, config: String, certs: Certs) -> Applied {
        let mut applied = Applied::default();
        let mut failed = false;

        if certs != self.certs {
            tracing::info!(files = certs.len(), "Certificates changed");
            applied.certs_changed = true;
            if self.write_certs(&certs) {
                self.certs = certs;
            } else {
                failed = true;
            }
        }

        if config != self.config {
            tracing::info!(path = %self.config_path.display(), "Configuration changed");
            tracing::debug!("\n{config}");
            applied.config_changed = true;
            match write_file(&self.config_path, config.as_bytes()) {
                Ok(()) => {
                    self.metrics.config_write();
                    self.config = config;
                }
                Err(error) => {
                    tracing::error!(%error, "Failed to write configuration");
                    failed = true;
                }
            }
        } else {
            tracing::debug!("Configuration not changed");
        }

        if failed {
            tracing::warn!("Skipping reload after failed writes");
            return applied;
        }

        if applied.certs_changed || applied.config_changed {
            match self.reload.reload() {
                Ok(()) => {
                    applied.reloaded = true;
                    self.metrics.reload();
                }
                Err(error) => {
                    tracing::error!(%error, "Failed to reload nginx");
                    self.metrics.reload_error();
                }
            }
        }

        applied
    }

    /// Replaces the contents of the certificate directory with `certs`.
    /// Failures are logged per file and don't stop the remaining writes.
    /// Returns true if every file was written.
    fn write_certs(&self, certs: &Certs) -> bool {
        let mut ok = true;
        if let Err(error) = clear_dir(&self.certs_dir) {
            tracing::error!(%error, "Failed to clear certificates directory");
            ok = false;
        }

        for (path, data) in certs {
            match write_file(path, data) {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "Wrote certificate");
                    self.metrics.cert_write();
                }
                Err(error) => {
                    tracing::error!(%error, "Failed to write certificate");
                    ok = false;
                }
            }
        }
        ok
    }
}

fn write_file(path: &Path, data: &[u8]) -> Result<(), ApplyError> {
    let write = || -> io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, data)
    };
    write().map_err(|source| ApplyError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Removes everything within `dir`, leaving the directory itself.
fn clear_dir(dir: &Path) -> Result<(), ApplyError> {
    let clear = || -> io::Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(error) => return Err(error),
        };
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    };
    clear().map_err(|source| ApplyError::Wipe {
        path: dir.to_path_buf(),
        source,
    })
}
