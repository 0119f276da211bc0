use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{BundleError, Result};

pub const LOCK_FILE: &str = ".mulmo_view.lock";

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    owner: Uuid,
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// Exclusive writer lock on a bundle directory, released on drop.
#[derive(Debug)]
pub struct BundleLock {
    path: PathBuf,
    owner: Uuid,
}

impl BundleLock {
    /// A lock whose holder process is gone is taken over with a warning.
    pub fn acquire<P: AsRef<Path>>(bundle_dir: P) -> Result<Self> {
        let bundle_dir = bundle_dir.as_ref();
        std::fs::create_dir_all(bundle_dir)?;
        let path = bundle_dir.join(LOCK_FILE);

        let info = LockInfo {
            owner: Uuid::new_v4(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };

        let mut reclaimed = false;
        let mut file = loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let holder = read_holder(&path);
                    match &holder {
                        Some(h) if !reclaimed && !process_alive(h.pid) => {
                            warn!(
                                "Taking over {}: pid {} locked it at {} and is no longer running",
                                path.display(), h.pid, h.acquired_at.to_rfc3339()
                            );
                            match std::fs::remove_file(&path) {
                                Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
                                _ => {}
                            }
                            reclaimed = true;
                        }
                        _ => {
                            let holder = holder
                                .as_ref()
                                .map(|h| format!("held by pid {} since {}", h.pid, h.acquired_at.to_rfc3339()))
                                .unwrap_or_else(|| "held by another process".to_string());
                            return Err(BundleError::Locked(format!(
                                "{} is {}",
                                bundle_dir.display(), holder
                            )));
                        }
                    }
                }
                Err(e) => return Err(e.into()),
            }
        };

        file.write_all(serde_json::to_string(&info)?.as_bytes())?;
        debug!("Acquired bundle lock {} ({})", path.display(), info.owner);

        Ok(Self { path, owner: info.owner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_holder(path: &Path) -> Option<LockInfo> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str::<LockInfo>(&s).ok())
}

/// Checked through `/proc/<pid>`; without procfs every holder counts as alive.
fn process_alive(pid: u32) -> bool {
    let proc_root = Path::new("/proc");
    if !proc_root.is_dir() {
        return true;
    }
    proc_root.join(pid.to_string()).exists()
}

impl Drop for BundleLock {
    fn drop(&mut self) {
        let held_by_us = read_holder(&self.path)
            .map(|info| info.owner == self.owner)
            .unwrap_or(false);

        if !held_by_us {
            warn!("Bundle lock {} no longer ours, leaving it", self.path.display());
            return;
        }

        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to release bundle lock {}: {}", self.path.display(), e);
        }
    }
}
