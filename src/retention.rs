//! Time-based retention of uploads and artifacts.
//!
//! A single background thread wakes every [`SWEEP_INTERVAL_SECS`] and deletes
//! regular files older than [`MAX_AGE_SECS`] from the watched directories.
//! Nothing else tracks these files, so once swept an artifact simply no
//! longer exists for download.
//!
//! ## Failure policy
//!
//! The sweeper never stops on error:
//!
//! - A directory that can't be listed is logged and skipped for this pass.
//! - A file that vanished between listing and deletion (another sweep, a
//!   client cleanup) counts as already gone.
//! - A file that can't be removed (permission denied, locked by a reader on
//!   platforms that refuse to delete open files) is skipped and retried on the
//!   next pass.
//!
//! Files are deleted whether or not someone holds them open. On Unix an open
//! reader keeps its data until it closes the handle; elsewhere the removal
//! fails and the file is retried later.
//!
//! Artifacts are renamed into place only once fully written (see
//! [`save_image`](crate::imaging::save_image)), so a pass never removes a
//! half-written artifact under its final name. Stale `.partial` files left by
//! a crash age out like anything else.

use std::io;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

/// Files older than this many seconds are deleted.
pub const MAX_AGE_SECS: u64 = 600;

/// Seconds between sweeps.
pub const SWEEP_INTERVAL_SECS: u64 = 60;

/// Retention parameters. Production always uses [`RetentionPolicy::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_age: Duration,
    pub sweep_interval: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(MAX_AGE_SECS),
            sweep_interval: Duration::from_secs(SWEEP_INTERVAL_SECS),
        }
    }
}

impl RetentionPolicy {
    /// Whether a file last modified at `modified` has outlived the window at `now`.
    ///
    /// Strictly greater: a file exactly `max_age` old survives one more pass.
    /// Modification times in the future count as age zero.
    pub fn is_expired(&self, modified: SystemTime, now: SystemTime) -> bool {
        now.duration_since(modified)
            .map(|age| age > self.max_age)
            .unwrap_or(false)
    }
}

/// Counters for one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Regular files examined.
    pub scanned: usize,
    /// Files removed.
    pub deleted: usize,
    /// Expired files left in place because removal failed.
    pub skipped: usize,
    /// Directory or entry level failures.
    pub errors: usize,
}

impl SweepReport {
    fn record(&mut self, removal: Removal) {
        match removal {
            Removal::Deleted => self.deleted += 1,
            Removal::AlreadyGone => {}
            Removal::Skipped(_) => self.skipped += 1,
        }
    }

    fn merge(&mut self, other: SweepReport) {
        self.scanned += other.scanned;
        self.deleted += other.deleted;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }
}

/// Run one pass over every directory in `dirs`, judging age against `now`.
pub fn sweep_once(dirs: &[PathBuf], policy: &RetentionPolicy, now: SystemTime) -> SweepReport {
    let mut report = SweepReport::default();
    for dir in dirs {
        report.merge(sweep_dir(dir, policy, now));
    }
    report
}

fn sweep_dir(dir: &Path, policy: &RetentionPolicy, now: SystemTime) -> SweepReport {
    let mut report = SweepReport::default();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Retention sweep could not read {}: {e}", dir.display());
                report.errors += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        report.scanned += 1;

        let modified = match entry.metadata().map(|m| m.modified()) {
            Ok(Ok(modified)) => modified,
            Ok(Err(e)) => {
                log::warn!("No modification time for {}: {e}", entry.path().display());
                report.errors += 1;
                continue;
            }
            // Vanished after listing.
            Err(e) if is_not_found(e.io_error()) => continue,
            Err(e) => {
                log::warn!("Cannot stat {}: {e}", entry.path().display());
                report.errors += 1;
                continue;
            }
        };
        if !policy.is_expired(modified, now) {
            continue;
        }

        report.record(remove_expired(entry.path()));
    }

    report
}

/// What became of one expired file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Deleted,
    /// Removed by someone else between listing and deletion.
    AlreadyGone,
    /// Still there; retried on the next pass.
    Skipped(io::ErrorKind),
}

fn removal_outcome(result: io::Result<()>) -> Removal {
    match result {
        Ok(()) => Removal::Deleted,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Removal::AlreadyGone,
        Err(e) => Removal::Skipped(e.kind()),
    }
}

fn remove_expired(path: &Path) -> Removal {
    let removal = removal_outcome(std::fs::remove_file(path));
    match removal {
        Removal::Deleted => log::debug!("Expired {}", path.display()),
        Removal::AlreadyGone => log::debug!("{} already removed", path.display()),
        Removal::Skipped(kind) => log::debug!(
            "Could not remove {}, retrying next sweep: {kind}",
            path.display()
        ),
    }
    removal
}

fn is_not_found(err: Option<&io::Error>) -> bool {
    err.is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
}

/// Start the process-lifetime sweeper thread.
///
/// Sweeps immediately, then after every `policy.sweep_interval`. The handle
/// is returned for completeness; the thread is meant to be left running.
pub fn spawn_sweeper(dirs: Vec<PathBuf>, policy: RetentionPolicy) -> io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("retention-sweeper".into())
        .spawn(move || run_sweeper(&dirs, &policy))
}

/// Sweep forever on the current thread.
pub fn run_sweeper(dirs: &[PathBuf], policy: &RetentionPolicy) {
    log::info!(
        "Retention sweeper started: max age {}s, every {}s",
        policy.max_age.as_secs(),
        policy.sweep_interval.as_secs()
    );
    loop {
        let report = sweep_once(dirs, policy, SystemTime::now());
        if report.deleted > 0 || report.skipped > 0 {
            log::info!(
                "Retention sweep: {} deleted, {} skipped of {} files",
                report.deleted,
                report.skipped,
                report.scanned
            );
        }
        std::thread::sleep(policy.sweep_interval);
    }
}
