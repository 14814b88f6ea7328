use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

const LOCK_FILE: &str = "proxydesk-ui.lock";

pub struct SingleInstanceGuard {
    path: Option<PathBuf>,
}

impl Drop for SingleInstanceGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take()
            && let Err(error) = std::fs::remove_file(&path)
        {
            log::warn!("[single_instance] failed to remove {}: {error}", path.display());
        }
    }
}

pub fn acquire(directory: &Path) -> Option<SingleInstanceGuard> {
    let path = directory.join(LOCK_FILE);

    match try_create(&path) {
        Ok(guard) => Some(guard),
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
            if lock_is_stale(&path) {
                log::info!("[single_instance] removing stale lock {}", path.display());
                let _ = std::fs::remove_file(&path);
                try_create(&path).ok()
            } else {
                None
            }
        }
        Err(error) => {
            // Proceed unguarded rather than refusing to start.
            log::warn!("[single_instance] failed to create {}: {error}", path.display());
            Some(SingleInstanceGuard { path: None })
        }
    }
}

fn try_create(path: &Path) -> io::Result<SingleInstanceGuard> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    let _ = write!(file, "{}", std::process::id());
    Ok(SingleInstanceGuard {
        path: Some(path.to_path_buf()),
    })
}

/// A lock left behind by a crashed instance points at a dead process.
#[cfg(unix)]
fn lock_is_stale(path: &Path) -> bool {
    let Some(pid) = locked_pid(path) else {
        return true;
    };
    !crate::system::run_silent("kill", &["-0", &pid.to_string()])
}

#[cfg(windows)]
fn lock_is_stale(path: &Path) -> bool {
    let Some(pid) = locked_pid(path) else {
        return true;
    };
    let filter = format!("PID eq {pid}");
    let (success, output) =
        crate::system::run_silent_with_output("tasklist", &["/NH", "/FI", &filter]);
    if !success {
        // Cannot tell; leave the lock alone rather than stealing it.
        return false;
    }
    !tasklist_shows(&output, pid)
}

#[cfg(not(any(unix, windows)))]
fn lock_is_stale(_path: &Path) -> bool {
    false
}

fn locked_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path)
        .ok()?
        .trim()
        .parse::<u32>()
        .ok()
}

/// The pid sits in the second column of `tasklist /NH` output; a filter
/// with no match prints an INFO line instead.
#[cfg(any(windows, test))]
fn tasklist_shows(output: &str, pid: u32) -> bool {
    let needle = pid.to_string();
    output
        .lines()
        .any(|line| line.split_whitespace().nth(1) == Some(needle.as_str()))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn second_acquire_is_refused_while_the_first_lives() {
        let directory = tempdir().unwrap();

        let first = acquire(directory.path());
        assert!(first.is_some());
        assert!(acquire(directory.path()).is_none());
    }

    #[test]
    fn dropping_the_guard_releases_the_lock() {
        let directory = tempdir().unwrap();

        drop(acquire(directory.path()));
        assert!(acquire(directory.path()).is_some());
    }

    #[cfg(any(unix, windows))]
    #[test]
    fn stale_lock_from_a_dead_process_is_reclaimed() {
        let directory = tempdir().unwrap();
        // No live process has this pid on any realistic system.
        std::fs::write(directory.path().join(LOCK_FILE), "999999999").unwrap();

        assert!(acquire(directory.path()).is_some());
    }

    #[test]
    fn unreadable_lock_content_counts_as_stale() {
        let directory = tempdir().unwrap();
        std::fs::write(directory.path().join(LOCK_FILE), "not a pid").unwrap();

        assert_eq!(locked_pid(&directory.path().join(LOCK_FILE)), None);
        assert!(acquire(directory.path()).is_some());
    }

    #[test]
    fn tasklist_output_locates_the_pid_column() {
        let listing = "proxydesk-ui.exe              4321 Console                    1     12,345 K\n";
        assert!(tasklist_shows(listing, 4321));
        assert!(!tasklist_shows(listing, 1234));
        assert!(!tasklist_shows(
            "INFO: No tasks are running which match the specified criteria.\n",
            4321
        ));
    }
}
