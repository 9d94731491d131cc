use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Context, Result};

/// Exclusive OS-level lock on `<store>.lock`, held for the duration of a run so
/// only one process writes the store.
///
/// The lock file itself stays on disk; the operating system drops the lock when
/// the handle closes, including when the process is killed.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    _file: File,
}

impl RunLock {
    pub fn acquire(store_path: &Path) -> Result<Self> {
        let path = lock_path(store_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create store directory {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("failed to open lock file {}", path.display()))?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => return Err(AppError::Locked(path)),
            Err(TryLockError::Error(err)) => {
                return Err(err)
                    .with_context(|| format!("failed to lock {}", path.display()))
                    .map_err(AppError::from);
            }
        }

        write_pid(&mut file)
            .with_context(|| format!("failed to write lock file {}", path.display()))?;

        log::debug!("Acquired store lock {}", path.display());
        Ok(RunLock { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_pid(file: &mut File) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())?;
    file.flush()
}

fn lock_path(store_path: &Path) -> PathBuf {
    let mut name = store_path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    store_path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("db.json");

        let first = RunLock::acquire(&store).expect("first lock");
        assert_eq!(first.path(), dir.path().join("db.json.lock"));

        let err = RunLock::acquire(&store).expect_err("second lock should fail");
        assert!(matches!(err, AppError::Locked(_)), "unexpected error: {err}");

        drop(first);
        RunLock::acquire(&store).expect("lock after release");
    }

    #[test]
    fn lock_file_left_by_a_dead_run_does_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("db.json");
        // What a killed run leaves behind: the file, but no live handle holding the lock.
        fs::write(dir.path().join("db.json.lock"), "4194303\n").unwrap();

        let lock = RunLock::acquire(&store).expect("stale lock file is reclaimed");

        let contents = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }
}
