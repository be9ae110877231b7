//! Blocking wait on the kernel mount table.
//!
//! `/proc/self/mounts` is pollable: after it has been read, a mount or unmount
//! marks the descriptor with a priority event (`POLLPRI`, reported together
//! with `POLLERR`). Ordinary readability is always set for this file and is
//! not a change signal. The file has to be re-read from offset zero after
//! each wake, otherwise the next `poll` returns immediately.

use fs_err::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use crate::error::{LivecheckError, Result};

/// Source of mount-table change notifications.
pub trait MountEvents: Send {
    /// Re-reads the mount table from the start and returns its contents.
    /// Non-UTF-8 bytes in mount points are replaced, never rejected.
    fn refresh(&mut self) -> Result<String>;

    /// Blocks until the mount table changes.
    fn wait_for_change(&mut self) -> Result<()>;
}

#[derive(Debug)]
pub struct MountTableWatcher {
    path: PathBuf,
    file: File,
}

impl MountTableWatcher {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path).map_err(|source| LivecheckError::MountTableUnavailable {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn poll_error(&self, source: io::Error) -> LivecheckError {
        LivecheckError::MountTablePoll {
            path: self.path.clone(),
            source,
        }
    }
}

impl MountEvents for MountTableWatcher {
    fn refresh(&mut self) -> Result<String> {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|err| self.poll_error(err))?;
        let mut contents = Vec::new();
        self.file
            .read_to_end(&mut contents)
            .map_err(|err| self.poll_error(err))?;
        Ok(String::from_utf8_lossy(&contents).into_owned())
    }

    fn wait_for_change(&mut self) -> Result<()> {
        let fd = self.file.file().as_raw_fd();
        loop {
            let mut pollfd = libc::pollfd {
                fd,
                events: libc::POLLPRI,
                revents: 0,
            };
            // `fd` stays open for as long as `self.file` lives.
            let rc = unsafe { libc::poll(&mut pollfd, 1, -1) };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(self.poll_error(err));
            }
            if pollfd.revents & libc::POLLNVAL != 0 {
                return Err(self.poll_error(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "mount table descriptor is not valid for poll",
                )));
            }
            if pollfd.revents & (libc::POLLPRI | libc::POLLERR) != 0 {
                tracing::debug!(path = %self.path.display(), "Mount table changed");
                return Ok(());
            }
        }
    }
}
