//! Advisory file-range locking, used to coordinate writers to a class file
//! across processes (§4.6, §5). POSIX record locks via `fcntl`, matching
//! the reference implementation's default locking method.

use std::os::unix::io::{AsRawFd, OwnedFd};
use std::thread::sleep;
use std::time::Duration;

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg};
use nix::unistd::dup;

use crate::error::{OsbfError, Result};

const MAX_RETRIES: u32 = 20;
const RETRY_INTERVAL: Duration = Duration::from_secs(1);

fn flock(l_type: libc::c_short, len: i64) -> libc::flock {
    // SAFETY: `libc::flock` is a plain-old-data struct; zeroing it and then
    // filling in the fields libc promises are read by `fcntl` is sound.
    let mut fl: libc::flock = unsafe { std::mem::zeroed() };
    fl.l_type = l_type;
    fl.l_whence = libc::SEEK_SET as libc::c_short;
    fl.l_start = 0;
    fl.l_len = len;
    fl
}

/// RAII guard for an exclusive lock on a file's header bytes. Holds its
/// own duplicated file descriptor so it never borrows from the `Class`
/// that requested it; unlocks on drop, so a class that errors out mid-open
/// never leaks a held lock.
pub struct FileLock {
    fd: OwnedFd,
    held: bool,
}

impl FileLock {
    /// Acquires an exclusive lock covering `[0, len)` of `file`, retrying
    /// up to 20 times at one-second intervals on `EAGAIN`/`EACCES` (§4.6,
    /// §5). Any other error aborts immediately.
    pub fn acquire(file: &impl AsRawFd, len: i64) -> Result<Self> {
        let fd: OwnedFd = dup(file.as_raw_fd())
            .map_err(|e| OsbfError::Io(std::io::Error::from(e)))?
            .into();
        let mut attempts = 0;
        loop {
            let lock = flock(libc::F_WRLCK as libc::c_short, len);
            match fcntl(fd.as_raw_fd(), FcntlArg::F_SETLK(&lock)) {
                Ok(_) => return Ok(FileLock { fd, held: true }),
                Err(Errno::EAGAIN) | Err(Errno::EACCES) => {
                    attempts += 1;
                    if attempts >= MAX_RETRIES {
                        return Err(OsbfError::Io(std::io::Error::from(Errno::EAGAIN)));
                    }
                    sleep(RETRY_INTERVAL);
                }
                Err(e) => return Err(OsbfError::Io(std::io::Error::from(e))),
            }
        }
    }

    pub fn release(mut self) -> Result<()> {
        self.unlock()
    }

    fn unlock(&mut self) -> Result<()> {
        if !self.held {
            return Ok(());
        }
        self.held = false;
        let lock = flock(libc::F_UNLCK as libc::c_short, 0);
        fcntl(self.fd.as_raw_fd(), FcntlArg::F_SETLK(&lock))
            .map_err(|e| OsbfError::Io(std::io::Error::from(e)))?;
        Ok(())
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.unlock();
    }
}

/// Reads then rewrites the first byte of `file` unchanged, to force an
/// mtime update on NFS servers that otherwise cache a stale mtime across
/// the unlock that follows a write-back close (§4.6).
pub fn touch(file: &std::fs::File) -> Result<()> {
    use std::io::{Read, Seek, SeekFrom, Write};
    let mut f = file.try_clone()?;
    let mut byte = [0u8; 1];
    f.seek(SeekFrom::Start(0))?;
    if f.read(&mut byte)? == 0 {
        return Ok(());
    }
    f.seek(SeekFrom::Start(0))?;
    f.write_all(&byte)?;
    Ok(())
}
