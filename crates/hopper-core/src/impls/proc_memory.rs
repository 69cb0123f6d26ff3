//! ProcessMemoryProbe - resident set size of the running process.
//!
//! - Linux: `/proc/self/statm` (resident pages) times `sysconf(_SC_PAGESIZE)`
//! - other unix: `getrusage(RUSAGE_SELF)`, which only knows the peak RSS
//! - elsewhere: unsupported

use std::io;

use crate::ports::MemoryProbe;

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemoryProbe;

impl MemoryProbe for ProcessMemoryProbe {
    fn resident_bytes(&self) -> io::Result<u64> {
        resident_set_size()
    }
}

#[cfg(target_os = "linux")]
fn resident_set_size() -> io::Result<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm")?;
    let resident_pages: u64 = statm
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "short /proc/self/statm"))?
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(resident_pages.saturating_mul(page_size()?))
}

#[cfg(target_os = "linux")]
fn page_size() -> io::Result<u64> {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(size as u64)
}

#[cfg(all(unix, not(target_os = "linux")))]
fn resident_set_size() -> io::Result<u64> {
    let mut usage = std::mem::MaybeUninit::<libc::rusage>::zeroed();
    // SAFETY: usage points to writable memory of the right size.
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: getrusage succeeded and filled the struct.
    let usage = unsafe { usage.assume_init() };
    let max_rss = usage.ru_maxrss.max(0) as u64;
    // bytes on macOS, kilobytes on the BSDs
    if cfg!(target_os = "macos") {
        Ok(max_rss)
    } else {
        Ok(max_rss.saturating_mul(1024))
    }
}

#[cfg(not(unix))]
fn resident_set_size() -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "resident memory probe is not available on this platform",
    ))
}
