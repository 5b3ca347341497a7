//! System resource monitoring module.
//!
//! This module provides:
//! - Process memory snapshots (resident set size)
//! - Memory gauge recording

use std::io;

/// Page size assumed when converting `/proc/self/statm` pages to bytes.
const PAGE_SIZE_BYTES: u64 = 4096;

/// Resident set size of the current process, in megabytes.
///
/// Reads the second field of `/proc/self/statm`. Only available on Linux; other
/// platforms get an `Unsupported` error.
pub fn read_process_memory_mb() -> io::Result<f64> {
    #[cfg(target_os = "linux")]
    {
        let statm = std::fs::read_to_string("/proc/self/statm")?;
        parse_statm_resident_mb(&statm)
    }

    #[cfg(not(target_os = "linux"))]
    {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "process memory snapshots require /proc",
        ))
    }
}

/// Parse the resident page count out of a `statm` line.
pub(crate) fn parse_statm_resident_mb(statm: &str) -> io::Result<f64> {
    let resident = statm
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "statm has no resident field"))?;
    let pages = resident
        .parse::<u64>()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok((pages * PAGE_SIZE_BYTES) as f64 / (1024.0 * 1024.0))
}

/// Record memory usage metrics
pub fn record_memory_usage() {
    if let Ok(memory_mb) = read_process_memory_mb() {
        ::metrics::gauge!("process_memory_mb").set(memory_mb);
    }
}
