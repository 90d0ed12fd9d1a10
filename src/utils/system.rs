// src/utils/system.rs: System functions

use sysinfo::System;


/// Determines number of cores that external tools may be told to use.
///
/// # Arguments
///
/// * `requested_threads` - Thread count from the run configuration.
///
/// # Returns
///
/// usize: requested threads, capped at the physical core count when it can be detected.
pub fn detect_cores(requested_threads: usize) -> usize {
    let physical_cores = System::physical_core_count().unwrap_or(requested_threads);
    requested_threads.min(physical_cores).max(1)
}
