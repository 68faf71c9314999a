//! Process-wide monitor for debugging consoles.

use std::sync::OnceLock;

use crate::monitor::PerfMonitor;

static GLOBAL_MONITOR: OnceLock<PerfMonitor> = OnceLock::new();

/// Install `monitor` as the process-wide instance.
///
/// Only the first call wins; returns `false` if one was already installed.
pub fn install_global(monitor: PerfMonitor) -> bool {
    let installed = GLOBAL_MONITOR.set(monitor).is_ok();
    if !installed {
        tracing::warn!(target: "perf", "global monitor already installed");
    }
    installed
}

/// The process-wide monitor, if one was installed.
pub fn global() -> Option<&'static PerfMonitor> {
    GLOBAL_MONITOR.get()
}
