//! Background zombie-process reaper.
//!
//! Grounded on `pylon/core/tools/signal.py::ZombieReaper`: a daemon thread
//! that wakes on an interval and drains exited child processes with
//! `waitid(P_ALL, WEXITED | WNOHANG | WNOWAIT)` so a plugin that spawns and
//! abandons a child doesn't leave a zombie behind, without ever blocking on
//! a child this process is still actively waiting on elsewhere. Only
//! meaningful on Unix; a no-op elsewhere.

use pylon_core::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Periodically reaps zombie child processes until `context` requests
/// shutdown.
pub async fn run(context: Arc<Context>, interval: Duration) {
    loop {
        tokio::select! {
            _ = context.stop_event.cancelled() => break,
            _ = tokio::time::sleep(interval) => {
                reap_once();
            }
        }
    }
}

/// Drains every already-exited child in a single pass.
///
/// The original reaper peeks with `WNOWAIT` first so it can skip PIDs it
/// tracks as deliberately-managed external processes, then reaps the rest
/// in a second pass. Pylon has no equivalent externally-managed process
/// registry, so this collapses to one `WNOHANG`-only pass that reaps
/// everything it finds.
#[cfg(unix)]
fn reap_once() {
    use nix::sys::wait::{Id, WaitPidFlag, WaitStatus, waitid};

    loop {
        match waitid(Id::All, WaitPidFlag::WEXITED | WaitPidFlag::WNOHANG) {
            Ok(WaitStatus::StillAlive) => break,
            Ok(status) => debug!(?status, "reaped child process"),
            Err(nix::errno::Errno::ECHILD) => break,
            Err(err) => {
                warn!(error = %err, "zombie reaper wait call failed, stopping this pass");
                break;
            }
        }
    }
}

#[cfg(not(unix))]
fn reap_once() {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reaper_stops_on_shutdown_request() {
        let context = Context::new("reaper-test");
        context.request_shutdown();
        run(context, Duration::from_millis(10)).await;
    }
}
