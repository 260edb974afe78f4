//! Graceful-then-forced teardown of pipelines.

use std::time::Duration;

use tokio::time::Instant;

use crate::pipeline::Pipeline;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What teardown had to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Pipelines torn down.
    pub pipelines: usize,
    /// Processes that were alive and received SIGTERM.
    pub terminated: usize,
    /// Processes still alive after the grace window and killed.
    pub killed: usize,
}

/// Tear down every pipeline: SIGTERM every live process, wait out one grace
/// window shared by all of them, then SIGKILL whatever is still running.
/// Returns once every process has been reaped.
///
/// No pipe ends are held here. The output process owns the input's only
/// reader, so once it exits the input sees a closed pipe on its next write.
pub async fn terminate_pipelines(mut pipelines: Vec<Pipeline>, grace: Duration) -> ShutdownReport {
    let mut report = ShutdownReport {
        pipelines: pipelines.len(),
        ..Default::default()
    };

    for pipeline in &mut pipelines {
        for process in [&mut pipeline.input, &mut pipeline.output] {
            if !process.is_running() {
                continue;
            }
            match process.terminate() {
                Ok(()) => report.terminated += 1,
                Err(e) => tracing::warn!(
                    process = process.name(),
                    pid = process.pid(),
                    "Failed to send SIGTERM: {}",
                    e
                ),
            }
        }
    }

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline && any_running(&mut pipelines) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::sleep(POLL_INTERVAL.min(remaining)).await;
    }

    for pipeline in &mut pipelines {
        for process in [&mut pipeline.input, &mut pipeline.output] {
            if process.is_running() {
                tracing::warn!(
                    process = process.name(),
                    pid = process.pid(),
                    "Process did not exit within {:?}, killing",
                    grace
                );
                report.killed += 1;
            }
            process.kill_and_reap();
        }
    }

    report
}

fn any_running(pipelines: &mut [Pipeline]) -> bool {
    pipelines
        .iter_mut()
        .any(|p| p.input.is_running() || p.output.is_running())
}
