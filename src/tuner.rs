//! Stream registry: at most one live pipeline per stream identifier.
//!
//! Every tune attempt takes the registry-wide lock for the whole
//! check-liveness / check-allow-list / spawn-and-store sequence. Spawning is
//! rare next to static file serving, so one lock is enough to guarantee a
//! single spawn under concurrent first-touch requests.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use streamgate_common::{Error, StreamAddress, StreamId};

use crate::lifecycle::{self, ShutdownReport};
use crate::pipeline::{OutputMode, Pipeline, PipelineFactory};

/// Addresses that may be tuned. Empty permits everything.
#[derive(Debug, Clone, Default)]
pub struct AllowList(HashSet<StreamAddress>);

impl AllowList {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            addresses
                .into_iter()
                .map(StreamAddress::new)
                .collect(),
        )
    }

    pub fn permits(&self, address: &StreamAddress) -> bool {
        self.0.is_empty() || self.0.contains(address)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of [`Tuner::ensure_tuned`].
#[derive(Debug)]
pub enum TuneOutcome {
    /// A pipeline for the stream is running (possibly just started).
    Tuned,
    /// The address is not on the allow list. Nothing was spawned or stored.
    Rejected(StreamAddress),
    /// The identifier did not decode or the pipeline could not be started.
    Failed(Error),
}

/// Lifecycle state of a registry entry.
///
/// Starting is not stored: it is the window in which the registry lock is
/// held while the factory spawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Running,
    Exited,
}

/// One active or past relay for one identifier.
#[derive(Debug)]
pub struct PipelineEntry {
    pub id: StreamId,
    pub address: StreamAddress,
    pub output_dir: PathBuf,
    pub pipeline: Pipeline,
    pub state: PipelineState,
    pub started_at: DateTime<Utc>,
}

impl PipelineEntry {
    /// Poll both processes, reaping whichever has exited.
    fn poll(&mut self) -> PipelineState {
        let output_running = self.pipeline.output.is_running();
        if self.state == PipelineState::Running && !self.pipeline.is_running() {
            tracing::info!(
                stream_id = %self.id,
                address = %self.address,
                output_running,
                uptime_secs = (Utc::now() - self.started_at).num_seconds(),
                "Pipeline input has exited"
            );
            self.state = PipelineState::Exited;
        }
        self.state
    }
}

/// Snapshot of an entry for logging and inspection.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub id: StreamId,
    pub address: StreamAddress,
    pub state: PipelineState,
    pub input_pid: u32,
    pub output_pid: u32,
    pub output_running: bool,
    pub started_at: DateTime<Utc>,
}

/// Concurrency-safe map from identifier to pipeline.
pub struct Tuner {
    root: PathBuf,
    allow_list: AllowList,
    factory: Arc<dyn PipelineFactory>,
    entries: Mutex<HashMap<StreamId, PipelineEntry>>,
}

impl Tuner {
    /// Create a tuner writing stream output under `root/<identifier>`.
    pub fn new(root: impl Into<PathBuf>, allow_list: AllowList, factory: Arc<dyn PipelineFactory>) -> Self {
        Self {
            root: root.into(),
            allow_list,
            factory,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Make sure a pipeline for `id` is running, starting one if needed.
    ///
    /// Blocks while spawning; call from a blocking context.
    pub fn ensure_tuned(&self, id: &StreamId) -> TuneOutcome {
        let address = match id.decode() {
            Ok(address) => address,
            Err(e) => {
                tracing::warn!(stream_id = %id, "Refusing to tune: {}", e);
                return TuneOutcome::Failed(e);
            }
        };

        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get_mut(id) {
            if entry.poll() == PipelineState::Running {
                return TuneOutcome::Tuned;
            }
        }

        if !self.allow_list.permits(&address) {
            tracing::warn!(stream_id = %id, address = %address, "Address is not on the allow list");
            return TuneOutcome::Rejected(address);
        }

        if let Some(mut stale) = entries.remove(id) {
            tracing::info!(stream_id = %id, address = %address, "Re-tuning exited pipeline");
            stale.pipeline.kill_and_reap();
        }

        let output_dir = self.root.join(id.as_str());
        tracing::info!(stream_id = %id, address = %address, "Tuning stream");

        let mode = OutputMode::Hls {
            dir: output_dir.clone(),
        };
        match self.factory.build(&address, &mode) {
            Ok(pipeline) => {
                entries.insert(
                    id.clone(),
                    PipelineEntry {
                        id: id.clone(),
                        address,
                        output_dir,
                        pipeline,
                        state: PipelineState::Running,
                        started_at: Utc::now(),
                    },
                );
                TuneOutcome::Tuned
            }
            Err(e) => {
                tracing::error!(stream_id = %id, address = %address, "Failed to start pipeline: {}", e);
                TuneOutcome::Failed(e)
            }
        }
    }

    /// Poll every entry and report its state.
    pub fn status(&self) -> Vec<PipelineStatus> {
        let mut entries = self.entries.lock();
        let mut statuses: Vec<PipelineStatus> = entries
            .values_mut()
            .map(|entry| PipelineStatus {
                id: entry.id.clone(),
                address: entry.address.clone(),
                state: entry.poll(),
                input_pid: entry.pipeline.input.pid(),
                output_pid: entry.pipeline.output.pid(),
                output_running: entry.pipeline.output.is_running(),
                started_at: entry.started_at,
            })
            .collect();
        statuses.sort_by(|a, b| a.id.cmp(&b.id));
        statuses
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drain the registry and tear down every pipeline in it.
    pub async fn shutdown_all(&self, grace: Duration) -> ShutdownReport {
        let drained: Vec<PipelineEntry> = {
            let mut entries = self.entries.lock();
            entries.drain().map(|(_, entry)| entry).collect()
        };

        tracing::info!(pipelines = drained.len(), "Stopping all pipelines");

        let pipelines = drained.into_iter().map(|entry| entry.pipeline).collect();
        let report = lifecycle::terminate_pipelines(pipelines, grace).await;

        tracing::info!(
            pipelines = report.pipelines,
            terminated = report.terminated,
            killed = report.killed,
            "All pipelines stopped"
        );
        report
    }
}
