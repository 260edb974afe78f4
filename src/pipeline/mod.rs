//! Media relay pipelines.
//!
//! A pipeline is an input process acquiring the stream (fetcher or multicast
//! receiver) whose stdout is wired straight into an output process (HLS
//! segmenter or multicast sender). Neither process is inspected beyond
//! liveness polling.

mod factory;
mod process;

pub use factory::{CommandFactory, Scheme};
pub use process::ChildProcess;

use std::path::PathBuf;

use streamgate_common::{Result, StreamAddress};

/// Where a pipeline's output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Rolling HLS playlist and segments written into `dir`.
    Hls { dir: PathBuf },
    /// Re-emitted to a multicast `ip:port`.
    Multicast { destination: String },
}

/// The paired processes relaying one stream.
#[derive(Debug)]
pub struct Pipeline {
    pub input: ChildProcess,
    pub output: ChildProcess,
}

impl Pipeline {
    /// A pipeline is live while its input process is.
    pub fn is_running(&mut self) -> bool {
        self.input.is_running()
    }

    /// Kill and reap whatever is left of both processes.
    pub fn kill_and_reap(&mut self) {
        self.input.kill_and_reap();
        self.output.kill_and_reap();
    }
}

/// Starts pipelines for addresses.
///
/// Spawn failures surface synchronously; a process that dies right after
/// spawning is only noticed by later liveness polls.
pub trait PipelineFactory: Send + Sync {
    fn build(&self, address: &StreamAddress, mode: &OutputMode) -> Result<Pipeline>;
}
