//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which provisions a temporary served root with
//! the bundled assets and builds a full [`AppContext`] around a
//! [`ScriptFactory`]. The factory spawns small shell scripts instead of the
//! real fetcher and segmenter and counts how often it was asked to.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::Router;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use streamgate::config::Config;
use streamgate::lifecycle::ShutdownReport;
use streamgate::notify::SupervisorNotifier;
use streamgate::pipeline::{ChildProcess, OutputMode, Pipeline, PipelineFactory};
use streamgate::server::{create_router, serve, AppContext};
use streamgate::workspace;
use streamgate_common::{Error, Result, StreamAddress, StreamId};
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Pipeline factory driven by shell snippets.
///
/// `{dir}` in the output script is replaced by the HLS output directory.
pub struct ScriptFactory {
    pub input: String,
    pub output: String,
    /// Held inside `build` to widen race windows.
    pub build_delay: Duration,
    pub fail: bool,
    builds: AtomicUsize,
    addresses: Mutex<Vec<StreamAddress>>,
}

impl ScriptFactory {
    /// Both processes stay alive; the segmenter stand-in writes a playlist.
    pub fn long_running() -> Self {
        Self::new(
            "exec sleep 30",
            "printf '#EXTM3U\\n' > '{dir}/master.m3u8'; exec sleep 30",
        )
    }

    pub fn new(input: &str, output: &str) -> Self {
        Self {
            input: input.to_string(),
            output: output.to_string(),
            build_delay: Duration::ZERO,
            fail: false,
            builds: AtomicUsize::new(0),
            addresses: Mutex::new(Vec::new()),
        }
    }

    /// Every build fails as if the fetcher were missing.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::long_running()
        }
    }

    pub fn with_build_delay(mut self, delay: Duration) -> Self {
        self.build_delay = delay;
        self
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn addresses(&self) -> Vec<StreamAddress> {
        self.addresses.lock().clone()
    }
}

impl PipelineFactory for ScriptFactory {
    fn build(&self, address: &StreamAddress, mode: &OutputMode) -> Result<Pipeline> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.addresses.lock().push(address.clone());
        std::thread::sleep(self.build_delay);

        if self.fail {
            return Err(Error::spawn(
                "fetcher",
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }

        let output = match mode {
            OutputMode::Hls { dir } => {
                std::fs::create_dir_all(dir)?;
                self.output.replace("{dir}", &dir.to_string_lossy())
            }
            OutputMode::Multicast { .. } => self.output.clone(),
        };

        let input = ChildProcess::spawn("input", Command::new("sh").args(["-c", self.input.as_str()]))?;
        let output = match ChildProcess::spawn("output", Command::new("sh").args(["-c", output.as_str()])) {
            Ok(output) => output,
            Err(e) => {
                let mut input = input;
                input.kill_and_reap();
                return Err(e);
            }
        };

        Ok(Pipeline { input, output })
    }
}

/// Records supervisor notifications in order.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<&'static str>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().clone()
    }
}

impl SupervisorNotifier for RecordingNotifier {
    fn ready(&self) {
        self.events.lock().push("ready");
    }

    fn stopping(&self) {
        self.events.lock().push("stopping");
    }
}

/// A running server started by [`TestHarness::spawn_server`].
pub struct RunningServer {
    pub addr: SocketAddr,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<anyhow::Result<ShutdownReport>>,
}

impl RunningServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the pipeline teardown report.
    pub async fn shutdown(self) -> ShutdownReport {
        let _ = self.stop.send(());
        self.handle
            .await
            .expect("server task panicked")
            .expect("server failed")
    }
}

/// Temporary served root plus a fully built [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub factory: Arc<ScriptFactory>,
    pub root: PathBuf,
    _dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with(test_config(), ScriptFactory::long_running())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with(config, ScriptFactory::long_running())
    }

    pub fn with_factory(factory: ScriptFactory) -> Self {
        Self::with(test_config(), factory)
    }

    pub fn with(config: Config, factory: ScriptFactory) -> Self {
        let dir = tempfile::tempdir().expect("failed to create served root");
        let root = dir.path().canonicalize().expect("failed to resolve served root");
        workspace::install_assets(&root).expect("failed to install assets");

        let factory = Arc::new(factory);
        let ctx = AppContext::new(config, root.clone(), factory.clone())
            .expect("failed to build context");

        Self {
            ctx,
            factory,
            root,
            _dir: dir,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.ctx.clone())
    }

    /// Serve on a random local port until [`RunningServer::shutdown`].
    pub async fn spawn_server(&self, notifier: Arc<dyn SupervisorNotifier>) -> RunningServer {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        let (stop, stopped) = oneshot::channel::<()>();
        let ctx = self.ctx.clone();
        let handle = tokio::spawn(async move {
            serve(listener, ctx, notifier, async move {
                let _ = stopped.await;
            })
            .await
        });

        RunningServer { addr, stop, handle }
    }

    /// Stop every pipeline the test started.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.ctx.tuner.shutdown_all(Duration::from_secs(2)).await
    }

    pub fn stream_dir(&self, id: &StreamId) -> PathBuf {
        self.root.join(id.as_str())
    }
}

/// Defaults with a short first-output wait so tests stay fast.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.first_output_wait_secs = 1;
    config.server.shutdown_grace_secs = 2;
    config
}

pub fn id_for(address: &str) -> StreamId {
    StreamId::encode(&StreamAddress::new(address))
}

/// Helper to get response body as string
pub async fn body_to_string(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Poll `cond` for up to five seconds.
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    cond()
}

pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}
