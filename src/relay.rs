//! Headless relay: one pipeline re-emitted to multicast, no HTTP listener.

use std::future::Future;
use std::time::Duration;

use streamgate_common::{Result, StreamAddress};

use crate::lifecycle::{self, ShutdownReport};
use crate::pipeline::{OutputMode, PipelineFactory};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Relay `address` to the multicast `destination` until the sender exits or
/// `stop` resolves, then tear the pipeline down.
pub async fn run_relay<F>(
    factory: &dyn PipelineFactory,
    address: &StreamAddress,
    destination: &str,
    grace: Duration,
    stop: F,
) -> Result<ShutdownReport>
where
    F: Future<Output = ()>,
{
    let mode = OutputMode::Multicast {
        destination: destination.to_string(),
    };
    let mut pipeline = factory.build(address, &mode)?;

    tracing::info!(address = %address, destination, "Relaying to multicast");

    tokio::pin!(stop);
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = &mut stop => {
                tracing::info!("Stopping relay");
                break;
            }
            _ = ticker.tick() => {
                if !pipeline.output.is_running() {
                    tracing::info!(address = %address, "Multicast sender has exited");
                    break;
                }
            }
        }
    }

    Ok(lifecycle::terminate_pipelines(vec![pipeline], grace).await)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::pipeline::{ChildProcess, Pipeline};
    use std::process::Command;

    struct ScriptFactory {
        input: &'static str,
        output: &'static str,
    }

    impl PipelineFactory for ScriptFactory {
        fn build(&self, _: &StreamAddress, mode: &OutputMode) -> Result<Pipeline> {
            assert!(matches!(mode, OutputMode::Multicast { destination } if destination == "239.1.1.1:5000"));
            Ok(Pipeline {
                input: ChildProcess::spawn("input", Command::new("sh").args(["-c", self.input]))?,
                output: ChildProcess::spawn("output", Command::new("sh").args(["-c", self.output]))?,
            })
        }
    }

    #[tokio::test]
    async fn test_relay_ends_when_sender_exits() {
        let factory = ScriptFactory {
            input: "exec sleep 30",
            output: "sleep 0.2",
        };
        let report = run_relay(
            &factory,
            &StreamAddress::new("https://example.com/live"),
            "239.1.1.1:5000",
            Duration::from_secs(5),
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(report.pipelines, 1);
        assert_eq!(report.terminated, 1);
        assert_eq!(report.killed, 0);
    }

    #[tokio::test]
    async fn test_relay_stops_on_signal() {
        let factory = ScriptFactory {
            input: "exec sleep 30",
            output: "exec sleep 30",
        };
        let report = run_relay(
            &factory,
            &StreamAddress::new("https://example.com/live"),
            "239.1.1.1:5000",
            Duration::from_secs(5),
            tokio::time::sleep(Duration::from_millis(300)),
        )
        .await
        .unwrap();

        assert_eq!(report.terminated, 2);
        assert_eq!(report.killed, 0);
    }

    #[tokio::test]
    async fn test_relay_spawn_failure() {
        let factory = crate::pipeline::CommandFactory::new(
            crate::config::ToolsConfig::default(),
            crate::config::HlsConfig::default(),
            crate::config::MulticastConfig::default(),
        );
        let err = run_relay(
            &factory,
            &StreamAddress::new("gopher://example.com/"),
            "239.1.1.1:5000",
            Duration::from_secs(1),
            std::future::pending(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, streamgate_common::Error::UnsupportedScheme(_)));
    }
}
