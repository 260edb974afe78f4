//! Selection and spawning of the input and output processes for an address.

use std::path::Path;
use std::process::{Command, Stdio};

use streamgate_common::{Error, Result, StreamAddress};

use super::{ChildProcess, OutputMode, Pipeline, PipelineFactory};
use crate::config::{HlsConfig, MulticastConfig, ToolsConfig};

/// How an address's media is acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// `rtp://@group:port`: joined with a multicast receiver.
    MulticastGroup,
    /// `http(s)://...`: pulled by the stream fetcher.
    GenericFetch,
    Unsupported,
}

impl Scheme {
    pub fn classify(address: &StreamAddress) -> Self {
        match address.scheme().as_deref() {
            Some("rtp") if address.authority().is_some_and(|a| a.starts_with('@')) => {
                Self::MulticastGroup
            }
            Some("http") | Some("https") => Self::GenericFetch,
            _ => Self::Unsupported,
        }
    }
}

/// Builds pipelines out of the configured external tools.
#[derive(Debug, Clone)]
pub struct CommandFactory {
    tools: ToolsConfig,
    hls: HlsConfig,
    multicast: MulticastConfig,
}

impl CommandFactory {
    pub fn new(tools: ToolsConfig, hls: HlsConfig, multicast: MulticastConfig) -> Self {
        Self {
            tools,
            hls,
            multicast,
        }
    }

    /// Arguments for the stream fetcher writing the best MP4 variant to stdout.
    pub fn fetcher_args(&self, address: &StreamAddress) -> Vec<String> {
        let mut args: Vec<String> = [
            "--quiet",
            // Stop once the source goes away instead of retrying forever
            "--abort-on-unavailable-fragment",
            // Container that is playable while still being written
            "--hls-use-mpegts",
            "--format=best[ext=mp4]",
            "--output",
            "-",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.extend(self.tools.fetcher_extra_args.iter().cloned());
        args.push("--".to_string());
        args.push(address.to_string());
        args
    }

    /// Arguments for joining a multicast group and writing it to stdout.
    ///
    /// multicat only takes short options: `-a` appends to the destination,
    /// `-U` strips the RTP header.
    pub fn multicast_receive_args(&self, group: &str) -> Vec<String> {
        let mut args = vec![
            group.to_string(),
            "-a".to_string(),
            "-U".to_string(),
            "/dev/stdout".to_string(),
        ];
        args.extend(self.tools.multicat_extra_args.iter().cloned());
        args
    }

    /// Arguments for the HLS segmenter reading stdin and writing into `dir`.
    pub fn segmenter_args(&self, dir: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-loglevel".into(),
            "24".into(),
            "-i".into(),
            "-".into(),
            "-f".into(),
            "hls".into(),
            // No playlist type: an "event" playlist keeps every segment and
            // would defeat the rolling window below.
            "-hls_list_size".into(),
            self.hls.list_size.to_string(),
            "-hls_delete_threshold".into(),
            "1".into(),
            // omit_endlist keeps players polling the playlist as a live stream
            "-hls_flags".into(),
            "delete_segments+omit_endlist".into(),
            "-hls_segment_filename".into(),
            dir.join(&self.hls.segment_template)
                .to_string_lossy()
                .into_owned(),
        ];
        args.extend(self.tools.ffmpeg_extra_args.iter().cloned());
        args.push(dir.join(&self.hls.playlist_name).to_string_lossy().into_owned());
        args
    }

    /// Arguments for re-emitting stdin to a multicast destination.
    pub fn multicast_send_args(&self, destination: &str) -> Vec<String> {
        let mut args = vec![
            "-t".to_string(),
            self.multicast.ttl.to_string(),
            "/dev/stdin".to_string(),
            destination.to_string(),
        ];
        args.extend(self.tools.multicat_extra_args.iter().cloned());
        args
    }

    fn input_command(&self, address: &StreamAddress) -> Result<(&'static str, Command)> {
        let (name, program, args) = match Scheme::classify(address) {
            Scheme::MulticastGroup => {
                let group = address.authority().unwrap_or_default();
                ("multicat", &self.tools.multicat, self.multicast_receive_args(group))
            }
            Scheme::GenericFetch => ("fetcher", &self.tools.fetcher, self.fetcher_args(address)),
            Scheme::Unsupported => {
                return Err(Error::UnsupportedScheme(address.to_string()));
            }
        };

        let mut command = Command::new(program);
        command.args(args);
        Ok((name, command))
    }

    fn output_command(&self, mode: &OutputMode) -> Result<(&'static str, Command)> {
        let (name, program, args) = match mode {
            OutputMode::Hls { dir } => {
                std::fs::create_dir_all(dir)?;
                ("segmenter", &self.tools.ffmpeg, self.segmenter_args(dir))
            }
            OutputMode::Multicast { destination } => (
                "multicast-sender",
                &self.tools.multicat,
                self.multicast_send_args(destination),
            ),
        };

        let mut command = Command::new(program);
        command.args(args);
        Ok((name, command))
    }
}

impl PipelineFactory for CommandFactory {
    fn build(&self, address: &StreamAddress, mode: &OutputMode) -> Result<Pipeline> {
        let (input_name, mut input_cmd) = self.input_command(address)?;
        let (output_name, mut output_cmd) = self.output_command(mode)?;

        input_cmd.stdin(Stdio::null()).stdout(Stdio::piped());
        let mut input = ChildProcess::spawn(input_name, &mut input_cmd)?;

        let Some(stdout) = input.take_stdout() else {
            input.kill_and_reap();
            return Err(Error::spawn(
                input_name,
                std::io::Error::other("stdout was not captured"),
            ));
        };

        // The sender owns the only read end; nothing is retained here.
        output_cmd.stdin(Stdio::from(stdout));
        let output = match ChildProcess::spawn(output_name, &mut output_cmd) {
            Ok(output) => output,
            Err(e) => {
                input.kill_and_reap();
                return Err(e);
            }
        };

        tracing::info!(
            address = %address,
            input_pid = input.pid(),
            output_pid = output.pid(),
            "Started pipeline {} -> {}",
            input_name,
            output_name
        );

        Ok(Pipeline { input, output })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn factory() -> CommandFactory {
        CommandFactory::new(
            ToolsConfig::default(),
            HlsConfig::default(),
            MulticastConfig::default(),
        )
    }

    #[test]
    fn test_classify() {
        let cases = [
            ("rtp://@239.0.0.1:1234", Scheme::MulticastGroup),
            ("RTP://@239.0.0.1:1234", Scheme::MulticastGroup),
            ("rtp://239.0.0.1:1234", Scheme::Unsupported),
            ("http://example.com/live", Scheme::GenericFetch),
            ("https://example.com/live", Scheme::GenericFetch),
            ("ftp://example.com/file", Scheme::Unsupported),
            ("example.com/live", Scheme::Unsupported),
            ("", Scheme::Unsupported),
        ];
        for (raw, expected) in cases {
            assert_eq!(Scheme::classify(&StreamAddress::new(raw)), expected, "{raw}");
        }
    }

    #[test]
    fn test_fetcher_args_end_with_address() {
        let mut f = factory();
        f.tools.fetcher_extra_args = vec!["--proxy".into(), "http://squid:3128".into()];
        let args = f.fetcher_args(&StreamAddress::new("https://example.com/live"));

        assert!(args.contains(&"--abort-on-unavailable-fragment".to_string()));
        assert!(args.contains(&"--hls-use-mpegts".to_string()));
        assert!(args.contains(&"--format=best[ext=mp4]".to_string()));
        assert_eq!(
            &args[args.len() - 4..],
            &["--proxy", "http://squid:3128", "--", "https://example.com/live"]
        );
        let out = args.iter().position(|a| a == "--output").unwrap();
        assert_eq!(args[out + 1], "-");
    }

    #[test]
    fn test_multicast_receive_args() {
        let args = factory().multicast_receive_args("@239.0.0.1:1234");
        assert_eq!(args, vec!["@239.0.0.1:1234", "-a", "-U", "/dev/stdout"]);
    }

    #[test]
    fn test_segmenter_args_rolling_window() {
        let mut f = factory();
        f.hls.list_size = 4;
        f.tools.ffmpeg_extra_args = vec!["-c".into(), "copy".into()];
        let args = f.segmenter_args(&PathBuf::from("/srv/root/abcd"));

        let pos = args.iter().position(|a| a == "-hls_list_size").unwrap();
        assert_eq!(args[pos + 1], "4");
        let pos = args.iter().position(|a| a == "-hls_flags").unwrap();
        assert!(args[pos + 1].contains("delete_segments"));
        assert!(args[pos + 1].contains("omit_endlist"));
        assert!(!args.contains(&"-hls_playlist_type".to_string()));
        let pos = args.iter().position(|a| a == "-hls_segment_filename").unwrap();
        assert_eq!(args[pos + 1], "/srv/root/abcd/data%05d.ts");
        assert_eq!(
            &args[args.len() - 3..],
            &["-c", "copy", "/srv/root/abcd/master.m3u8"]
        );
    }

    #[test]
    fn test_multicast_send_args() {
        let mut f = factory();
        f.multicast.ttl = 5;
        let args = f.multicast_send_args("239.1.1.1:5000");
        assert_eq!(args, vec!["-t", "5", "/dev/stdin", "239.1.1.1:5000"]);
    }

    #[test]
    fn test_build_unsupported_scheme_spawns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let err = factory()
            .build(
                &StreamAddress::new("gopher://example.com/"),
                &OutputMode::Hls {
                    dir: dir.path().join("never"),
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme(_)));
        assert!(!dir.path().join("never").exists());
    }

    #[test]
    fn test_build_missing_tool_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = factory();
        f.tools.fetcher = PathBuf::from("nonexistent_fetcher_xyz_12345");
        let err = f
            .build(
                &StreamAddress::new("https://example.com/live"),
                &OutputMode::Hls {
                    dir: dir.path().join("out"),
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Spawn { ref process, .. } if process == "fetcher"));
    }

    #[cfg(unix)]
    #[test]
    fn test_build_wires_input_into_output() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let sink = dir.path().join("sink");
        let sender = dir.path().join("sender.sh");
        std::fs::write(&sender, format!("#!/bin/sh\ncat > '{}'\n", sink.display())).unwrap();
        std::fs::set_permissions(&sender, std::fs::Permissions::from_mode(0o755)).unwrap();

        // echo prints its argv, so the sender receives the fetcher invocation.
        let mut f = factory();
        f.tools.fetcher = PathBuf::from("echo");
        f.tools.multicat = sender;

        let mut pipeline = f
            .build(
                &StreamAddress::new("https://example.com/live"),
                &OutputMode::Multicast {
                    destination: "239.1.1.1:5000".to_string(),
                },
            )
            .unwrap();

        // The output process holds the only read end of the pipe.
        assert!(pipeline.input.take_stdout().is_none());

        pipeline.input.reap();
        pipeline.output.reap();

        let relayed = std::fs::read_to_string(&sink).unwrap();
        assert!(relayed.contains("--abort-on-unavailable-fragment"));
        assert!(relayed.trim_end().ends_with("-- https://example.com/live"));
    }
}
