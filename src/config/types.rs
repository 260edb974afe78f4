use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub hls: HlsConfig,

    #[serde(default)]
    pub multicast: MulticastConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub passthrough: PassthroughConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Served root; computed by provisioning when unset.
    #[serde(default)]
    pub working_directory: Option<PathBuf>,

    /// Only these addresses may be tuned (empty = allow all)
    #[serde(default)]
    pub allow_list: Vec<String>,

    /// How long a tune request waits once for the first output file
    #[serde(default = "default_first_output_wait")]
    pub first_output_wait_secs: u64,

    /// Grace window between SIGTERM and SIGKILL at shutdown
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    80
}
fn default_first_output_wait() -> u64 {
    3
}
fn default_shutdown_grace() -> u64 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            working_directory: None,
            allow_list: Vec::new(),
            first_output_wait_secs: default_first_output_wait(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HlsConfig {
    /// Segments kept in the rolling playlist window (default: 6)
    #[serde(default = "default_list_size")]
    pub list_size: u32,

    #[serde(default = "default_playlist_name")]
    pub playlist_name: String,

    /// printf-style segment file name handed to the segmenter
    #[serde(default = "default_segment_template")]
    pub segment_template: String,

    /// Appended to directory requests; requesting it tunes the directory
    #[serde(default = "default_document")]
    pub default_document: String,

    /// File names served from the root for every stream directory
    #[serde(default = "default_shared_resources")]
    pub shared_resources: Vec<String>,
}

fn default_list_size() -> u32 {
    6
}

fn default_playlist_name() -> String {
    "master.m3u8".to_string()
}

fn default_segment_template() -> String {
    "data%05d.ts".to_string()
}

fn default_document() -> String {
    "index.html".to_string()
}

fn default_shared_resources() -> Vec<String> {
    ["index.html", "player.js", "player.css", "favicon.svg"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for HlsConfig {
    fn default() -> Self {
        Self {
            list_size: default_list_size(),
            playlist_name: default_playlist_name(),
            segment_template: default_segment_template(),
            default_document: default_document(),
            shared_resources: default_shared_resources(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MulticastConfig {
    /// TTL of re-emitted multicast packets (default: 2)
    #[serde(default = "default_ttl")]
    pub ttl: u8,
}

fn default_ttl() -> u8 {
    2
}

impl Default for MulticastConfig {
    fn default() -> Self {
        Self { ttl: default_ttl() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Stream fetcher and metadata extractor (youtube-dl compatible)
    #[serde(default = "default_fetcher")]
    pub fetcher: PathBuf,

    #[serde(default = "default_multicat")]
    pub multicat: PathBuf,

    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,

    #[serde(default)]
    pub fetcher_extra_args: Vec<String>,

    #[serde(default)]
    pub multicat_extra_args: Vec<String>,

    #[serde(default)]
    pub ffmpeg_extra_args: Vec<String>,
}

fn default_fetcher() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_multicat() -> PathBuf {
    PathBuf::from("multicat")
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            fetcher: default_fetcher(),
            multicat: default_multicat(),
            ffmpeg: default_ffmpeg(),
            fetcher_extra_args: Vec::new(),
            multicat_extra_args: Vec::new(),
            ffmpeg_extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PassthroughConfig {
    /// Serve `/<id>/videoplayback` by proxying a resolved playback URL
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for PassthroughConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            request_timeout_secs: default_request_timeout(),
        }
    }
}
