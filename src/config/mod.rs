mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./streamgate.toml",
        "~/.config/streamgate/config.toml",
        "/etc/streamgate/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.hls.list_size == 0 {
        anyhow::bail!("HLS list size must keep at least one segment");
    }

    if config.multicast.ttl == 0 {
        anyhow::bail!("Multicast TTL cannot be 0");
    }

    let doc = &config.hls.default_document;
    if doc.is_empty() || doc.contains('/') {
        anyhow::bail!("Default document must be a bare file name, got {:?}", doc);
    }

    for name in &config.hls.shared_resources {
        if name.is_empty() || name.contains('/') {
            anyhow::bail!("Shared resource must be a bare file name, got {:?}", name);
        }
    }

    if let Some(dir) = &config.server.working_directory {
        if dir.exists() && !dir.is_dir() {
            anyhow::bail!("Working directory is not a directory: {:?}", dir);
        }
    }

    Ok(())
}
