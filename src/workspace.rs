//! Provisioning of the served root.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Shared assets compiled into the binary, installed at the served root.
pub const BUNDLED_ASSETS: &[(&str, &str)] = &[
    ("index.html", include_str!("../assets/index.html")),
    ("player.js", include_str!("../assets/player.js")),
    ("player.css", include_str!("../assets/player.css")),
    ("favicon.svg", include_str!("../assets/favicon.svg")),
];

const DIR_NAME: &str = "streamgate";

/// `$XDG_RUNTIME_DIR/streamgate`, else `$TMPDIR/streamgate`, else
/// `/tmp/streamgate`.
pub fn default_working_directory() -> PathBuf {
    default_working_directory_from(
        std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from),
        std::env::var_os("TMPDIR").map(PathBuf::from),
    )
}

fn default_working_directory_from(xdg_runtime: Option<PathBuf>, tmpdir: Option<PathBuf>) -> PathBuf {
    xdg_runtime
        .filter(|p| !p.as_os_str().is_empty())
        .or(tmpdir.filter(|p| !p.as_os_str().is_empty()))
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(DIR_NAME)
}

/// Create the served root and return its absolute path.
///
/// The default directory is owned entirely by this process and is emptied
/// first; a custom directory is created if missing but never cleared.
pub fn prepare_working_directory(custom: Option<&Path>) -> Result<PathBuf> {
    let dir = match custom {
        Some(dir) => dir.to_path_buf(),
        None => {
            let dir = default_working_directory();
            if dir.is_dir() {
                tracing::info!("Clearing old working directory {:?}", dir);
                std::fs::remove_dir_all(&dir)
                    .with_context(|| format!("Failed to clear working directory: {:?}", dir))?;
            }
            dir
        }
    };

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create working directory: {:?}", dir))?;

    let dir = dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve working directory: {:?}", dir))?;

    tracing::debug!("Working directory is {:?}", dir);
    Ok(dir)
}

/// Write the bundled shared assets into `dir`, replacing older copies.
pub fn install_assets(dir: &Path) -> Result<()> {
    for (name, contents) in BUNDLED_ASSETS {
        let path = dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to install {:?}", path))?;
    }
    tracing::debug!(count = BUNDLED_ASSETS.len(), "Installed shared assets into {:?}", dir);
    Ok(())
}
