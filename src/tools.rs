//! Discovery of the external tools pipelines are built from.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::ToolsConfig;

/// Information about an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Role the tool plays in a pipeline.
    pub role: &'static str,
    /// Configured program name or path.
    pub program: PathBuf,
    pub available: bool,
    /// First line of the version output, if available.
    pub version: Option<String>,
    /// Resolved executable path.
    pub path: Option<PathBuf>,
}

/// Check a tool by running it with a version argument.
pub fn check_tool_with_arg(role: &'static str, program: &Path, version_arg: &str) -> ToolInfo {
    let result = Command::new(program).arg(version_arg).output();

    match result {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());

            ToolInfo {
                role,
                program: program.to_path_buf(),
                available: true,
                version,
                path: which::which(program).ok(),
            }
        }
        _ => ToolInfo {
            role,
            program: program.to_path_buf(),
            available: false,
            version: None,
            path: None,
        },
    }
}

/// Check the fetcher, multicast relay and segmenter.
pub fn check_tools(tools: &ToolsConfig) -> Vec<ToolInfo> {
    vec![
        check_tool_with_arg("fetcher", &tools.fetcher, "--version"),
        // multicat has no version flag
        check_multicat(&tools.multicat),
        check_tool_with_arg("segmenter", &tools.ffmpeg, "-version"),
    ]
}

fn check_multicat(program: &Path) -> ToolInfo {
    match which::which(program) {
        Ok(path) => ToolInfo {
            role: "multicast",
            program: program.to_path_buf(),
            available: true,
            version: None,
            path: Some(path),
        },
        Err(_) => ToolInfo {
            role: "multicast",
            program: program.to_path_buf(),
            available: false,
            version: None,
            path: None,
        },
    }
}
