//! OpenSCAD rendering collaborator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// How OpenSCAD produces image output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Fast OpenCSG preview
    Preview,
    /// Full CGAL render
    Render,
}

/// Image size and mode for one render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    pub mode: RenderMode,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            mode: RenderMode::Preview,
        }
    }
}

/// Rendering failures
#[derive(Debug, Error)]
pub enum RenderError {
    /// The renderer ran and rejected the source
    #[error("OpenSCAD exited with status {status:?}: {stderr}")]
    Failed { status: Option<i32>, stderr: String },

    /// The renderer could not be started
    #[error("Failed to launch {binary}: {source}")]
    Launch {
        binary: String,
        #[source]
        source: std::io::Error,
    },
}

/// Turns a `.scad` file into a preview image or mesh
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        scad: &Path,
        output: &Path,
        options: &RenderOptions,
    ) -> Result<(), RenderError>;
}

/// Runs the `openscad` command line tool
#[derive(Debug, Clone)]
pub struct OpenScadRenderer {
    binary: PathBuf,
}

impl OpenScadRenderer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Command line for one render. Size and mode only apply to image output.
    pub fn command_args(scad: &Path, output: &Path, options: &RenderOptions) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-o".into(), output.as_os_str().to_owned()];

        if is_image(output) {
            args.push(format!("--imgsize={},{}", options.width, options.height).into());
            args.push(
                match options.mode {
                    RenderMode::Preview => "--preview",
                    RenderMode::Render => "--render",
                }
                .into(),
            );
        }

        args.push(scad.as_os_str().to_owned());
        args
    }
}

impl Default for OpenScadRenderer {
    fn default() -> Self {
        Self::new("openscad")
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}

#[async_trait]
impl Renderer for OpenScadRenderer {
    async fn render(
        &self,
        scad: &Path,
        output: &Path,
        options: &RenderOptions,
    ) -> Result<(), RenderError> {
        let args = Self::command_args(scad, output, options);
        debug!(binary = %self.binary.display(), ?args, "Running OpenSCAD");

        let result = Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .map_err(|source| RenderError::Launch {
                binary: self.binary.display().to_string(),
                source,
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            warn!(status = ?result.status.code(), "OpenSCAD failed: {}", stderr);
            return Err(RenderError::Failed {
                status: result.status.code(),
                stderr,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_args() {
        let args = OpenScadRenderer::command_args(
            Path::new("scad/a.scad"),
            Path::new("img/a.png"),
            &RenderOptions::default(),
        );
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec!["-o", "img/a.png", "--imgsize=800,600", "--preview", "scad/a.scad"]
        );
    }

    #[test]
    fn test_stl_args_skip_image_flags() {
        let options = RenderOptions {
            mode: RenderMode::Render,
            ..RenderOptions::default()
        };
        let args = OpenScadRenderer::command_args(Path::new("a.scad"), Path::new("a.stl"), &options);
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["-o", "a.stl", "a.scad"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_launch_error() {
        let renderer = OpenScadRenderer::new("/nonexistent/openscad-binary");
        let err = renderer
            .render(Path::new("a.scad"), Path::new("a.png"), &RenderOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Launch { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_failure() {
        let renderer = OpenScadRenderer::new("false");
        let err = renderer
            .render(Path::new("a.scad"), Path::new("a.png"), &RenderOptions::default())
            .await
            .unwrap_err();
        match err {
            RenderError::Failed { status, .. } => assert_eq!(status, Some(1)),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
