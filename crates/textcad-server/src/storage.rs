//! Timestamped artifact persistence
//!
//! Every accepted generation gets a stem of the form `%Y%m%d-%H%M%S` (local
//! time). Two generations in the same second share a stem and the later one
//! overwrites the earlier.

use chrono::Local;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// Files written for one generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub stem: String,
    pub scad_path: PathBuf,
    pub image_path: PathBuf,
}

impl Artifact {
    /// Preview image file name, relative to the image directory
    pub fn image_name(&self) -> String {
        format!("{}.png", self.stem)
    }
}

/// Writes sources and locates their derived files
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    scad_dir: PathBuf,
    image_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(scad_dir: impl Into<PathBuf>, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            scad_dir: scad_dir.into(),
            image_dir: image_dir.into(),
        }
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Stem for an artifact created now
    pub fn new_stem() -> String {
        Local::now().format("%Y%m%d-%H%M%S").to_string()
    }

    /// Whether `name` only uses the stem alphabet (digits and `-`)
    pub fn is_valid_stem(name: &str) -> bool {
        !name.is_empty() && name.chars().all(|c| c.is_ascii_digit() || c == '-')
    }

    pub fn scad_path(&self, stem: &str) -> PathBuf {
        self.scad_dir.join(format!("{}.scad", stem))
    }

    pub fn image_path(&self, stem: &str) -> PathBuf {
        self.image_dir.join(format!("{}.png", stem))
    }

    pub fn stl_path(&self, stem: &str) -> PathBuf {
        self.scad_dir.join(format!("{}.stl", stem))
    }

    /// Persist a source under a fresh stem
    pub async fn save_source(&self, source: &str) -> io::Result<Artifact> {
        self.save_source_as(&Self::new_stem(), source).await
    }

    /// Persist a source under a given stem, creating directories on demand
    pub async fn save_source_as(&self, stem: &str, source: &str) -> io::Result<Artifact> {
        tokio::fs::create_dir_all(&self.scad_dir).await?;
        tokio::fs::create_dir_all(&self.image_dir).await?;

        let scad_path = self.scad_path(stem);
        tokio::fs::write(&scad_path, source).await?;
        info!(path = %scad_path.display(), "Saved generated source");

        Ok(Artifact {
            stem: stem.to_string(),
            scad_path,
            image_path: self.image_path(stem),
        })
    }

    /// Read a persisted source
    pub async fn read_source(&self, stem: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.scad_path(stem)).await
    }
}
