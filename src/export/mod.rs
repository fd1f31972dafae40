//! Writers for the gold dataset and the analytical extract.
//!
//! Output is rendered fully in memory, then every file of a batch is committed
//! together through [`commit`], so a failed batch leaves nothing behind.

mod analytical;
mod gold;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

pub use analytical::{ANALYTICAL_COLUMNS, render_analytical, write_analytical, write_analytical_csv};
pub use gold::{gold_header, render_gold, write_gold, write_gold_csv, write_gold_jsonl};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Output encoding, chosen from the destination extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    JsonLines,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("jsonl") | Some("ndjson") => ExportFormat::JsonLines,
            _ => ExportFormat::Csv,
        }
    }
}

/// One rendered output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }
}

/// Write every artifact or none of them.
///
/// Each file is first written to a hidden `.partial` sibling; only when all of
/// them are staged are they renamed into place. A failure at either step
/// removes the staged files and any targets already placed by this call.
pub fn commit(artifacts: &[Artifact]) -> Result<(), ExportError> {
    let mut staged: Vec<PathBuf> = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        match stage(artifact) {
            Ok(temp) => staged.push(temp),
            Err(err) => {
                discard(&staged);
                return Err(err);
            }
        }
    }
    for (idx, (artifact, temp)) in artifacts.iter().zip(&staged).enumerate() {
        if let Err(source) = std::fs::rename(temp, &artifact.path) {
            discard(&staged[idx..]);
            let placed: Vec<PathBuf> = artifacts[..idx].iter().map(|a| a.path.clone()).collect();
            discard(&placed);
            return Err(ExportError::Io {
                path: artifact.path.clone(),
                source,
            });
        }
    }
    Ok(())
}

fn stage(artifact: &Artifact) -> Result<PathBuf, ExportError> {
    let path = &artifact.path;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{name}.partial"));
    std::fs::write(&temp, &artifact.bytes).map_err(io_error(path))?;
    Ok(temp)
}

fn discard(paths: &[PathBuf]) {
    for path in paths {
        if let Err(err) = std::fs::remove_file(path)
            && err.kind() != std::io::ErrorKind::NotFound
        {
            warn!("Failed to remove {} after an aborted write: {err}", path.display());
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn commit_places_every_file() {
        let dir = tempfile::tempdir().unwrap();
        commit(&[
            Artifact::new(dir.path().join("a.csv"), b"a".to_vec()),
            Artifact::new(dir.path().join("sub/b.csv"), b"b".to_vec()),
        ])
        .unwrap();
        assert_eq!(std::fs::read(dir.path().join("a.csv")).unwrap(), b"a");
        assert_eq!(std::fs::read(dir.path().join("sub/b.csv")).unwrap(), b"b");
        assert_eq!(entries(dir.path()), ["a.csv", "sub"]);
    }

    #[test]
    fn failed_commit_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("gold.csv");
        std::fs::create_dir(&blocked).unwrap();
        let err = commit(&[
            Artifact::new(dir.path().join("model.json"), b"{}".to_vec()),
            Artifact::new(&blocked, b"x".to_vec()),
            Artifact::new(dir.path().join("analytical.csv"), b"y".to_vec()),
        ])
        .unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }));
        assert_eq!(entries(dir.path()), ["gold.csv"]);
        assert!(entries(&blocked).is_empty());
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(ExportFormat::from_path(Path::new("gold.csv")), ExportFormat::Csv);
        assert_eq!(
            ExportFormat::from_path(Path::new("out/gold.JSONL")),
            ExportFormat::JsonLines
        );
        assert_eq!(ExportFormat::from_path(Path::new("gold")), ExportFormat::Csv);
    }
}
