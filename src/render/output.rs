//! Where rendered output goes

use std::io::Write;
use std::path::{Path, PathBuf};

use super::OutputFormat;
use crate::error::Result;

/// Destination for a rendered artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    /// Resolve a `--file` value.
    ///
    /// An empty value means nothing is written. `-` selects stdout. Any other
    /// value is a path that gets the format's extension appended when it does
    /// not already end with it.
    pub fn from_file(file: &str, format: OutputFormat) -> Option<Self> {
        match file.trim() {
            "" => None,
            "-" => Some(OutputTarget::Stdout),
            path => {
                let suffix = format!(".{}", format.extension());
                if path.ends_with(&suffix) {
                    Some(OutputTarget::File(PathBuf::from(path)))
                } else {
                    Some(OutputTarget::File(PathBuf::from(format!("{}{}", path, suffix))))
                }
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            OutputTarget::Stdout => None,
            OutputTarget::File(path) => Some(path),
        }
    }
}

/// Write `bytes` to `target`, replacing any existing file
pub fn write_output(target: &OutputTarget, bytes: &[u8]) -> Result<()> {
    match target {
        OutputTarget::Stdout => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
        OutputTarget::File(path) => {
            std::fs::write(path, bytes)?;
            tracing::info!("Wrote {} bytes to {}", bytes.len(), path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PromalyError;
    use tempfile::TempDir;

    #[test]
    fn test_from_file() {
        assert_eq!(OutputTarget::from_file("", OutputFormat::Csv), None);
        assert_eq!(
            OutputTarget::from_file("-", OutputFormat::Json),
            Some(OutputTarget::Stdout)
        );
        assert_eq!(
            OutputTarget::from_file("./graph", OutputFormat::Csv),
            Some(OutputTarget::File(PathBuf::from("./graph.csv")))
        );
        assert_eq!(
            OutputTarget::from_file("report.json", OutputFormat::Json),
            Some(OutputTarget::File(PathBuf::from("report.json")))
        );
        // a different extension is not ours
        assert_eq!(
            OutputTarget::from_file("report.json", OutputFormat::Table),
            Some(OutputTarget::File(PathBuf::from("report.json.txt")))
        );
    }

    #[test]
    fn test_write_file() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("graph");
        let target = OutputTarget::from_file(base.to_str().unwrap(), OutputFormat::Ndjson).unwrap();

        write_output(&target, b"first\n").unwrap();
        write_output(&target, b"second\n").unwrap();

        let path = dir.path().join("graph.ndjson");
        assert_eq!(target.path(), Some(path.as_path()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second\n");
    }

    #[test]
    fn test_write_missing_directory() {
        let dir = TempDir::new().unwrap();
        let target = OutputTarget::File(dir.path().join("missing").join("graph.csv"));
        let err = write_output(&target, b"x").unwrap_err();
        assert!(matches!(err, PromalyError::Io(_)));
    }
}
