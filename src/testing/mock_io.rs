//! Temporary files for exercising file-backed sources.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

/// A temporary file that is deleted when dropped.
pub struct TempFilePath {
    #[allow(dead_code)]
    temp_file: NamedTempFile,
    path: PathBuf,
}

impl TempFilePath {
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created.
    pub fn new() -> std::io::Result<Self> {
        let temp_file = NamedTempFile::new()?;
        let path = temp_file.path().to_path_buf();
        Ok(Self { temp_file, path })
    }

    /// Create a temporary file whose name ends in `.{extension}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created.
    pub fn with_extension(extension: &str) -> std::io::Result<Self> {
        let temp_file = tempfile::Builder::new()
            .suffix(&format!(".{extension}"))
            .tempfile()?;
        let path = temp_file.path().to_path_buf();
        Ok(Self { temp_file, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path as a string, for sources configured by pattern.
    #[must_use]
    pub fn path_str(&self) -> String {
        self.path.display().to_string()
    }
}

/// A temporary directory that is deleted when dropped.
pub struct TempDirPath {
    #[allow(dead_code)]
    temp_dir: TempDir,
    path: PathBuf,
}

impl TempDirPath {
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().to_path_buf();
        Ok(Self { temp_dir, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.path.join(filename)
    }

    /// Write `content` to `filename` inside the directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_file(&self, filename: &str, content: &str) -> std::io::Result<PathBuf> {
        let path = self.file_path(filename);
        std::fs::write(&path, content)?;
        Ok(path)
    }
}

/// Write `content` verbatim into a fresh `.csv` temporary file.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created.
///
/// ```
/// use groupflow::testing::{LICENSE_CSV, write_temp_csv};
///
/// let file = write_temp_csv(LICENSE_CSV).unwrap();
/// assert!(file.path().exists());
/// ```
pub fn write_temp_csv(content: &str) -> std::io::Result<TempFilePath> {
    let temp = TempFilePath::with_extension("csv")?;
    let mut file = std::fs::File::create(temp.path())?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    Ok(temp)
}

/// Gzip `content` into a fresh `.csv.gz` temporary file.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created.
#[cfg(feature = "compression-gzip")]
pub fn write_temp_csv_gz(content: &str) -> std::io::Result<TempFilePath> {
    use flate2::Compression;
    use flate2::write::GzEncoder;

    let temp = TempFilePath::with_extension("csv.gz")?;
    let file = std::fs::File::create(temp.path())?;
    let mut enc = GzEncoder::new(file, Compression::default());
    enc.write_all(content.as_bytes())?;
    enc.finish()?;
    Ok(temp)
}
