//! Transparent decompression for file-backed record sources.
//!
//! A [`CompressionCodec`] is matched against a file first by extension and then
//! by magic bytes; the matching codec wraps the raw reader. When no codec
//! matches, the file is read as-is.
//!
//! Built-in codecs (feature flags):
//! - **Gzip** (`.gz`) via `flate2` (feature: `compression-gzip`)
//! - **Zstd** (`.zst`) via `zstd` (feature: `compression-zstd`)
//!
//! ```no_run
//! use groupflow::io::compression::{auto_detect_reader, builtin_codecs};
//! use std::fs::File;
//! # fn main() -> std::io::Result<()> {
//! let file = File::open("usage.csv.gz")?;
//! let reader = auto_detect_reader(file, "usage.csv.gz", &builtin_codecs())?;
//! # Ok(())
//! # }
//! ```

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::Arc;

/// Pluggable decompression codec.
pub trait CompressionCodec: Send + Sync {
    /// Human-readable codec name (e.g., "gzip", "zstd").
    fn name(&self) -> &str;

    /// Lowercase file extensions with the leading dot (e.g., `&[".gz"]`).
    fn extensions(&self) -> &[&str];

    /// Magic byte signature, if the format has one.
    fn magic_bytes(&self) -> Option<&[u8]>;

    /// Wrap a reader with decompression.
    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>>;
}

/// Codecs compiled into this build.
pub fn builtin_codecs() -> Vec<Arc<dyn CompressionCodec>> {
    vec![
        #[cfg(feature = "compression-gzip")]
        Arc::new(GzipCodec),
        #[cfg(feature = "compression-zstd")]
        Arc::new(ZstdCodec),
    ]
}

fn detect_from_extension(
    path: &Path,
    codecs: &[Arc<dyn CompressionCodec>],
) -> Option<Arc<dyn CompressionCodec>> {
    let path_str = path.to_string_lossy().to_lowercase();
    codecs
        .iter()
        .find(|c| c.extensions().iter().any(|ext| path_str.ends_with(ext)))
        .cloned()
}

/// Peeks at the buffered reader without advancing it.
fn detect_from_magic<R: BufRead>(
    reader: &mut R,
    codecs: &[Arc<dyn CompressionCodec>],
) -> Option<Arc<dyn CompressionCodec>> {
    let buf = reader.fill_buf().ok()?;
    if buf.is_empty() {
        return None;
    }
    codecs
        .iter()
        .find(|c| c.magic_bytes().is_some_and(|magic| buf.starts_with(magic)))
        .cloned()
}

/// Wrap `reader` with the codec matching `path_hint`, if any.
///
/// # Errors
/// Returns an error if the codec fails to initialize on the stream.
pub fn auto_detect_reader<R: Read + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
    codecs: &[Arc<dyn CompressionCodec>],
) -> std::io::Result<Box<dyn Read>> {
    if let Some(codec) = detect_from_extension(path_hint.as_ref(), codecs) {
        return codec.wrap_reader_dyn(Box::new(reader));
    }

    let mut buf_reader = BufReader::new(reader);
    if let Some(codec) = detect_from_magic(&mut buf_reader, codecs) {
        return codec.wrap_reader_dyn(Box::new(buf_reader));
    }

    Ok(Box::new(buf_reader))
}

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
impl CompressionCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn extensions(&self) -> &[&str] {
        &[".gz", ".gzip"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x1f, 0x8b])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        use flate2::read::GzDecoder;
        Ok(Box::new(GzDecoder::new(reader)))
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &str {
        "zstd"
    }

    fn extensions(&self) -> &[&str] {
        &[".zst", ".zstd"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x28, 0xb5, 0x2f, 0xfd])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        zstd::stream::read::Decoder::new(reader).map(|d| Box::new(d) as Box<dyn Read>)
    }
}
