//! Named-entry archive container
//!
//! Thin wrappers over `zip` that add the bookkeeping a project save or load
//! needs: duplicate-entry suppression by content hash on write, bounded
//! allocation and temp-file staging on read.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use xxhash_rust::xxh64::xxh64;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{ArchiveError, ArchiveResult};

/// Parses a compression method name as used in configuration files.
pub fn compression_method(name: &str) -> ArchiveResult<CompressionMethod> {
    match name.to_ascii_lowercase().as_str() {
        "deflated" | "deflate" => Ok(CompressionMethod::Deflated),
        "stored" | "none" => Ok(CompressionMethod::Stored),
        other => Err(ArchiveError::unknown("compression method", other)),
    }
}

/// Write side of an archive.
///
/// After the first container failure the sink is closed: every later call
/// returns [`ArchiveError::Closed`] and the failure is kept for reporting.
pub struct ArchiveSink<W: Write + Seek> {
    zip: Option<ZipWriter<W>>,
    options: SimpleFileOptions,
    written: HashMap<String, u64>,
    order: Vec<String>,
    failure: Option<String>,
}

impl<W: Write + Seek> ArchiveSink<W> {
    pub fn new(inner: W) -> Self {
        Self::with_compression(inner, CompressionMethod::Deflated)
    }

    pub fn with_compression(inner: W, method: CompressionMethod) -> Self {
        Self {
            zip: Some(ZipWriter::new(inner)),
            options: SimpleFileOptions::default().compression_method(method),
            written: HashMap::new(),
            order: Vec::new(),
            failure: None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.written.contains_key(name)
    }

    /// Entry names in the order they were written.
    pub fn entry_names(&self) -> &[String] {
        &self.order
    }

    pub fn is_closed(&self) -> bool {
        self.zip.is_none()
    }

    /// Message recorded when the sink closed itself.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Adds one entry. Writing an existing name is an error.
    pub fn write_entry(&mut self, name: &str, bytes: &[u8]) -> ArchiveResult<()> {
        if self.written.contains_key(name) {
            return Err(ArchiveError::document(name, "entry already written"));
        }
        let options = self.options;
        let zip = self.zip.as_mut().ok_or(ArchiveError::Closed)?;
        let result = zip
            .start_file(name, options)
            .map_err(ArchiveError::from)
            .and_then(|_| zip.write_all(bytes).map_err(ArchiveError::from));
        match result {
            Ok(()) => {
                log::debug!("Wrote entry {} ({} bytes)", name, bytes.len());
                self.written.insert(name.to_string(), xxh64(bytes, 0));
                self.order.push(name.to_string());
                Ok(())
            }
            Err(e) => {
                self.close_with(format!("Failed writing entry {}: {}", name, e));
                Err(e)
            }
        }
    }

    /// Copies a file into the archive under `name` unless that name is
    /// already present. Returns whether bytes were written.
    pub fn copy_file(&mut self, name: &str, path: &Path) -> ArchiveResult<bool> {
        if self.is_closed() {
            return Err(ArchiveError::Closed);
        }
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;
        if let Some(existing) = self.written.get(name) {
            if *existing != xxh64(&bytes, 0) {
                log::warn!(
                    "Entry {} already holds different content; not replacing it with {}",
                    name,
                    path.display()
                );
            }
            return Ok(false);
        }
        self.write_entry(name, &bytes)?;
        Ok(true)
    }

    /// Finalises the central directory and hands back the inner writer.
    pub fn finish(mut self) -> ArchiveResult<W> {
        let zip = self.zip.take().ok_or(ArchiveError::Closed)?;
        Ok(zip.finish()?)
    }

    fn close_with(&mut self, message: String) {
        log::error!("{}", message);
        // dropping the writer writes what it can of the central directory
        self.zip = None;
        self.failure = Some(message);
    }
}

/// Read side of an archive.
pub struct ArchiveSource<R: Read + Seek> {
    zip: ZipArchive<R>,
    staged: Vec<TempPath>,
}

impl ArchiveSource<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> ArchiveResult<Self> {
        Self::new(File::open(path)?)
    }
}

impl<R: Read + Seek> ArchiveSource<R> {
    pub fn new(reader: R) -> ArchiveResult<Self> {
        Ok(Self {
            zip: ZipArchive::new(reader)?,
            staged: Vec::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.zip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zip.len() == 0
    }

    /// Entry names in container order.
    pub fn entry_names(&mut self) -> ArchiveResult<Vec<String>> {
        let mut names = Vec::with_capacity(self.zip.len());
        for i in 0..self.zip.len() {
            let file = self.zip.by_index(i)?;
            if !file.is_dir() {
                names.push(file.name().to_string());
            }
        }
        Ok(names)
    }

    pub fn contains(&mut self, name: &str) -> bool {
        self.zip.by_name(name).is_ok()
    }

    pub fn read_entry(&mut self, name: &str) -> ArchiveResult<Vec<u8>> {
        let mut file = match self.zip.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Err(ArchiveError::MissingEntry(name.to_string())),
            Err(e) => return Err(e.into()),
        };
        let size = file.size();
        let mut bytes = Vec::new();
        usize::try_from(size)
            .map_err(|_| ArchiveError::OutOfMemory(format!("entry {} declares {} bytes", name, size)))
            .and_then(|size| {
                bytes
                    .try_reserve_exact(size)
                    .map_err(|e| ArchiveError::OutOfMemory(format!("entry {} ({} bytes): {}", name, size, e)))
            })?;
        file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    pub fn read_text(&mut self, name: &str) -> ArchiveResult<String> {
        let bytes = self.read_entry(name)?;
        String::from_utf8(bytes).map_err(|e| ArchiveError::document(name, format!("not UTF-8: {}", e)))
    }

    /// Copies an entry to a new temp file and returns its path.
    ///
    /// The file lives until the staged paths are dropped; see
    /// [`ArchiveSource::take_staged`].
    pub fn extract_to_temp(&mut self, name: &str, prefix: &str, suffix: &str) -> ArchiveResult<PathBuf> {
        let mut file = match self.zip.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Err(ArchiveError::MissingEntry(name.to_string())),
            Err(e) => return Err(e.into()),
        };
        let mut tmp = tempfile::Builder::new().prefix(prefix).suffix(suffix).tempfile()?;
        io::copy(&mut file, &mut tmp)?;
        tmp.flush()?;
        let staged = tmp.into_temp_path();
        let path = staged.to_path_buf();
        log::debug!("Staged entry {} at {}", name, path.display());
        self.staged.push(staged);
        Ok(path)
    }

    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// Hands ownership of staged temp files to the caller.
    pub fn take_staged(&mut self) -> Vec<TempPath> {
        std::mem::take(&mut self.staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::NamedTempFile;

    #[test]
    fn test_entries_keep_write_order() -> ArchiveResult<()> {
        let mut sink = ArchiveSink::new(Cursor::new(Vec::new()));
        sink.write_entry("b.xml", b"<b/>")?;
        sink.write_entry("a.xml", b"<a/>")?;
        assert!(sink.write_entry("a.xml", b"again").is_err());
        let bytes = sink.finish()?.into_inner();

        let mut source = ArchiveSource::new(Cursor::new(bytes))?;
        assert_eq!(source.entry_names()?, vec!["b.xml", "a.xml"]);
        assert_eq!(source.read_text("a.xml")?, "<a/>");
        assert!(matches!(source.read_entry("missing"), Err(ArchiveError::MissingEntry(_))));
        Ok(())
    }

    #[test]
    fn test_copy_file_once_per_name() -> ArchiveResult<()> {
        let mut file = NamedTempFile::new()?;
        file.write_all(b"session bytes")?;
        let mut sink = ArchiveSink::with_compression(Cursor::new(Vec::new()), CompressionMethod::Stored);
        assert!(sink.copy_file("viewer_1", file.path())?);
        assert!(!sink.copy_file("viewer_1", file.path())?);
        assert_eq!(sink.entry_names().len(), 1);
        Ok(())
    }

    #[test]
    fn test_extract_to_temp() -> ArchiveResult<()> {
        let mut sink = ArchiveSink::new(Cursor::new(Vec::new()));
        sink.write_entry("1abc.pdb", b"ATOM")?;
        let bytes = sink.finish()?.into_inner();
        let mut source = ArchiveSource::new(Cursor::new(bytes))?;
        let path = source.extract_to_temp("1abc.pdb", "1abc", ".pdb")?;
        assert_eq!(std::fs::read(&path)?, b"ATOM");
        let staged = source.take_staged();
        assert_eq!(staged.len(), 1);
        drop(staged);
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_compression_names() {
        assert_eq!(compression_method("Deflated").unwrap(), CompressionMethod::Deflated);
        assert_eq!(compression_method("stored").unwrap(), CompressionMethod::Stored);
        assert!(compression_method("lzma2000").is_err());
    }
}
