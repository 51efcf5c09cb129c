//! Rotating File Writer
//!
//! Owns one physical log file. Records are appended through a buffered writer
//! and flushed immediately. Once the file grows past the configured size it is
//! renamed to `<prefix>_<unix_ts>.<suffix>`, optionally archived into
//! `<prefix>_<unix_ts>.tar.gz`, and a fresh file takes its place.
//!
//! The writer does no locking of its own; callers serialize access.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, info, warn};

use crate::error::{CacheError, LogAction, Result};

// == Log File ==
#[derive(Debug)]
pub struct LogFile {
    path: PathBuf,
    prefix: String,
    suffix: Option<String>,
    max_size_bytes: u64,
    compress: bool,
    /// Size of the file right after it was last re-seeded with live entries.
    compacted_size: u64,
    writer: Option<BufWriter<File>>,
}

impl LogFile {
    /// Creates a writer for `path`. Nothing is opened until the first write.
    ///
    /// `max_size_bytes == 0` disables rotation.
    pub fn new(path: impl Into<PathBuf>, max_size_bytes: u64, compress: bool) -> Self {
        let path = path.into();
        let prefix = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "log".to_string());
        let suffix = path
            .extension()
            .map(|s| s.to_string_lossy().into_owned());

        Self {
            path,
            prefix,
            suffix,
            max_size_bytes,
            compress,
            compacted_size: 0,
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // == Write ==
    /// Appends one newline-terminated record, rotating first if the file is
    /// over its size limit.
    ///
    /// Returns the retired file (archive when compressing) if a rotation happened.
    pub fn write(&mut self, record: &[u8]) -> Result<Option<PathBuf>> {
        let retired = if self.needs_rotation()? {
            Some(self.rotate()?)
        } else {
            None
        };
        self.append(record)?;
        Ok(retired)
    }

    /// Appends one newline-terminated record without checking the size limit.
    pub fn append(&mut self, record: &[u8]) -> Result<()> {
        let path = self.path.clone();
        let writer = self.open()?;
        writer
            .write_all(record)
            .map_err(CacheError::log(LogAction::Write, &path))?;
        if !record.ends_with(b"\n") {
            writer
                .write_all(b"\n")
                .map_err(CacheError::log(LogAction::Write, &path))?;
        }
        writer
            .flush()
            .map_err(CacheError::log(LogAction::Flush, &path))
    }

    // == Close ==
    /// Flushes and releases the file handle. A no-op when nothing is open.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .map_err(CacheError::log(LogAction::Flush, &self.path))?;
            writer
                .get_ref()
                .sync_all()
                .map_err(CacheError::log(LogAction::Flush, &self.path))?;
            debug!(path = %self.path.display(), "Closed command log file");
        }
        Ok(())
    }

    fn open(&mut self) -> Result<&mut BufWriter<File>> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => {
                if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)
                        .map_err(CacheError::log(LogAction::Open, parent))?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .map_err(CacheError::log(LogAction::Open, &self.path))?;
                BufWriter::new(file)
            }
        };
        Ok(self.writer.insert(writer))
    }

    // == Rotation ==
    fn current_size(&self) -> Result<u64> {
        let metadata = match &self.writer {
            Some(writer) => writer.get_ref().metadata(),
            None => match fs::metadata(&self.path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
                other => other,
            },
        };
        metadata
            .map(|m| m.len())
            .map_err(CacheError::log(LogAction::Read, &self.path))
    }

    /// Records the current size as the compacted baseline.
    ///
    /// The file will not rotate again until it grows past twice that size,
    /// so a live set larger than the limit does not rotate on every write.
    pub fn mark_compacted(&mut self) -> Result<()> {
        self.compacted_size = self.current_size()?;
        debug!(
            path = %self.path.display(),
            compacted_size = self.compacted_size,
            "Recorded compacted log size"
        );
        Ok(())
    }

    fn rotation_threshold(&self) -> u64 {
        self.max_size_bytes
            .max(self.compacted_size.saturating_mul(2))
    }

    fn needs_rotation(&self) -> Result<bool> {
        if self.max_size_bytes == 0 {
            return Ok(false);
        }
        Ok(self.current_size()? > self.rotation_threshold())
    }

    /// Retires the active file and opens a fresh empty one in its place.
    fn rotate(&mut self) -> Result<PathBuf> {
        self.close()?;

        let timestamp = chrono::Utc::now().timestamp();
        let stem = self.free_stem(timestamp);
        let rotated = self.sibling(&stem, self.suffix.as_deref());
        fs::rename(&self.path, &rotated).map_err(CacheError::log(LogAction::Rename, &rotated))?;
        info!(
            from = %self.path.display(),
            to = %rotated.display(),
            "Rotated command log"
        );

        let retired = if self.compress {
            let archive = self.sibling(&stem, Some("tar.gz"));
            archive_file(&rotated, &archive)?;
            fs::remove_file(&rotated).map_err(CacheError::log(LogAction::Remove, &rotated))?;
            info!(archive = %archive.display(), "Compressed rotated command log");
            archive
        } else {
            rotated
        };

        self.compacted_size = 0;
        self.open()?;
        Ok(retired)
    }

    /// Picks `<prefix>_<ts>`, adding a counter if that name is already taken.
    fn free_stem(&self, timestamp: i64) -> String {
        let base = format!("{}_{}", self.prefix, timestamp);
        let taken = |stem: &str| {
            self.sibling(stem, self.suffix.as_deref()).exists()
                || (self.compress && self.sibling(stem, Some("tar.gz")).exists())
        };
        if !taken(&base) {
            return base;
        }
        let mut n = 1u32;
        loop {
            let stem = format!("{}_{}", base, n);
            if !taken(&stem) {
                return stem;
            }
            n += 1;
        }
    }

    fn sibling(&self, stem: &str, extension: Option<&str>) -> PathBuf {
        let name = match extension {
            Some(ext) => format!("{}.{}", stem, ext),
            None => stem.to_string(),
        };
        self.path.with_file_name(name)
    }
}

/// Writes `source` into a gzip-compressed tarball at `archive`.
fn archive_file(source: &Path, archive: &Path) -> Result<()> {
    let compress_err = CacheError::log(LogAction::Compress, archive);
    let result = (|| -> std::io::Result<()> {
        let file = File::create(archive)?;
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        let name = source
            .file_name()
            .ok_or_else(|| std::io::Error::other("rotated file has no name"))?;
        builder.append_path_with_name(source, name)?;
        let encoder = builder.into_inner()?;
        encoder.finish()?.sync_all()
    })();

    if result.is_err() {
        match fs::remove_file(archive) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                archive = %archive.display(),
                error = %e,
                "Failed to remove partial archive"
            ),
        }
    }
    result.map_err(compress_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    fn entries_of(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_lazy_open_and_close_without_writes() {
        let dir = TempDir::new().expect("temp dir");
        let mut file = LogFile::new(dir.path().join("cache.aof"), 0, false);

        file.close().unwrap();
        assert!(!dir.path().join("cache.aof").exists());
    }

    #[test]
    fn test_write_creates_parent_dirs_and_terminates_records() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("nested/deeper/cache.aof");
        let mut file = LogFile::new(&path, 0, false);

        assert!(file.write(b"SET a 1 0 0").unwrap().is_none());
        assert!(file.write(b"DELETE a\n").unwrap().is_none());

        assert_eq!(fs::read_to_string(&path).unwrap(), "SET a 1 0 0\nDELETE a\n");
    }

    #[test]
    fn test_rotation_without_compression() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("cache.aof");
        fs::write(&path, "x".repeat(64)).unwrap();

        let mut file = LogFile::new(&path, 32, false);
        let retired = file.write(b"CLEANUP").unwrap().expect("rotated");

        let name = retired.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("cache_"));
        assert!(name.ends_with(".aof"));
        assert_eq!(fs::read_to_string(&retired).unwrap(), "x".repeat(64));
        assert_eq!(fs::read_to_string(&path).unwrap(), "CLEANUP\n");
    }

    #[test]
    fn test_rotation_with_compression_leaves_only_archive() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("cache.aof");
        fs::write(&path, "y".repeat(64)).unwrap();

        let mut file = LogFile::new(&path, 32, true);
        let archive = file.write(b"CLEANUP").unwrap().expect("rotated");

        assert!(archive.to_string_lossy().ends_with(".tar.gz"));
        let names = entries_of(dir.path());
        assert_eq!(names.len(), 2, "unexpected files: {:?}", names);
        assert!(names.contains(&"cache.aof".to_string()));

        let mut tarball = tar::Archive::new(GzDecoder::new(File::open(&archive).unwrap()));
        let mut entries = tarball.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "y".repeat(64));
        assert!(entries.next().is_none());
    }

    #[test]
    fn test_two_rotations_in_same_second_do_not_collide() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("cache.aof");
        let mut file = LogFile::new(&path, 4, false);

        file.write(b"first record").unwrap();
        let a = file.write(b"second record").unwrap().expect("rotated");
        let b = file.write(b"third record").unwrap().expect("rotated");

        assert_ne!(a, b);
        assert_eq!(fs::read_to_string(&a).unwrap(), "first record\n");
        assert_eq!(fs::read_to_string(&b).unwrap(), "second record\n");
    }

    #[test]
    fn test_no_rotation_at_exact_limit() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("cache.aof");
        let mut file = LogFile::new(&path, 4, false);

        file.write(b"abc").unwrap();
        assert!(file.write(b"d").unwrap().is_none());
    }

    #[test]
    fn test_compacted_baseline_defers_rotation() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("cache.aof");
        let mut file = LogFile::new(&path, 8, false);

        // Re-seeded content alone is already over the 8 byte limit.
        file.append(b"0123456789").unwrap();
        file.mark_compacted().unwrap();

        assert!(file.write(b"x").unwrap().is_none());
        assert!(file.write(b"abcdefghi").unwrap().is_none());
        assert_eq!(fs::metadata(&path).unwrap().len(), 23);

        // Past twice the compacted size, rotation resumes and the baseline resets.
        assert!(file.write(b"z").unwrap().is_some());
        assert_eq!(fs::read_to_string(&path).unwrap(), "z\n");
        file.write(b"0123456789").unwrap();
        assert!(file.write(b"w").unwrap().is_some());
    }
}
