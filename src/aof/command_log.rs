//! Command Log
//!
//! Encodes commands into records, appends them through the rotating writer,
//! and parses the active file back into an ordered command list.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::aof::{Command, LogFile};
use crate::config::PersistenceConfig;
use crate::context::Context;
use crate::error::{CacheError, LogAction, Result};

// == Command Log ==
#[derive(Debug)]
pub struct CommandLog {
    file: LogFile,
}

impl CommandLog {
    pub fn new(config: &PersistenceConfig) -> Self {
        Self {
            file: LogFile::new(&config.path, config.max_size_bytes(), config.compress),
        }
    }

    // == Store ==
    /// Appends one command. Returns the retired file if the append rotated the log.
    pub fn store(&mut self, command: &Command) -> Result<Option<PathBuf>> {
        debug!(op = command.op(), "Appending command");
        self.file.write(command.to_string().as_bytes())
    }

    /// Appends a batch of commands without rotating in between.
    ///
    /// Used to re-seed a freshly rotated file with the live entries. The
    /// resulting size becomes the baseline for the next rotation.
    pub fn store_snapshot<I>(&mut self, commands: I) -> Result<usize>
    where
        I: IntoIterator<Item = Command>,
    {
        let mut count = 0;
        for command in commands {
            self.file.append(command.to_string().as_bytes())?;
            count += 1;
        }
        self.file.mark_compacted()?;
        Ok(count)
    }

    // == Load ==
    /// Reads and parses the whole active file in order.
    ///
    /// A missing file is an empty history. Malformed lines are skipped with a
    /// warning; failing to read the file at all is an error.
    pub fn load_file(&self, ctx: &Context) -> Result<Vec<Command>> {
        ctx.check()?;

        let path = self.file.path();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No command log found, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(CacheError::log(LogAction::Read, path)(e)),
        };

        let mut commands = Vec::new();
        let mut skipped = 0usize;
        for (index, raw) in bytes.split(|b| *b == b'\n').enumerate() {
            if raw.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let parsed = std::str::from_utf8(raw)
                .map_err(|e| e.to_string())
                .and_then(|line| Command::parse(line).map_err(|e| e.to_string()));
            match parsed {
                Ok(command) => commands.push(command),
                Err(reason) => {
                    skipped += 1;
                    warn!(
                        path = %path.display(),
                        line = index + 1,
                        %reason,
                        "Skipping malformed command log record"
                    );
                }
            }
        }

        info!(
            path = %path.display(),
            commands = commands.len(),
            skipped,
            "Loaded command log"
        );
        Ok(commands)
    }

    pub fn close(&mut self) -> Result<()> {
        self.file.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TaggedValue;
    use crate::error::ErrorKind;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn log_in(dir: &TempDir) -> CommandLog {
        CommandLog::new(&PersistenceConfig::at(dir.path().join("cache.aof")))
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().expect("temp dir");
        let log = log_in(&dir);
        assert!(log.load_file(&Context::background()).unwrap().is_empty());
    }

    #[test]
    fn test_store_then_load_preserves_order() {
        let dir = TempDir::new().expect("temp dir");
        let mut log = log_in(&dir);
        let commands = vec![
            Command::set("a", TaggedValue::Int(1), None),
            Command::set("b b", TaggedValue::Str("two words".into()), Some(42)),
            Command::delete("a"),
            Command::Cleanup,
        ];
        for command in &commands {
            assert!(log.store(command).unwrap().is_none());
        }
        log.close().unwrap();

        assert_eq!(log.load_file(&Context::background()).unwrap(), commands);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("cache.aof");
        fs::write(
            &path,
            "SET a 1 0 0\nSET broken 1\nBOGUS\n\nDELETE a\nSET b 2 0",
        )
        .unwrap();

        let log = log_in(&dir);
        let commands = log.load_file(&Context::background()).unwrap();
        assert_eq!(
            commands,
            vec![
                Command::set("a", TaggedValue::Int(1), None),
                Command::delete("a"),
                Command::set("b", TaggedValue::Int(2), None),
            ]
        );
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("cache.aof");
        fs::write(&path, b"DELETE \xff\xfe\nCLEANUP\n").unwrap();

        let log = log_in(&dir);
        assert_eq!(
            log.load_file(&Context::background()).unwrap(),
            vec![Command::Cleanup]
        );
    }

    #[test]
    fn test_unreadable_path_is_an_error() {
        let dir = TempDir::new().expect("temp dir");
        // A directory where the file should be cannot be read as a log.
        fs::create_dir(dir.path().join("cache.aof")).unwrap();

        let err = log_in(&dir).load_file(&Context::background()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_load_respects_cancellation() {
        let dir = TempDir::new().expect("temp dir");
        let token = CancellationToken::new();
        token.cancel();
        let ctx = Context::background().with_cancellation(token);

        let err = log_in(&dir).load_file(&ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_snapshot_appends_without_rotation() {
        let dir = TempDir::new().expect("temp dir");
        let mut log = log_in(&dir);
        let written = log
            .store_snapshot(vec![
                Command::set("x", TaggedValue::Uint(1), None),
                Command::set("y", TaggedValue::Float(0.5), None),
            ])
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(log.load_file(&Context::background()).unwrap().len(), 2);
    }
}
