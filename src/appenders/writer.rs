//! Output over any `io::Write`: standard streams and files

use crate::core::{LogLevel, LoggerError, Result, TextOutput};
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub struct WriterOutput {
    name: String,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl WriterOutput {
    pub fn new(name: impl Into<String>, writer: impl Write + Send + 'static) -> Self {
        Self {
            name: name.into(),
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new("stdout", io::stdout())
    }

    pub fn stderr() -> Self {
        Self::new("stderr", io::stderr())
    }

    /// Append to `path`, creating it if needed
    ///
    /// Lines are written unbuffered so each record reaches the file as
    /// one write.
    pub fn file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                LoggerError::io_operation(
                    "opening log file",
                    format!("cannot open '{}'", path.display()),
                    e,
                )
            })?;

        Ok(Self::new(Self::file_label(&path), file))
    }

    fn file_label(path: &Path) -> String {
        format!("file:{}", path.display())
    }
}

impl TextOutput for WriterOutput {
    fn output(&self, _level: LogLevel, line: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.write_all(line)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.writer.lock().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for WriterOutput {
    fn drop(&mut self) {
        let _ = self.writer.get_mut().flush();
    }
}
