use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::RotationPolicy;

/// Descriptor of an installed sink, used to inspect the active configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkKind {
    Stdout,
    Stderr,
    File(PathBuf),
}

/// A destination for formatted log lines
#[derive(Debug)]
pub enum Sink {
    Stream(StreamSink),
    RotatingFile(RotatingFileSink),
}

impl Sink {
    pub fn stdout() -> Self {
        Sink::Stream(StreamSink::new(StreamTarget::Stdout))
    }

    pub fn stderr() -> Self {
        Sink::Stream(StreamSink::new(StreamTarget::Stderr))
    }

    /// Write one line; the newline is appended here
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        match self {
            Sink::Stream(sink) => sink.write_line(line),
            Sink::RotatingFile(sink) => sink.write_line(line),
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Stream(sink) => sink.flush(),
            Sink::RotatingFile(sink) => sink.flush(),
        }
    }

    pub fn kind(&self) -> SinkKind {
        match self {
            Sink::Stream(sink) => match sink.target {
                StreamTarget::Stdout => SinkKind::Stdout,
                StreamTarget::Stderr => SinkKind::Stderr,
            },
            Sink::RotatingFile(sink) => SinkKind::File(sink.path.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTarget {
    Stdout,
    Stderr,
}

/// Writes to one of the process's standard streams
#[derive(Debug)]
pub struct StreamSink {
    target: StreamTarget,
}

impl StreamSink {
    pub fn new(target: StreamTarget) -> Self {
        Self { target }
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        match self.target {
            StreamTarget::Stdout => write_line_to(&mut io::stdout().lock(), line),
            StreamTarget::Stderr => write_line_to(&mut io::stderr().lock(), line),
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self.target {
            StreamTarget::Stdout => io::stdout().flush(),
            StreamTarget::Stderr => io::stderr().flush(),
        }
    }
}

fn write_line_to<W: Write>(writer: &mut W, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Appends to a file and rolls it over once it would grow past `max_bytes`.
///
/// Rolled files are named `<path>.1` (newest) through `<path>.<max_backups>`
/// (oldest). With no backups the file is truncated in place instead.
#[derive(Debug)]
pub struct RotatingFileSink {
    path: PathBuf,
    policy: RotationPolicy,
    file: Option<fs_err::File>,
    size: u64,
}

impl RotatingFileSink {
    /// Open (or create) the log file, creating missing parent directories
    pub fn open(path: impl Into<PathBuf>, policy: RotationPolicy) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }

        let file = open_append(&path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path,
            policy,
            file: Some(file),
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        let len = line.len() as u64 + 1;
        if self.size > 0 && self.size + len > self.policy.max_bytes {
            self.rollover()?;
        }

        if self.file.is_none() {
            self.file = Some(open_append(&self.path)?);
        }
        if let Some(file) = self.file.as_mut() {
            write_line_to(file, line)?;
        }
        self.size += len;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }

    fn rollover(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }

        if self.policy.max_backups == 0 {
            self.file = Some(open_truncate(&self.path)?);
            self.size = 0;
            return Ok(());
        }

        for index in (1..self.policy.max_backups).rev() {
            let source = backup_path(&self.path, index);
            if source.exists() {
                let target = backup_path(&self.path, index + 1);
                if target.exists() {
                    fs_err::remove_file(&target)?;
                }
                fs_err::rename(&source, &target)?;
            }
        }

        let newest = backup_path(&self.path, 1);
        if newest.exists() {
            fs_err::remove_file(&newest)?;
        }
        if self.path.exists() {
            fs_err::rename(&self.path, &newest)?;
        }

        self.file = Some(open_append(&self.path)?);
        self.size = 0;
        Ok(())
    }
}

impl Drop for RotatingFileSink {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// `<path>.<index>`
pub fn backup_path(path: &Path, index: usize) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{}", index));
    PathBuf::from(name)
}

fn open_append(path: &Path) -> io::Result<fs_err::File> {
    fs_err::OpenOptions::new().create(true).append(true).open(path)
}

fn open_truncate(path: &Path) -> io::Result<fs_err::File> {
    fs_err::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}
