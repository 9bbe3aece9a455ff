//! Producer endpoints a channel reads from

use std::future::Future;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};
use tokio::net::unix::pipe;

/// An external producer of raw bytes
///
/// Reads on `Reader` may be abandoned before they complete. A read that is
/// dropped must leave its data in the producer for the next read.
pub trait ChunkSource: Send + 'static {
    /// Reader yielded by a successful open
    type Reader: AsyncRead + Unpin + Send + 'static;

    /// Open (or re-open) the producer
    fn open(&mut self) -> impl Future<Output = io::Result<Self::Reader>> + Send;

    /// Human-readable description for logs
    fn describe(&self) -> String;

    /// Whether `open` may be called again after end of stream or a failed
    /// read
    ///
    /// Producers that would start over from the beginning return `false`;
    /// their channel ends with the first end of stream.
    fn restartable(&self) -> bool {
        true
    }
}

/// Filesystem source, typically a named pipe fed by an encoder
///
/// A FIFO is read without blocking and reopened whenever it fails. Any other
/// file is streamed once from start to end.
#[derive(Debug, Clone)]
pub struct PipeSource {
    path: PathBuf,
    fifo: bool,
}

impl PipeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fifo: false,
        }
    }

    /// Path of the pipe
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChunkSource for PipeSource {
    type Reader = PipeReader;

    async fn open(&mut self) -> io::Result<PipeReader> {
        let metadata = tokio::fs::metadata(&self.path).await?;
        self.fifo = metadata.file_type().is_fifo();

        if !self.fifo {
            let file = tokio::fs::File::open(&self.path).await?;
            return Ok(PipeReader::File(file));
        }

        let mut options = pipe::OpenOptions::new();
        // Holding a write end ourselves keeps the pipe from reporting end of
        // stream between two writers, and the open from waiting for one
        #[cfg(target_os = "linux")]
        options.read_write(true);

        Ok(PipeReader::Fifo(options.open_receiver(&self.path)?))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn restartable(&self) -> bool {
        self.fifo
    }
}

/// Reader over an opened [`PipeSource`]
#[derive(Debug)]
pub enum PipeReader {
    /// Non-blocking FIFO receiver
    Fifo(pipe::Receiver),
    /// Regular file
    File(tokio::fs::File),
}

impl AsyncRead for PipeReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            PipeReader::Fifo(rx) => Pin::new(rx).poll_read(cx, buf),
            PipeReader::File(file) => Pin::new(file).poll_read(cx, buf),
        }
    }
}

/// Source wrapping a reader that is already open
///
/// Yields the reader on the first `open`. The channel ends once the reader
/// is exhausted.
pub struct OnceSource<R> {
    reader: Option<R>,
    label: String,
}

impl<R> OnceSource<R> {
    pub fn new(reader: R, label: impl Into<String>) -> Self {
        Self {
            reader: Some(reader),
            label: label.into(),
        }
    }
}

impl<R> ChunkSource for OnceSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    type Reader = R;

    async fn open(&mut self) -> io::Result<R> {
        self.reader.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "source reader already consumed")
        })
    }

    fn describe(&self) -> String {
        self.label.clone()
    }

    fn restartable(&self) -> bool {
        false
    }
}
