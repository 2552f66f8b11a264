//! The byte sink a response is written into.
//!
//! Besides plain writes, a transport offers a single-shot zero-copy
//! file transfer. One call moves at most `len` bytes and may move fewer;
//! the caller is responsible for looping until the range is exhausted.

use async_trait::async_trait;
use std::fs::File;
use std::io;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

#[async_trait]
pub trait Transport: Send {
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    async fn flush(&mut self) -> io::Result<()>;

    /// Transfer up to `len` bytes of `file`, starting at `offset`.
    ///
    /// Returns the number of bytes actually transferred. A transport that
    /// cannot make progress right now fails with `io::ErrorKind::WouldBlock`.
    async fn send_file(&mut self, file: &File, offset: u64, len: usize) -> io::Result<usize>;
}

#[async_trait]
impl Transport for TcpStream {
    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        AsyncWriteExt::write_all(self, buf).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        AsyncWriteExt::flush(self).await
    }

    #[cfg(target_os = "linux")]
    async fn send_file(&mut self, file: &File, offset: u64, len: usize) -> io::Result<usize> {
        use std::os::fd::AsRawFd;
        use tokio::io::Interest;

        let stream: &TcpStream = self;
        stream.writable().await?;
        // try_io clears write readiness when sendfile reports EAGAIN
        stream.try_io(Interest::WRITABLE, || {
            sendfile(stream.as_raw_fd(), file.as_raw_fd(), offset, len)
        })
    }

    #[cfg(not(target_os = "linux"))]
    async fn send_file(&mut self, file: &File, offset: u64, len: usize) -> io::Result<usize> {
        use std::os::unix::fs::FileExt;

        let file = file.try_clone()?;
        let (buf, n) = tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; len.min(FALLBACK_CHUNK_SIZE)];
            file.read_at(&mut buf, offset).map(|n| (buf, n))
        })
        .await
        .map_err(io::Error::other)??;
        if n == 0 {
            return Ok(0);
        }
        AsyncWriteExt::write(self, &buf[..n]).await
    }
}

/// Per-call cap for the kernel transfer; larger ranges take more calls.
#[cfg(target_os = "linux")]
const SENDFILE_SIZE_LIMIT: usize = 1 << 30;

#[cfg(not(target_os = "linux"))]
const FALLBACK_CHUNK_SIZE: usize = 64 * 1024;

/// Safe wrapper for `libc::sendfile`.
#[cfg(target_os = "linux")]
fn sendfile(
    out_fd: std::os::fd::RawFd,
    in_fd: std::os::fd::RawFd,
    offset: u64,
    count: usize,
) -> io::Result<usize> {
    let mut offset = libc::off_t::try_from(offset)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "file offset out of range"))?;
    let count = count.min(SENDFILE_SIZE_LIMIT);
    // SAFETY: both descriptors are borrowed from live owners for the
    // duration of the call, and `offset` points to a valid local.
    let ret = unsafe { libc::sendfile(out_fd, in_fd, &mut offset, count) };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}
