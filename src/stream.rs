//! # Stream Bridge
//!
//! TLS engines speak bytes; peer transports speak chunks. This module adapts
//! between the two streaming models in both directions:
//!
//! - [`DuplexIo`] wraps a chunk-oriented duplex (a `Stream` of inbound chunks
//!   plus a `Sink` of outbound chunks) and exposes tokio byte I/O for an
//!   engine to drive.
//! - [`ChunkDuplex`] wraps tokio byte I/O and exposes the chunk-oriented
//!   duplex for a transport to consume.
//!
//! ## Backpressure
//!
//! The sink side admits at most one chunk in flight. `poll_ready` is the
//! drain signal: it completes only once the previous chunk has been written
//! out in full, and `start_send` refuses a chunk while one is still pending.
//! Violating the ready/send protocol is an error, not a silent reorder.
//!
//! ## Ordering and Shutdown
//!
//! Chunks flow strictly FIFO in both directions. Either direction may reach
//! end-of-stream without tearing down the other (half-open); terminal errors
//! propagate to whichever caller touches the bridge next.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::{Buf, Bytes};
use futures::{Sink, Stream};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Size of the scratch buffer used when turning byte reads into chunks.
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Adapt a chunk-oriented duplex into tokio byte I/O.
pub fn duplex_to_io<D>(duplex: D) -> DuplexIo<D>
where
    D: Stream<Item = io::Result<Bytes>> + Sink<Bytes, Error = io::Error> + Unpin,
{
    DuplexIo {
        duplex,
        inbound: None,
        read_done: false,
    }
}

/// Adapt tokio byte I/O into a chunk-oriented duplex.
pub fn io_to_duplex<S>(io: S) -> ChunkDuplex<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    ChunkDuplex {
        io,
        outbound: None,
        read_buf: vec![0u8; READ_CHUNK_SIZE],
        read_done: false,
    }
}

/// Byte-oriented view over a chunk duplex. See [`duplex_to_io`].
#[derive(Debug)]
pub struct DuplexIo<D> {
    duplex: D,
    /// Partially consumed inbound chunk.
    inbound: Option<Bytes>,
    read_done: bool,
}

impl<D> DuplexIo<D> {
    /// Consume the adapter, returning the underlying duplex.
    pub fn into_inner(self) -> D {
        self.duplex
    }
}

impl<D> AsyncRead for DuplexIo<D>
where
    D: Stream<Item = io::Result<Bytes>> + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        loop {
            if let Some(chunk) = this.inbound.as_mut() {
                let n = chunk.len().min(buf.remaining());
                buf.put_slice(&chunk[..n]);
                chunk.advance(n);
                if chunk.is_empty() {
                    this.inbound = None;
                }
                return Poll::Ready(Ok(()));
            }

            if this.read_done {
                return Poll::Ready(Ok(()));
            }

            match ready!(Pin::new(&mut this.duplex).poll_next(cx)) {
                Some(Ok(chunk)) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    this.inbound = Some(chunk);
                }
                Some(Err(err)) => {
                    this.read_done = true;
                    return Poll::Ready(Err(err));
                }
                None => {
                    this.read_done = true;
                    return Poll::Ready(Ok(()));
                }
            }
        }
    }
}

impl<D> AsyncWrite for DuplexIo<D>
where
    D: Sink<Bytes, Error = io::Error> + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(Pin::new(&mut this.duplex).poll_ready(cx))?;
        Pin::new(&mut this.duplex).start_send(Bytes::copy_from_slice(buf))?;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().duplex).poll_flush(cx)
    }

    /// Closes the outbound direction only; the peer may keep sending until
    /// it ends its own side.
    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().duplex).poll_close(cx)
    }
}

/// Chunk-oriented view over byte I/O. See [`io_to_duplex`].
#[derive(Debug)]
pub struct ChunkDuplex<S> {
    io: S,
    /// The single in-flight outbound chunk, drained before the sink reports
    /// ready again.
    outbound: Option<Bytes>,
    read_buf: Vec<u8>,
    read_done: bool,
}

impl<S> ChunkDuplex<S> {
    /// Consume the adapter, returning the underlying byte stream.
    pub fn into_inner(self) -> S {
        self.io
    }
}

impl<S> Stream for ChunkDuplex<S>
where
    S: AsyncRead + Unpin,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.read_done {
            return Poll::Ready(None);
        }

        let mut buf = ReadBuf::new(this.read_buf.as_mut_slice());
        match ready!(Pin::new(&mut this.io).poll_read(cx, &mut buf)) {
            Ok(()) => {
                let filled = buf.filled();
                if filled.is_empty() {
                    this.read_done = true;
                    Poll::Ready(None)
                } else {
                    Poll::Ready(Some(Ok(Bytes::copy_from_slice(filled))))
                }
            }
            Err(err) => {
                this.read_done = true;
                Poll::Ready(Some(Err(err)))
            }
        }
    }
}

impl<S> Sink<Bytes> for ChunkDuplex<S>
where
    S: AsyncWrite + Unpin,
{
    type Error = io::Error;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            match this.outbound.as_mut() {
                None => return Poll::Ready(Ok(())),
                Some(chunk) if chunk.is_empty() => {
                    this.outbound = None;
                }
                Some(chunk) => {
                    let n = ready!(Pin::new(&mut this.io).poll_write(cx, chunk.as_ref()))?;
                    if n == 0 {
                        return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
                    }
                    chunk.advance(n);
                }
            }
        }
    }

    fn start_send(self: Pin<&mut Self>, item: Bytes) -> io::Result<()> {
        let this = self.get_mut();
        if this.outbound.is_some() {
            // The previous chunk has not drained; the producer ignored
            // backpressure.
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "chunk submitted before the previous one drained",
            ));
        }
        if !item.is_empty() {
            this.outbound = Some(item);
        }
        Ok(())
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        ready!(self.as_mut().poll_ready(cx))?;
        Pin::new(&mut self.get_mut().io).poll_flush(cx)
    }

    /// Flushes and shuts down the outbound direction; inbound reads continue
    /// until the peer ends its side.
    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        ready!(self.as_mut().poll_flush(cx))?;
        Pin::new(&mut self.get_mut().io).poll_shutdown(cx)
    }
}
