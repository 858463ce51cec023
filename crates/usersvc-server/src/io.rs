//! Connection I/O with read, write and idle deadlines.
//!
//! [`TimedIo`] wraps an accepted stream. Which read deadline applies is
//! decided by the shared [`ConnPhase`], updated by the request service as a
//! request moves through the connection:
//!
//! - `Reading`: request line, headers and body are bounded by the read timeout
//! - `Handling`: the handler runs; reads carry no deadline
//! - `Idle`: a kept-alive connection waits for its next request under the idle timeout
//!
//! Writes that make no progress for the write timeout fail. Any expired
//! deadline surfaces as an [`io::ErrorKind::TimedOut`] error, which makes
//! hyper close the connection.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::{sleep, Sleep};

/// Where a connection is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum Phase {
    Reading = 0,
    Handling = 1,
    Idle = 2,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Handling,
            2 => Self::Idle,
            _ => Self::Reading,
        }
    }
}

/// Phase shared between a connection's I/O and its request service.
///
/// Every transition bumps a generation counter so the I/O side can tell a
/// deadline armed in an earlier phase from the current one.
#[derive(Debug)]
pub(crate) struct ConnPhase {
    phase: AtomicU8,
    generation: AtomicU64,
}

impl ConnPhase {
    /// New connections start reading their first request.
    pub(crate) fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Reading as u8),
            generation: AtomicU64::new(0),
        }
    }

    pub(crate) fn get(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Moves an idle connection into `Reading`; other phases are left alone.
    pub(crate) fn enter_reading(&self) {
        if self
            .phase
            .compare_exchange(
                Phase::Idle as u8,
                Phase::Reading as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            self.generation.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

/// Deadlines applied by [`TimedIo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IoTimeouts {
    pub(crate) read: Duration,
    pub(crate) write: Duration,
    pub(crate) idle: Duration,
}

struct Deadline {
    generation: u64,
    sleep: Pin<Box<Sleep>>,
}

/// Stream wrapper enforcing [`IoTimeouts`].
pub(crate) struct TimedIo<S> {
    inner: S,
    timeouts: IoTimeouts,
    phase: Arc<ConnPhase>,
    read_deadline: Option<Deadline>,
    write_deadline: Option<Pin<Box<Sleep>>>,
}

impl<S> TimedIo<S> {
    pub(crate) fn new(inner: S, timeouts: IoTimeouts, phase: Arc<ConnPhase>) -> Self {
        Self {
            inner,
            timeouts,
            phase,
            read_deadline: None,
            write_deadline: None,
        }
    }

    /// Polls the read deadline for the current phase, arming it on first use.
    fn poll_read_deadline(&mut self, cx: &mut Context<'_>) -> Poll<io::Error> {
        let (limit, kind) = match self.phase.get() {
            Phase::Reading => (self.timeouts.read, "read"),
            Phase::Idle => (self.timeouts.idle, "idle"),
            Phase::Handling => {
                self.read_deadline = None;
                return Poll::Pending;
            }
        };

        let generation = self.phase.generation();
        if self
            .read_deadline
            .as_ref()
            .is_some_and(|d| d.generation != generation)
        {
            self.read_deadline = None;
        }
        let deadline = self.read_deadline.get_or_insert_with(|| Deadline {
            generation,
            sleep: Box::pin(sleep(limit)),
        });

        match deadline.sleep.as_mut().poll(cx) {
            Poll::Ready(()) => Poll::Ready(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connection {kind} timeout of {limit:?} elapsed"),
            )),
            Poll::Pending => Poll::Pending,
        }
    }

    /// Polls the write deadline, arming it when a write first stalls.
    fn poll_write_deadline(&mut self, cx: &mut Context<'_>) -> Poll<io::Error> {
        let limit = self.timeouts.write;
        let timer = self
            .write_deadline
            .get_or_insert_with(|| Box::pin(sleep(limit)));

        match timer.as_mut().poll(cx) {
            Poll::Ready(()) => Poll::Ready(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connection write timeout of {limit:?} elapsed"),
            )),
            Poll::Pending => Poll::Pending,
        }
    }

    fn on_write_poll<T>(
        &mut self,
        cx: &mut Context<'_>,
        poll: Poll<io::Result<T>>,
    ) -> Poll<io::Result<T>> {
        match poll {
            Poll::Ready(result) => {
                self.write_deadline = None;
                Poll::Ready(result)
            }
            Poll::Pending => match self.poll_write_deadline(cx) {
                Poll::Ready(err) => Poll::Ready(Err(err)),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for TimedIo<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();

        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                if buf.filled().len() > before {
                    this.phase.enter_reading();
                }
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => match this.poll_read_deadline(cx) {
                Poll::Ready(err) => Poll::Ready(Err(err)),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for TimedIo<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        this.on_write_poll(cx, poll)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write_vectored(cx, bufs);
        this.on_write_poll(cx, poll)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_flush(cx);
        this.on_write_poll(cx, poll)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
