//! One connection to a chat server, normally over TCP.
//!
//! Responsibilities:
//! - Resolve and connect (bounded retry, per-attempt timeout)
//! - Reader task: newline framing -> Dispatcher, in arrival order
//! - Writer: one frame at a time under an async mutex, sends run as spawned tasks
//! - Lifecycle: idempotent close that unparks the reader; fatal read errors
//!   and repeated write errors surface once as a connection-lost event
//!
//! A `Connection` value only exists once the socket is connected, so every
//! send happens after socket setup has completed.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use chatline_core::error::{ChatError, DecodeError, Result};
use chatline_core::protocol::{envelope, FrameCodec, InboundFrame, Message, TagStyle};

use crate::config::ConnectionSection;
use crate::dispatch::{Dispatcher, ResponseHandler};

/// Receives inbound traffic plus the connection-level failure event.
pub trait ConnectionHandler: ResponseHandler {
    /// The connection died on its own (read failure, peer close, repeated
    /// write failures). Not raised for an explicit [`Connection::close`].
    fn on_connection_lost(&self, err: ChatError);
}

type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;
type Writer = FramedWrite<BoxedWrite, FrameCodec>;

/// Handle to an open connection. Cheap to clone.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Shared>,
}

struct Shared {
    peer: String,
    writer: Mutex<Option<Writer>>,
    closed: AtomicBool,
    shutdown: CancellationToken,
    write_failures: AtomicU32,
    max_write_failures: u32,
    max_frame_bytes: usize,
    tag_style: TagStyle,
    handler: Arc<dyn ConnectionHandler>,
    runtime: Handle,
}

impl Connection {
    /// Resolve `address`, connect, and start the reader task.
    ///
    /// Host resolution and connect failures are returned here; nothing is
    /// spawned unless the socket is up.
    pub async fn open<H>(
        address: &str,
        port: u16,
        cfg: &ConnectionSection,
        tag_style: TagStyle,
        handler: Arc<H>,
    ) -> Result<Self>
    where
        H: ConnectionHandler + 'static,
    {
        let addrs = resolve(address, port).await?;
        let stream = connect(&addrs, cfg).await?;
        let peer = stream.peer_addr().map_err(ChatError::ConnectFailure)?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "set_nodelay failed");
        }

        let (rd, wr) = stream.into_split();
        let conn = Self::start(
            peer.to_string(),
            Box::new(rd),
            Box::new(wr),
            cfg,
            tag_style,
            handler,
            Handle::current(),
        );
        tracing::info!(%peer, "connected");
        Ok(conn)
    }

    /// Run a connection over an already established byte stream.
    ///
    /// `peer` only labels log output. Fails outside a tokio runtime.
    pub fn attach<R, W, H>(
        peer: impl Into<String>,
        reader: R,
        writer: W,
        cfg: &ConnectionSection,
        tag_style: TagStyle,
        handler: Arc<H>,
    ) -> Result<Self>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
        H: ConnectionHandler + 'static,
    {
        let runtime = Handle::try_current()
            .map_err(|e| ChatError::Internal(format!("connection needs a tokio runtime: {e}")))?;
        Ok(Self::start(
            peer.into(),
            Box::new(reader),
            Box::new(writer),
            cfg,
            tag_style,
            handler,
            runtime,
        ))
    }

    fn start<H>(
        peer: String,
        reader: BoxedRead,
        writer: BoxedWrite,
        cfg: &ConnectionSection,
        tag_style: TagStyle,
        handler: Arc<H>,
        runtime: Handle,
    ) -> Self
    where
        H: ConnectionHandler + 'static,
    {
        let codec = FrameCodec::new(cfg.max_frame_bytes);
        let span = tracing::info_span!("reader", peer = %peer);

        let inner = Arc::new(Shared {
            peer,
            writer: Mutex::new(Some(FramedWrite::new(writer, codec.clone()))),
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            write_failures: AtomicU32::new(0),
            max_write_failures: cfg.max_write_failures,
            max_frame_bytes: cfg.max_frame_bytes,
            tag_style,
            handler: handler.clone(),
            runtime,
        });

        let dispatcher = Dispatcher::new(handler);
        let frames = FramedRead::new(reader, codec);
        inner
            .runtime
            .spawn(read_loop(Arc::clone(&inner), frames, dispatcher).instrument(span));

        Self { inner }
    }

    /// Remote endpoint label (`ip:port` for TCP).
    pub fn peer(&self) -> &str {
        &self.inner.peer
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Resolves once the connection is closed, for any reason.
    pub async fn closed(&self) {
        self.inner.shutdown.cancelled().await
    }

    /// Schedule `message` and return immediately; `on_error` runs if the
    /// write fails.
    pub fn send<F>(&self, message: impl Into<Message>, on_error: F) -> JoinHandle<()>
    where
        F: FnOnce(ChatError) + Send + 'static,
    {
        self.send_with(message, on_error, None::<fn(Message)>)
    }

    /// Like [`send`](Self::send), also running `on_success` after the frame
    /// is flushed.
    pub fn send_with<F, S>(
        &self,
        message: impl Into<Message>,
        on_error: F,
        on_success: Option<S>,
    ) -> JoinHandle<()>
    where
        F: FnOnce(ChatError) + Send + 'static,
        S: FnOnce(Message) + Send + 'static,
    {
        let conn = self.clone();
        let message = message.into();
        self.inner.runtime.spawn(async move {
            match conn.write(&message).await {
                Ok(()) => {
                    if let Some(cb) = on_success {
                        cb(message);
                    }
                }
                Err(e) => on_error(e),
            }
        })
    }

    /// Encode and write one frame, waiting for the flush.
    pub async fn write(&self, message: &Message) -> Result<()> {
        if self.is_closed() {
            return Err(ChatError::ConnectionClosed);
        }
        let frame = Bytes::from(envelope::encode(message, self.inner.tag_style)?);
        // rejected here so it never counts as a write failure
        if frame.len() > self.inner.max_frame_bytes {
            return Err(ChatError::Encode(format!(
                "frame of {} bytes exceeds {}",
                frame.len(),
                self.inner.max_frame_bytes
            )));
        }

        let mut guard = self.inner.writer.lock().await;
        let writer = guard.as_mut().ok_or(ChatError::ConnectionClosed)?;

        match writer.send(frame).await {
            Ok(()) => {
                self.inner.write_failures.store(0, Ordering::Relaxed);
                tracing::trace!(kind = message.kind().tag(), "frame written");
                Ok(())
            }
            Err(e) => {
                // drop what is left of the failed frame so it is never replayed
                writer.write_buffer_mut().clear();
                drop(guard);
                let failures = self.inner.write_failures.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(peer = %self.inner.peer, failures, error = %e, "write failed");
                if failures >= self.inner.max_write_failures {
                    self.inner.lose(ChatError::WriteFailuresExceeded(failures));
                }
                Err(ChatError::WriteFailure(e))
            }
        }
    }

    /// Stop the reader, release the socket, and fail later sends.
    /// Idempotent; in-flight writes finish before the socket is shut down.
    pub fn close(&self) {
        if self.inner.mark_closed() {
            self.inner.shutdown.cancel();
            self.inner.release_writer();
            tracing::info!(peer = %self.inner.peer, "connection closed");
        }
    }
}

impl Shared {
    /// True for the caller that performed the open -> closed transition.
    fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    fn lose(self: &Arc<Self>, err: ChatError) {
        if !self.mark_closed() {
            return;
        }
        self.shutdown.cancel();
        self.release_writer();
        tracing::warn!(peer = %self.peer, error = %err, "connection lost");
        self.handler.on_connection_lost(err);
    }

    fn release_writer(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.runtime.spawn(async move {
            let taken = this.writer.lock().await.take();
            if let Some(mut w) = taken {
                if let Err(e) = w.close().await {
                    tracing::debug!(error = %e, "socket shutdown failed");
                }
            }
        });
    }
}

async fn read_loop(
    shared: Arc<Shared>,
    mut frames: FramedRead<BoxedRead, FrameCodec>,
    dispatcher: Dispatcher,
) {
    tracing::debug!("reader started");
    let max = frames.decoder().max_frame_bytes();

    let failure = loop {
        tokio::select! {
            biased;

            _ = shared.shutdown.cancelled() => break None,

            next = frames.next() => match next {
                Some(Ok(InboundFrame::Complete(frame))) => dispatcher.dispatch_frame(&frame),
                Some(Ok(InboundFrame::Oversized { len })) => {
                    tracing::warn!(len, max, "oversized frame discarded");
                    dispatcher.fail(&DecodeError::FrameTooLarge { len, max }, None);
                }
                Some(Err(e)) => break Some(ChatError::ReadFailure(e)),
                None => break Some(ChatError::ClosedByPeer),
            },
        }
    };

    if let Some(err) = failure {
        shared.lose(err);
    }
    tracing::debug!("reader stopped");
}

async fn resolve(address: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((address, port))
        .await
        .map_err(|e| ChatError::UnresolvedHost(format!("{address}: {e}")))?
        .collect();
    if addrs.is_empty() {
        return Err(ChatError::UnresolvedHost(format!("{address}: no addresses")));
    }
    Ok(addrs)
}

async fn connect(addrs: &[SocketAddr], cfg: &ConnectionSection) -> Result<TcpStream> {
    let mut backoff = cfg.connect_backoff();
    let mut last_err = None;

    for attempt in 1..=cfg.connect_attempts {
        for addr in addrs {
            tracing::debug!(%addr, attempt, "connecting");
            match timeout(cfg.connect_timeout(), TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(e)) => {
                    tracing::warn!(%addr, attempt, error = %e, "connect failed");
                    last_err = Some(ChatError::ConnectFailure(e));
                }
                Err(_) => {
                    tracing::warn!(%addr, attempt, "connect timed out");
                    last_err = Some(ChatError::ConnectTimeout(cfg.connect_timeout_ms));
                }
            }
        }
        if attempt < cfg.connect_attempts {
            sleep(backoff).await;
            backoff = backoff.saturating_mul(2);
        }
    }

    Err(last_err.unwrap_or_else(|| ChatError::Internal("no connect attempt made".into())))
}
