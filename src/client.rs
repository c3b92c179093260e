//! Client builder and connection runtime.
//!
//! The [`ClientBuilder`] provides a fluent API for configuring timeouts and
//! limits before connecting. A connected [`GbxClient`] owns three tasks:
//! 1. a read loop that splits the socket into frames and routes them,
//! 2. the writer task (see [`crate::writer`]),
//! 3. the callback router (see [`crate::callbacks`]).
//!
//! ```text
//!                     ┌────────────┐  response  ┌──────────────┐
//!  TCP ─► read loop ──┤ handle bit ├───────────►│ PendingCalls │──► call()
//!                     └─────┬──────┘            └──────────────┘
//!                           │ callback
//!                           ▼
//!                     router task ──► listeners (in order)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use gbxremote::GbxClient;
//!
//! #[tokio::main]
//! async fn main() -> gbxremote::Result<()> {
//!     let client = GbxClient::connect("127.0.0.1", 5000).await?;
//!     client.authenticate("SuperAdmin", "SuperAdmin").await?;
//!
//!     let ratio: f64 = client.call("GetCallVoteRatio", ()).await?;
//!     println!("vote ratio: {ratio}");
//!
//!     client.close();
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::callbacks::{spawn_router, AnyListener, CallbackRegistry, Notification, TypedListener};
use crate::codec::xml::{self, MethodResponse};
use crate::codec::{from_value, Params};
use crate::dispatcher::{PendingCalls, PendingGuard};
use crate::error::{GbxError, Result};
use crate::fault::Fault;
use crate::protocol::{read_greeting, Frame, FrameBuffer, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_MAX_PAYLOAD_SIZE};
use crate::value::Value;
use crate::writer::{spawn_writer_task, OutboundFrame, WriterHandle, DEFAULT_CHANNEL_CAPACITY};

/// Size of the socket read buffer.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Lifecycle of a connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Handshaking,
    Connected,
    Closed,
}

/// Settings applied when a connection is established.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Time allowed for the server greeting.
    pub handshake_timeout: Duration,
    /// Deadline applied to every [`GbxClient::call`]; `None` waits forever.
    pub call_timeout: Option<Duration>,
    /// Capacity of the outgoing frame queue.
    pub channel_capacity: usize,
    /// Largest payload accepted in either direction.
    pub max_payload_size: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            call_timeout: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

/// Builder for configuring and connecting a [`GbxClient`].
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time allowed for the server greeting.
    ///
    /// Default: 5 seconds
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Apply a deadline to every `call` made through the client.
    ///
    /// Default: none
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = Some(timeout);
        self
    }

    /// Set the writer channel capacity.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Set the largest frame payload accepted in either direction.
    ///
    /// Default: 4 MiB
    pub fn max_payload_size(mut self, size: u32) -> Self {
        self.config.max_payload_size = size;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connect to `host:port` and perform the handshake.
    pub async fn connect(self, host: &str, port: u16) -> Result<GbxClient> {
        self.connect_addr((host, port)).await
    }

    pub async fn connect_addr<A: ToSocketAddrs>(self, addr: A) -> Result<GbxClient> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        tracing::debug!(peer = ?stream.peer_addr().ok(), "tcp connected");
        GbxClient::from_stream(stream, self.config).await
    }

    /// Perform the handshake over an already established stream.
    pub async fn from_stream<S>(self, stream: S) -> Result<GbxClient>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        GbxClient::from_stream(stream, self.config).await
    }
}

/// State shared between the client handles and the read loop.
struct Shared {
    pending: PendingCalls,
    state: watch::Sender<ConnectionState>,
}

impl Shared {
    /// Move to `Closed` and fail every pending call. Idempotent.
    fn close(&self) -> usize {
        self.state.send_replace(ConnectionState::Closed);
        self.pending.close()
    }
}

struct Inner {
    shared: Arc<Shared>,
    callbacks: Arc<CallbackRegistry>,
    writer: WriterHandle,
    call_timeout: Option<Duration>,
    max_payload_size: u32,
}

impl Inner {
    /// Send one call and wait for its response value.
    async fn invoke(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let payload = xml::write_method_call(method, &params);
        if payload.len() > self.max_payload_size as usize {
            return Err(GbxError::Protocol(format!(
                "Call to {method} is {} bytes, above the {} byte limit",
                payload.len(),
                self.max_payload_size
            )));
        }

        let (handle, rx) = self.shared.pending.register()?;
        let mut guard = PendingGuard::new(&self.shared.pending, handle);

        tracing::trace!(handle, method, "sending call");
        self.writer
            .send(OutboundFrame::new(handle, Bytes::from(payload)))
            .await?;

        let completion = rx.await.map_err(|_| GbxError::ConnectionClosed)?;
        guard.disarm();

        match completion? {
            MethodResponse::Success(value) => Ok(value),
            MethodResponse::Fault(value) => {
                let fault = Fault::from_value(value)?;
                tracing::debug!(handle, method, code = fault.code, "call faulted");
                Err(fault.into())
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// A connected GBXRemote client.
///
/// Cheap to clone; every clone shares the same connection. The connection
/// closes when [`close`](Self::close) is called, the server goes away, or the
/// last clone is dropped.
#[derive(Clone)]
pub struct GbxClient {
    inner: Arc<Inner>,
}

impl GbxClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Connect to `host:port` with default settings.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        ClientBuilder::new().connect(host, port).await
    }

    /// Handshake over `stream` and start the connection tasks.
    pub async fn from_stream<S>(mut stream: S, config: ClientConfig) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        state_tx.send_replace(ConnectionState::Handshaking);

        if let Err(e) = read_greeting(&mut stream, config.handshake_timeout).await {
            state_tx.send_replace(ConnectionState::Closed);
            tracing::debug!(error = %e, "handshake failed");
            return Err(e);
        }
        tracing::debug!("handshake complete");

        let (reader, write_half) = tokio::io::split(stream);
        let (writer, writer_task) = spawn_writer_task(write_half, config.channel_capacity);

        let callbacks = Arc::new(CallbackRegistry::new());
        let (notifications, _router) = spawn_router(callbacks.clone());

        let shared = Arc::new(Shared {
            pending: PendingCalls::new(),
            state: state_tx,
        });
        shared.state.send_replace(ConnectionState::Connected);
        let state_rx = shared.state.subscribe();

        tokio::spawn(read_loop(
            reader,
            shared.clone(),
            state_rx,
            notifications,
            writer_task,
            config.max_payload_size,
        ));

        Ok(Self {
            inner: Arc::new(Inner {
                shared,
                callbacks,
                writer,
                call_timeout: config.call_timeout,
                max_payload_size: config.max_payload_size,
            }),
        })
    }

    /// Call `method` and decode its result into `R`.
    ///
    /// The builder's `call_timeout`, if any, applies.
    pub async fn call<R, P>(&self, method: &str, params: P) -> Result<R>
    where
        R: DeserializeOwned,
        P: Params,
    {
        from_value(self.call_value(method, params).await?)
    }

    /// Like [`call`](Self::call) with an explicit deadline.
    ///
    /// On expiry the call is unregistered and fails with
    /// [`GbxError::Timeout`]; a response arriving later is discarded.
    pub async fn call_timeout<R, P>(&self, method: &str, params: P, timeout: Duration) -> Result<R>
    where
        R: DeserializeOwned,
        P: Params,
    {
        let params = params.into_params()?;
        from_value(self.invoke_within(method, params, Some(timeout)).await?)
    }

    /// Call `method` and return the raw result value.
    pub async fn call_value<P: Params>(&self, method: &str, params: P) -> Result<Value> {
        let params = params.into_params()?;
        self.invoke_within(method, params, self.inner.call_timeout)
            .await
    }

    async fn invoke_within(
        &self,
        method: &str,
        params: Vec<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let call = self.inner.invoke(method, params);
        match timeout {
            None => call.await,
            Some(timeout) => tokio::time::timeout(timeout, call).await.map_err(|_| {
                tracing::debug!(method, ?timeout, "call timed out");
                GbxError::Timeout {
                    method: method.to_string(),
                    timeout,
                }
            })?,
        }
    }

    /// Register a listener for the callback `name`.
    ///
    /// The callback's parameter list is decoded into `T` positionally, so
    /// `T` can be a tuple or a struct with fields in parameter order.
    /// Listeners must not hold the last clone of this client, or the
    /// connection stays open until [`close`](Self::close) is called.
    ///
    /// Listeners run one callback at a time. A listener future that never
    /// resolves blocks every later callback, and the unbounded queue behind
    /// it grows for as long as the server keeps sending.
    pub fn on<T, F, Fut>(&self, name: &str, handler: F)
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.inner
            .callbacks
            .register(name, Arc::new(TypedListener::new(handler)));
    }

    /// Register a listener that sees every callback, after the named ones.
    pub fn on_any<F, Fut>(&self, handler: F)
    where
        F: Fn(Notification) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.inner
            .callbacks
            .register_any(Arc::new(AnyListener::new(handler)));
    }

    /// Close the connection. Every pending call fails with
    /// `ConnectionClosed`. Idempotent.
    pub fn close(&self) {
        let failed = self.inner.shared.close();
        tracing::debug!(failed, "connection closed by client");
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.shared.state.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    /// Resolves once the connection reaches [`ConnectionState::Closed`].
    pub async fn closed(&self) {
        let mut state = self.inner.shared.state.subscribe();
        let _ = state.wait_for(|s| *s == ConnectionState::Closed).await;
    }

    /// Number of calls still waiting for a response.
    pub fn pending_calls(&self) -> usize {
        self.inner.shared.pending.len()
    }
}

impl std::fmt::Debug for GbxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GbxClient")
            .field("state", &self.state())
            .field("pending_calls", &self.pending_calls())
            .finish()
    }
}

/// Read frames until EOF, a fatal error, the writer stopping, or `close()`.
async fn read_loop<R>(
    mut reader: R,
    shared: Arc<Shared>,
    mut state: watch::Receiver<ConnectionState>,
    notifications: mpsc::UnboundedSender<Notification>,
    mut writer_task: JoinHandle<Result<()>>,
    max_payload_size: u32,
) where
    R: AsyncRead + Unpin,
{
    let mut frame_buffer = FrameBuffer::with_max_payload(max_payload_size);
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    let outcome: Result<()> = loop {
        tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) => break Ok(()),
                Ok(n) => match frame_buffer.push(&buf[..n]) {
                    Ok(frames) => {
                        for frame in frames {
                            route_frame(frame, &shared, &notifications);
                        }
                    }
                    Err(e) => break Err(e),
                },
                Err(e) => break Err(e.into()),
            },
            joined = &mut writer_task => {
                break match joined {
                    Ok(result) => result,
                    Err(e) => Err(GbxError::Protocol(format!("writer task failed: {e}"))),
                };
            }
            changed = state.changed() => {
                let closed = *state.borrow() == ConnectionState::Closed;
                if changed.is_err() || closed {
                    break Ok(());
                }
            }
        }
    };

    match &outcome {
        Ok(()) => tracing::debug!("read loop finished"),
        Err(e) => tracing::error!(error = %e, "read loop terminated"),
    }

    writer_task.abort();
    let failed = shared.close();
    if failed > 0 {
        tracing::debug!(failed, "pending calls failed on close");
    }
    // Dropping `notifications` lets the router drain and stop.
}

fn route_frame(frame: Frame, shared: &Shared, notifications: &mpsc::UnboundedSender<Notification>) {
    let handle = frame.handle();
    tracing::trace!(handle, len = frame.payload.len(), "frame received");

    if frame.is_callback() {
        match xml::parse_method_call(frame.payload()) {
            Ok(call) => {
                let _ = notifications.send(Notification::new(call.name, call.params));
            }
            Err(e) => tracing::warn!(handle, error = %e, "dropping unparseable callback"),
        }
        return;
    }

    if !shared.pending.contains(handle) {
        tracing::debug!(handle, "discarding response with no pending call");
        return;
    }
    let completion = xml::parse_method_response(frame.payload());
    if !shared.pending.complete(handle, completion) {
        tracing::debug!(handle, "discarding late response");
    }
}
