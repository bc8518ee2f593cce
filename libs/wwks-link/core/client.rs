use crate::core::config::ClientConfig;
use crate::core::connection_state::{ConnectionError, ConnectionState, NetworkConnectionState};
use crate::core::dispatch::Dispatcher;
use crate::core::envelope::{self, MessageKind};
use crate::core::framer::MessageFramer;
use crate::core::handshake::{HandshakeOutcome, HandshakeSequencer, HandshakeSnapshot, HandshakeStep};
use crate::core::reporter::Reporter;
use crate::core::session::Session;
use crate::core::validation::{self, strip_illegal_characters};
use crate::manager::{PollingHandle, PollingOutcome, ReconnectSupervisor};
use crate::traits::*;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpSocket, TcpStream};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Persistent link between a terminal and a robot controller
///
/// Owns at most one TCP connection at a time. Each successful
/// [`connect`](Self::connect) spawns:
///
/// - a receive loop that frames the byte stream, answers keepalive pings
///   inline and hands every other message to the dispatcher
/// - a handshake task sending `HelloRequest`, `StatusRequest` and
///   `StockInfoRequest`
///
/// The handle is cheap to clone; clones share the same connection.
/// Dropping the last handle does not close the socket; call
/// [`close`](Self::close).
#[derive(Clone)]
pub struct PickupClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    reporter: Reporter,
    keepalive: Arc<dyn KeepaliveResponder>,
    /// Bounded state updates only, never held across an await
    link: Mutex<LinkState>,
    /// Held for the whole of each write
    writer: AsyncMutex<Option<OwnedWriteHalf>>,
    /// Serialises connect and close
    lifecycle: AsyncMutex<()>,
    polling: Mutex<Option<PollingHandle>>,
    next_session: AtomicU64,
}

struct LinkState {
    state: ConnectionState,
    last_error: ConnectionError,
    network: NetworkConnectionState,
    session: Option<Arc<Session>>,
    receive_task: Option<JoinHandle<()>>,
    handshake_task: Option<JoinHandle<HandshakeOutcome>>,
}

/// Why a receive loop ended
enum LoopEnd {
    Stopped,
    Stale,
    PeerClosed,
    Failed(std::io::Error),
    Overflow(usize),
}

impl PickupClient {
    /// Create a client with the WWKS keepalive responder
    pub fn new(config: ClientConfig, observer: Arc<dyn ConnectionObserver>) -> Result<Self> {
        crate::core::builder::PickupClientBuilder::new()
            .config(config)
            .observer(observer)
            .build()
    }

    pub(crate) fn from_parts(
        config: ClientConfig,
        observer: Arc<dyn ConnectionObserver>,
        keepalive: Arc<dyn KeepaliveResponder>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                reporter: Reporter::new(observer),
                keepalive,
                link: Mutex::new(LinkState {
                    state: ConnectionState::NotConnected,
                    last_error: ConnectionError::None,
                    network: NetworkConnectionState::ReadyToConnect,
                    session: None,
                    receive_task: None,
                    handshake_task: None,
                }),
                writer: AsyncMutex::new(None),
                lifecycle: AsyncMutex::new(()),
                polling: Mutex::new(None),
                next_session: AtomicU64::new(0),
            }),
        }
    }

    pub fn is_valid_ip_address(host: &str) -> bool {
        validation::is_valid_ip_address(host)
    }

    pub fn is_valid_port(port: i32) -> bool {
        validation::is_valid_port(port)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Connect to the robot, replacing any existing connection
    ///
    /// Returns `false` on an invalid endpoint (nothing else happens) or when
    /// the connection cannot be opened (reported as `Failed`).
    pub async fn connect(&self, host: &str, port: i32) -> bool {
        self.try_connect(host, port).await.is_ok()
    }

    /// [`connect`](Self::connect) with the failure reason
    pub async fn try_connect(&self, host: &str, port: i32) -> Result<()> {
        let addr = validation::socket_addr(host, port).inspect_err(|e| {
            self.inner.reporter.warn(&format!("Connect rejected: {}", e));
        })?;

        let _lifecycle = self.inner.lifecycle.lock().await;
        self.teardown().await;

        self.set_state(
            ConnectionState::Attempting,
            ConnectionError::None,
            &format!("Connecting to {}:{}", host, port),
        );

        let stream = match self.open_socket(addr).await {
            Ok(stream) => stream,
            Err(e) => {
                let description = match &e {
                    LinkError::ConnectFailed { reason, .. } => reason.clone(),
                    other => other.to_string(),
                };
                self.inner.reporter.warn(&description);
                self.set_state(ConnectionState::Failed, e.classify(), &description);
                return Err(e);
            }
        };

        let (reader, writer) = stream.into_split();
        *self.inner.writer.lock().await = Some(writer);

        let session_id = self.inner.next_session.fetch_add(1, Ordering::Relaxed) + 1;
        let session = Arc::new(Session::new(session_id));
        self.inner.link.lock().session = Some(Arc::clone(&session));

        self.set_network_state(NetworkConnectionState::StayAlive);
        self.set_state(
            ConnectionState::Connected,
            ConnectionError::None,
            "Connected successfully",
        );

        let receive_task = tokio::spawn(self.clone().receive_loop(Arc::clone(&session), reader));
        let handshake = HandshakeSequencer::new(
            Arc::new(self.clone()),
            session,
            self.inner.config.identity.clone(),
            self.inner.config.handshake,
            self.inner.reporter.clone(),
        );
        let handshake_task = tokio::spawn(handshake.run());

        let mut link = self.inner.link.lock();
        link.receive_task = Some(receive_task);
        link.handshake_task = Some(handshake_task);
        Ok(())
    }

    async fn open_socket(&self, addr: SocketAddr) -> Result<TcpStream> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(|e| LinkError::ConnectFailed {
            error: ConnectionError::Other,
            reason: format!("Failed to create socket: {}", e),
        })?;

        socket.set_keepalive(true).map_err(|e| LinkError::ConnectFailed {
            error: ConnectionError::Other,
            reason: format!("Failed to enable TCP keepalive: {}", e),
        })?;

        match tokio::time::timeout(self.inner.config.connect_timeout, socket.connect(addr)).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("Failed to set TCP_NODELAY: {}", e);
                }
                Ok(stream)
            }
            Ok(Err(e)) => Err(LinkError::ConnectFailed {
                error: ConnectionError::from_io(&e),
                reason: format!("Connection to {} failed: {}", addr, e),
            }),
            Err(_) => Err(LinkError::ConnectFailed {
                error: ConnectionError::Timeout,
                reason: format!(
                    "Connection to {} timed out after {:?}",
                    addr, self.inner.config.connect_timeout
                ),
            }),
        }
    }

    /// Send one message
    ///
    /// Control characters other than tab, LF and CR are removed and a
    /// newline is appended. Concurrent senders never interleave on the wire.
    pub async fn send_message(&self, text: &str) -> bool {
        match self.write(text).await {
            Ok(()) => true,
            Err(LinkError::NotConnected) => {
                debug!("Send skipped: not connected");
                false
            }
            Err(e) => {
                self.inner.reporter.warn(&format!("Send failed: {}", e));
                false
            }
        }
    }

    async fn write(&self, text: &str) -> Result<()> {
        let session = self
            .inner
            .link
            .lock()
            .session
            .clone()
            .ok_or(LinkError::NotConnected)?;

        // A write blocked on a peer that stopped reading holds the writer;
        // the session stop releases it so teardown can proceed
        let mut writer = tokio::select! {
            biased;
            _ = session.stopped() => return Err(LinkError::NotConnected),
            writer = self.inner.writer.lock() => writer,
        };
        let stream = writer.as_mut().ok_or(LinkError::NotConnected)?;

        self.inner
            .reporter
            .debug(&format!(">>> OUTGOING MESSAGE >>>\n{}", text));

        let mut payload = strip_illegal_characters(text);
        if payload.is_empty() {
            return Err(LinkError::EmptyMessage);
        }
        payload.push('\n');

        tokio::select! {
            biased;
            _ = session.stopped() => Err(LinkError::NotConnected),
            written = stream.write_all(payload.as_bytes()) => Ok(written?),
        }
    }

    /// Stop polling, close the socket and wait for every connection task
    ///
    /// No callback fires after this returns. Calling it again is a no-op.
    pub async fn close(&self) {
        self.stop_polling().await;
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.teardown().await;
    }

    /// Tear down the current connection, if any. Caller holds `lifecycle`.
    async fn teardown(&self) {
        let (session, receive_task, handshake_task) = {
            let mut link = self.inner.link.lock();
            (
                link.session.take(),
                link.receive_task.take(),
                link.handshake_task.take(),
            )
        };

        if let Some(task) = handshake_task {
            task.abort();
            let _ = task.await;
        }

        let initiated = session.as_ref().is_some_and(|s| s.stop());
        if initiated {
            self.record_state(ConnectionState::NotConnected, ConnectionError::None);
            self.shutdown_writer().await;
        }

        if let Some(task) = receive_task {
            if let Err(e) = task.await {
                error!("Receive loop failed: {}", e);
            }
        }

        if initiated {
            self.inner.reporter.state_changed(
                ConnectionState::NotConnected,
                ConnectionError::None,
                "Connection closed",
            );
        }
    }

    async fn shutdown_writer(&self) {
        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!("Socket shutdown: {}", e);
            }
        }
    }

    async fn receive_loop(self, session: Arc<Session>, mut reader: OwnedReadHalf) {
        let config = &self.inner.config;
        let reporter = &self.inner.reporter;

        let mut framer = MessageFramer::new(&config.delimiter).with_limit(config.max_buffered_bytes);
        let mut dispatcher = Dispatcher::start(config.dispatch, reporter, session.id());
        let mut buf = vec![0u8; config.read_buffer_size];
        let mut consecutive_timeouts = 0u32;

        debug!("Receive loop started for session {}", session.id());

        let end = loop {
            let read = tokio::select! {
                _ = session.stopped() => break LoopEnd::Stopped,
                read = tokio::time::timeout(config.read_timeout, reader.read(&mut buf)) => read,
            };

            match read {
                Err(_) => {
                    consecutive_timeouts += 1;
                    if consecutive_timeouts >= config.max_consecutive_timeouts {
                        break LoopEnd::Stale;
                    }
                    debug!(
                        "No data for {:?} ({}/{})",
                        config.read_timeout, consecutive_timeouts, config.max_consecutive_timeouts
                    );
                }
                Ok(Ok(0)) => break LoopEnd::PeerClosed,
                Ok(Err(e)) => break LoopEnd::Failed(e),
                Ok(Ok(n)) => {
                    consecutive_timeouts = 0;
                    for message in framer.push(&buf[..n]) {
                        self.handle_message(&session, &mut dispatcher, message).await;
                    }
                    if framer.exceeds_limit() {
                        break LoopEnd::Overflow(framer.limit().unwrap_or_default());
                    }
                }
            }

            if !session.is_running() {
                break LoopEnd::Stopped;
            }
        };

        // Whoever stops the session first reports the disconnect
        let lost = if session.stop() {
            let description = match &end {
                LoopEnd::Stopped => "Connection stopped".to_string(),
                LoopEnd::Stale => format!(
                    "Connection lost: No data received for {:?}",
                    config.stale_after()
                ),
                LoopEnd::PeerClosed => "Connection closed by server".to_string(),
                LoopEnd::Failed(e) => {
                    format!("Socket error ({}): {}", ConnectionError::from_io(e), e)
                }
                LoopEnd::Overflow(limit) => LinkError::BufferOverflow { limit: *limit }.to_string(),
            };
            reporter.warn(&description);

            self.release_session(&session, ConnectionError::ConnectionReset);
            self.shutdown_writer().await;
            self.transition_network(NetworkConnectionState::IssueTerminate);
            Some(description)
        } else {
            None
        };

        dispatcher.dispatch(String::new(), String::new());
        dispatcher.finish().await;
        debug!("Receive loop finished for session {}", session.id());

        if let Some(description) = lost {
            reporter.state_changed(
                ConnectionState::NotConnected,
                ConnectionError::ConnectionReset,
                &description,
            );
        }
    }

    async fn handle_message(&self, session: &Session, dispatcher: &mut Dispatcher, message: String) {
        let reporter = &self.inner.reporter;
        reporter.debug(&format!("<<< INCOMING MESSAGE <<<\n{}", message));

        if self.inner.keepalive.is_ping(&message) {
            match self.inner.keepalive.pong_response(&message) {
                Some(reply) => {
                    reporter.info("[KEEPALIVE] Received KeepAliveRequest from server, sending KeepAliveResponse");
                    if let Err(e) = self.write(&reply).await {
                        reporter.warn(&format!("[KEEPALIVE] Failed to send KeepAliveResponse: {}", e));
                    }
                }
                None => reporter.warn("[KEEPALIVE] KeepAliveRequest without Id/Source/Destination ignored"),
            }
            return;
        }

        let kind = envelope::message_kind(&message).unwrap_or_default().to_string();
        if let Some(step) = session.progress().record(&MessageKind::from_name(&kind)) {
            if step == HandshakeStep::StockInfo {
                reporter.info("[HANDSHAKE] Received StockInfoResponse, handshake complete!");
            } else {
                reporter.info(&format!("[HANDSHAKE] Received {}", step.response_name()));
            }
        }

        dispatcher.dispatch(kind, message);
    }

    /// Drop the ended session and mark the link down in one step
    fn release_session(&self, session: &Arc<Session>, error: ConnectionError) {
        let mut link = self.inner.link.lock();
        if link.session.as_ref().is_some_and(|s| Arc::ptr_eq(s, session)) {
            link.session = None;
        }
        link.state = ConnectionState::NotConnected;
        link.last_error = error;
    }

    /// Update the state without notifying the observer
    fn record_state(&self, state: ConnectionState, error: ConnectionError) {
        let mut link = self.inner.link.lock();
        link.state = state;
        link.last_error = error;
    }

    fn set_state(&self, state: ConnectionState, error: ConnectionError, description: &str) {
        self.record_state(state, error);
        self.inner.reporter.state_changed(state, error, description);
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.inner.link.lock().state == ConnectionState::Connected
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.link.lock().state
    }

    pub fn last_error(&self) -> ConnectionError {
        self.inner.link.lock().last_error
    }

    pub fn network_state(&self) -> NetworkConnectionState {
        self.inner.link.lock().network
    }

    /// Set the coarse network state
    ///
    /// This is the only way out of `PausedWaitingForUser`.
    pub fn set_network_state(&self, state: NetworkConnectionState) {
        self.inner.link.lock().network = state;
        self.inner
            .reporter
            .info(&format!("[STATE MACHINE] Network state changed to: {}", state.label()));
    }

    /// Automatic transition; never leaves `PausedWaitingForUser`
    fn transition_network(&self, state: NetworkConnectionState) {
        let changed = {
            let mut link = self.inner.link.lock();
            if link.network == NetworkConnectionState::PausedWaitingForUser {
                false
            } else {
                link.network = state;
                true
            }
        };
        if changed {
            self.inner
                .reporter
                .info(&format!("[STATE MACHINE] Network state changed to: {}", state.label()));
        }
    }

    /// Handshake flags of the current connection
    pub fn handshake_progress(&self) -> HandshakeSnapshot {
        self.inner
            .link
            .lock()
            .session
            .as_ref()
            .map(|s| s.progress().snapshot())
            .unwrap_or_default()
    }

    pub fn is_handshake_complete(&self) -> bool {
        self.handshake_progress().complete
    }

    /// Start the reconnect supervisor for `host:port`
    ///
    /// Refused for an invalid endpoint or while the network state is
    /// `PausedWaitingForUser`. A supervisor already running is stopped first.
    pub async fn start_polling(&self, host: &str, port: i32) -> bool {
        if !Self::is_valid_ip_address(host) || !Self::is_valid_port(port) {
            self.inner
                .reporter
                .warn(&format!("Polling rejected: invalid endpoint {}:{}", host, port));
            return false;
        }
        if self.network_state() == NetworkConnectionState::PausedWaitingForUser {
            self.inner.reporter.warn(
                "Polling refused: waiting for user (reset network state to ReadyToConnect first)",
            );
            return false;
        }

        self.stop_polling().await;

        let config = &self.inner.config;
        let strategy = FixedDelay::new(config.reconnect_interval, Some(config.max_reconnect_attempts));
        let handle = ReconnectSupervisor::new(Arc::new(self.clone()), host, port, Box::new(strategy))
            .with_poll_interval(config.stop_poll_interval)
            .spawn();

        let previous = self.inner.polling.lock().replace(handle);
        if let Some(previous) = previous {
            previous.stop().await;
        }
        true
    }

    /// Stop the reconnect supervisor and wait for it to exit
    pub async fn stop_polling(&self) -> Option<PollingOutcome> {
        let handle = self.inner.polling.lock().take();
        match handle {
            Some(handle) => handle.stop().await,
            None => None,
        }
    }

    /// Wait for the reconnect supervisor to finish on its own
    pub async fn wait_polling(&self) -> Option<PollingOutcome> {
        let handle = self.inner.polling.lock().take();
        match handle {
            Some(handle) => handle.join().await,
            None => None,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.inner
            .polling
            .lock()
            .as_ref()
            .is_some_and(|handle| handle.is_active())
    }
}

#[async_trait]
impl MessageSink for PickupClient {
    async fn send_message(&self, text: &str) -> bool {
        PickupClient::send_message(self, text).await
    }
}

#[async_trait]
impl Reconnectable for PickupClient {
    fn is_connected(&self) -> bool {
        PickupClient::is_connected(self)
    }

    async fn connect(&self, host: &str, port: i32) -> bool {
        PickupClient::connect(self, host, port).await
    }

    fn on_exhausted(&self, attempts: usize) {
        self.inner.reporter.warn(&format!(
            "Giving up after {} attempts, setting network state to {}",
            attempts,
            NetworkConnectionState::PausedWaitingForUser.label()
        ));
        self.set_network_state(NetworkConnectionState::PausedWaitingForUser);
    }

    fn log(&self, text: &str) {
        self.inner.reporter.info(text);
    }
}
