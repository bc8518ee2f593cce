//! Common test utilities for wwks-link integration tests
//!
//! Provides a scripted fake robot controller and helpers for waiting on
//! client events without blocking the runtime.

#![allow(dead_code)]

use crossbeam_channel::Receiver;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wwks_link::{
    ChannelObserver, ClientConfig, ClientEvent, ConnectionError, ConnectionState,
    HandshakeMode, HandshakeTimings, PickupClient,
};

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

pub const WAIT: Duration = Duration::from_secs(5);

/// Wrap a body in a WWKS envelope
pub fn envelope(body: &str) -> String {
    format!("<WWKS Version=\"2.0\" TimeStamp=\"2024-01-01T12:00:00Z\">{}</WWKS>", body)
}

/// Configuration with handshake waits long enough to stay out of the way
pub fn quiet_config() -> ClientConfig {
    ClientConfig::default().with_handshake(HandshakeMode::FixedDelay(HandshakeTimings {
        hello_delay: Duration::from_secs(30),
        status_delay: Duration::from_secs(30),
        stock_delay: Duration::from_secs(30),
    }))
}

/// Client wired to a channel observer
pub fn client_with_events(config: ClientConfig) -> (PickupClient, Events) {
    let (observer, rx) = ChannelObserver::new();
    let client = PickupClient::new(config, Arc::new(observer)).unwrap();
    (client, Events::new(rx))
}

/// A fake robot controller listening on an ephemeral localhost port
pub struct FakeRobot {
    listener: TcpListener,
    pub addr: SocketAddr,
}

impl FakeRobot {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        Self { listener, addr }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> i32 {
        self.addr.port() as i32
    }

    /// Accept the next terminal connection
    pub async fn accept(&self) -> RobotConnection {
        let (stream, _) = tokio::time::timeout(WAIT, self.listener.accept())
            .await
            .expect("terminal did not connect")
            .unwrap();
        RobotConnection::new(stream)
    }

    pub fn into_listener(self) -> TcpListener {
        self.listener
    }
}

/// A port nothing listens on
pub async fn refused_port() -> i32 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port as i32
}

/// Robot side of one connection
pub struct RobotConnection {
    stream: TcpStream,
    pending: Vec<u8>,
}

impl RobotConnection {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            pending: Vec::new(),
        }
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    /// Send one envelope, newline-terminated as the robot does
    pub async fn send(&mut self, message: &str) {
        self.send_raw(format!("{}\n", message).as_bytes()).await;
    }

    /// Send without caring whether the terminal is still there
    pub async fn try_send(&mut self, message: &str) -> bool {
        self.stream
            .write_all(format!("{}\n", message).as_bytes())
            .await
            .is_ok()
    }

    /// Next newline-terminated line from the terminal, without the newline
    pub async fn recv_line(&mut self, timeout: Duration) -> Option<String> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=pos).collect();
                return Some(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
            }

            let remaining = deadline.checked_duration_since(Instant::now())?;
            let mut buf = [0u8; 4096];
            match tokio::time::timeout(remaining, self.stream.read(&mut buf)).await {
                Ok(Ok(0)) | Ok(Err(_)) | Err(_) => return None,
                Ok(Ok(n)) => self.pending.extend_from_slice(&buf[..n]),
            }
        }
    }

    /// Skip lines until one contains `<kind`
    pub async fn recv_kind(&mut self, kind: &str, timeout: Duration) -> Option<String> {
        let deadline = Instant::now() + timeout;
        let needle = format!("<{}", kind);
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let line = self.recv_line(remaining).await?;
            verbose_println!("robot received: {}", line);
            if line.contains(&needle) {
                return Some(line);
            }
        }
    }

    /// Whether the terminal has closed its side
    pub async fn is_closed_by_peer(&mut self, timeout: Duration) -> bool {
        let mut buf = [0u8; 4096];
        let deadline = Instant::now() + timeout;
        loop {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            match tokio::time::timeout(remaining, self.stream.read(&mut buf)).await {
                Ok(Ok(0)) | Ok(Err(_)) => return true,
                Ok(Ok(_)) => continue,
                Err(_) => return false,
            }
        }
    }
}

/// Events collected from a [`ChannelObserver`]
pub struct Events {
    rx: Receiver<ClientEvent>,
    pub seen: Vec<ClientEvent>,
}

impl Events {
    pub fn new(rx: Receiver<ClientEvent>) -> Self {
        Self { rx, seen: Vec::new() }
    }

    /// Pull everything currently queued
    pub fn drain(&mut self) -> Vec<ClientEvent> {
        let fresh: Vec<ClientEvent> = self.rx.try_iter().collect();
        self.seen.extend(fresh.iter().cloned());
        fresh
    }

    /// Wait for the first event matching `pred`
    pub async fn wait_for<F>(&mut self, timeout: Duration, pred: F) -> Option<ClientEvent>
    where
        F: Fn(&ClientEvent) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            while let Ok(event) = self.rx.try_recv() {
                self.seen.push(event.clone());
                if pred(&event) {
                    return Some(event);
                }
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Wait for a state change to `state`, returning its error and description
    pub async fn wait_for_state(
        &mut self,
        state: ConnectionState,
        timeout: Duration,
    ) -> Option<(ConnectionError, String)> {
        match self
            .wait_for(timeout, |e| matches!(e, ClientEvent::StateChanged { state: s, .. } if *s == state))
            .await?
        {
            ClientEvent::StateChanged { error, description, .. } => Some((error, description)),
            _ => None,
        }
    }

    /// Wait for an inbound message of `kind`
    pub async fn wait_for_message(&mut self, kind: &str, timeout: Duration) -> Option<String> {
        match self
            .wait_for(timeout, |e| matches!(e, ClientEvent::Message { kind: k, .. } if k == kind))
            .await?
        {
            ClientEvent::Message { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// Raw bodies of every message seen so far, in order
    pub fn messages(&self) -> Vec<(String, String)> {
        self.seen
            .iter()
            .filter_map(|e| match e {
                ClientEvent::Message { kind, raw } => Some((kind.clone(), raw.clone())),
                _ => None,
            })
            .collect()
    }

    /// States reported so far, in order
    pub fn states(&self) -> Vec<ConnectionState> {
        self.seen
            .iter()
            .filter_map(|e| match e {
                ClientEvent::StateChanged { state, .. } => Some(*state),
                _ => None,
            })
            .collect()
    }
}
