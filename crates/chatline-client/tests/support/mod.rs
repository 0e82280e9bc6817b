//! Loopback server and recording handlers shared by the client tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use chatline_client::dispatch::ResponseHandler;
use chatline_client::transport::ConnectionHandler;
use chatline_client::SessionListener;
use chatline_core::error::{ChatError, ErrorCode};
use chatline_core::protocol::{
    self, ChatMessageResponse, LoginResponse, Message, ServerErrorMessage, TagStyle, Timestamp,
};

pub const WAIT: Duration = Duration::from_secs(5);

pub async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Server side of one accepted connection.
pub struct Peer {
    pub lines: Lines<BufReader<OwnedReadHalf>>,
    pub out: OwnedWriteHalf,
}

impl Peer {
    pub async fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = tokio::time::timeout(WAIT, listener.accept())
            .await
            .expect("no client connected")
            .unwrap();
        let (rd, wr) = stream.into_split();
        Self {
            lines: BufReader::new(rd).lines(),
            out: wr,
        }
    }

    /// Next line from the client, decoded.
    pub async fn recv(&mut self) -> Message {
        let line = self.recv_line().await.expect("client closed");
        protocol::decode(line.as_bytes()).unwrap()
    }

    pub async fn recv_line(&mut self) -> Option<String> {
        tokio::time::timeout(WAIT, self.lines.next_line())
            .await
            .expect("timed out waiting for client line")
            .unwrap()
    }

    pub async fn send(&mut self, msg: impl Into<Message>) {
        self.out.write_all(&frame(msg)).await.unwrap();
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.out.write_all(bytes).await.unwrap();
    }
}

/// One newline-terminated canonical frame.
pub fn frame(msg: impl Into<Message>) -> Vec<u8> {
    let mut out = protocol::encode(&msg.into(), TagStyle::Canonical).unwrap();
    out.push(b'\n');
    out
}

pub fn login_response(name: &str) -> LoginResponse {
    LoginResponse::new(Timestamp::now(), name)
}

pub fn chat_response(originator: &str, content: &str) -> ChatMessageResponse {
    ChatMessageResponse::new(Timestamp::now(), originator, content)
}

/// What a connection handler observed.
#[derive(Debug, PartialEq)]
pub enum Seen {
    Login(String),
    Message(String, String),
    ServerError(ErrorCode, String),
    Decode(ErrorCode),
    Lost(String),
}

pub struct ConnRecorder {
    tx: mpsc::UnboundedSender<Seen>,
}

impl ConnRecorder {
    pub fn recording() -> (Arc<Self>, mpsc::UnboundedReceiver<Seen>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl ResponseHandler for ConnRecorder {
    fn on_login(&self, msg: LoginResponse) {
        let _ = self.tx.send(Seen::Login(msg.joining_username));
    }
    fn on_message(&self, msg: ChatMessageResponse) {
        let _ = self.tx.send(Seen::Message(msg.originator, msg.content));
    }
    fn on_server_error(&self, msg: ServerErrorMessage) {
        let _ = self.tx.send(Seen::ServerError(msg.code, msg.message));
    }
    fn on_decode_error(&self, code: ErrorCode, _detail: String) {
        let _ = self.tx.send(Seen::Decode(code));
    }
}

impl ConnectionHandler for ConnRecorder {
    fn on_connection_lost(&self, err: ChatError) {
        let _ = self.tx.send(Seen::Lost(err.to_string()));
    }
}

/// What a session listener observed.
#[derive(Debug, PartialEq)]
pub enum Event {
    LoggedIn(String),
    Message(String, String),
    Error(Option<ErrorCode>, String),
    Joined(String),
    Disconnected,
}

pub struct SessionRecorder {
    tx: mpsc::UnboundedSender<Event>,
}

impl SessionRecorder {
    pub fn recording() -> (Arc<Self>, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl SessionListener for SessionRecorder {
    fn on_logged_in(&self, username: &str, _at: Timestamp) {
        let _ = self.tx.send(Event::LoggedIn(username.to_string()));
    }
    fn on_message(&self, originator: &str, content: &str, _at: Timestamp) {
        let _ = self
            .tx
            .send(Event::Message(originator.to_string(), content.to_string()));
    }
    fn on_error(&self, code: Option<ErrorCode>, detail: &str) {
        let _ = self.tx.send(Event::Error(code, detail.to_string()));
    }
    fn on_user_joined(&self, username: &str, _at: Timestamp) {
        let _ = self.tx.send(Event::Joined(username.to_string()));
    }
    fn on_disconnected(&self, _detail: &str) {
        let _ = self.tx.send(Event::Disconnected);
    }
}

pub async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Asserts nothing arrives within a short grace period.
pub async fn quiet<T: std::fmt::Debug>(rx: &mut mpsc::UnboundedReceiver<T>) {
    if let Ok(Some(ev)) = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
        panic!("unexpected event: {ev:?}");
    }
}
