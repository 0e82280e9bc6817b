//! Session state machine.
//!
//! ```text
//! Idle --login--> Connecting --connected--> Connected --LoginRequest--> LoginPending
//!   ^                 |                                                     |
//!   |            connect failed                            LoginResponse(own name)
//!   |                 v                                                     v
//!   +------------- Idle <------- close / connection lost ------------- LoggedIn
//! ```
//!
//! Every connection attempt gets a fresh epoch. Events tagged with an old
//! epoch (a reader still draining after close, a connect that finished after
//! the user gave up) are dropped.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::runtime::Handle;

use chatline_core::error::{ChatError, ErrorCode, Result};
use chatline_core::protocol::{
    ChatMessageRequest, ChatMessageResponse, LoginRequest, LoginResponse, ServerErrorMessage,
    Timestamp,
};

use crate::config::ClientConfig;
use crate::dispatch::ResponseHandler;
use crate::session::SessionListener;
use crate::transport::{Connection, ConnectionHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Connecting,
    Connected,
    LoginPending,
    LoggedIn,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Connecting => "connecting",
            Phase::Connected => "connected",
            Phase::LoginPending => "login pending",
            Phase::LoggedIn => "logged in",
        };
        f.write_str(s)
    }
}

struct State {
    phase: Phase,
    username: Option<String>,
    conn: Option<Connection>,
    epoch: u64,
}

impl State {
    /// Back to `Idle`, handing out the connection for the caller to close.
    fn reset(&mut self) -> Option<Connection> {
        self.phase = Phase::Idle;
        self.username = None;
        self.conn.take()
    }
}

struct Inner {
    cfg: ClientConfig,
    listener: Arc<dyn SessionListener>,
    runtime: Handle,
    state: Mutex<State>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Tear down epoch `epoch` after a transport failure and report it.
    fn fail(&self, epoch: u64, detail: String) {
        let conn = {
            let mut st = self.state();
            if st.epoch != epoch || st.phase == Phase::Idle {
                return;
            }
            // frames still draining from the dying connection are stale now
            st.epoch += 1;
            st.reset()
        };
        if let Some(c) = conn {
            c.close();
        }
        tracing::warn!(epoch, %detail, "session dropped to idle");
        self.listener.on_error(None, &detail);
        self.listener.on_disconnected(&detail);
    }
}

/// A chat client session. Owns at most one connection at a time.
///
/// Must be created inside a tokio runtime; the methods themselves are
/// synchronous and may be called from any thread.
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    pub fn new(cfg: ClientConfig, listener: Arc<dyn SessionListener>) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| ChatError::Internal(format!("session needs a tokio runtime: {e}")))?;
        Ok(Self {
            inner: Arc::new(Inner {
                cfg,
                listener,
                runtime,
                state: Mutex::new(State {
                    phase: Phase::Idle,
                    username: None,
                    conn: None,
                    epoch: 0,
                }),
            }),
        })
    }

    pub fn phase(&self) -> Phase {
        self.inner.state().phase
    }

    pub fn username(&self) -> Option<String> {
        self.inner.state().username.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.phase() == Phase::LoggedIn
    }

    /// Connect to `address:port` and log in as `username`.
    ///
    /// Returns as soon as the attempt is scheduled. The outcome arrives via
    /// [`SessionListener::on_logged_in`] or [`SessionListener::on_error`].
    /// `Err(Rejected)` means nothing was attempted and the phase is unchanged.
    pub fn login(&self, address: &str, port: &str, username: &str) -> Result<()> {
        let min = self.inner.cfg.session.min_username_len;
        if username.chars().count() < min {
            return Err(ChatError::Rejected(format!(
                "username must be at least {min} characters"
            )));
        }
        let port: u16 = match port.trim().parse() {
            Ok(p) if p != 0 => p,
            _ => return Err(ChatError::Rejected(format!("invalid port: {port:?}"))),
        };

        let epoch = {
            let mut st = self.inner.state();
            if st.phase != Phase::Idle {
                return Err(ChatError::Rejected(format!("cannot log in while {}", st.phase)));
            }
            st.epoch += 1;
            st.phase = Phase::Connecting;
            st.username = Some(username.to_string());
            st.epoch
        };

        tracing::info!(%address, port, %username, epoch, "logging in");

        let inner = Arc::clone(&self.inner);
        let address = address.to_string();
        let username = username.to_string();
        self.inner.runtime.spawn(async move {
            let link = Arc::new(SessionLink {
                session: Arc::downgrade(&inner),
                epoch,
            });
            let opened = Connection::open(
                &address,
                port,
                &inner.cfg.connection,
                inner.cfg.session.tag_style(),
                link,
            )
            .await;
            connected(&inner, epoch, &address, port, username, opened);
        });
        Ok(())
    }

    /// Send a chat line as the logged-in user.
    ///
    /// `Err(Rejected)` unless logged in; nothing is written in that case.
    pub fn send_message(&self, content: &str) -> Result<()> {
        if content.is_empty() {
            return Err(ChatError::Rejected("empty message".into()));
        }

        let (conn, username, epoch) = {
            let st = self.inner.state();
            match (st.phase, &st.conn, &st.username) {
                (Phase::LoggedIn, Some(conn), Some(name)) => (conn.clone(), name.clone(), st.epoch),
                (phase, _, _) => {
                    return Err(ChatError::Rejected(format!("cannot send while {phase}")));
                }
            }
        };

        let request = ChatMessageRequest::new(Timestamp::now(), username, content);
        let inner = Arc::downgrade(&self.inner);
        conn.send(request, move |err| {
            if let Some(inner) = inner.upgrade() {
                if inner.state().epoch == epoch {
                    inner
                        .listener
                        .on_error(None, &format!("message not sent: {err}"));
                }
            }
        });
        Ok(())
    }

    /// Drop to `Idle` and close the connection. Idempotent.
    pub fn close(&self) {
        let conn = {
            let mut st = self.inner.state();
            if st.phase == Phase::Idle {
                return;
            }
            st.epoch += 1;
            st.reset()
        };
        if let Some(c) = conn {
            c.close();
        }
        tracing::info!("session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Finish a connect attempt started by [`Session::login`].
fn connected(
    inner: &Arc<Inner>,
    epoch: u64,
    address: &str,
    port: u16,
    username: String,
    opened: Result<Connection>,
) {
    let conn = match opened {
        Ok(conn) => conn,
        Err(e) => {
            inner.fail(epoch, format!("could not connect to {address}:{port}: {e}"));
            return;
        }
    };

    {
        let mut st = inner.state();
        if st.epoch != epoch || st.phase != Phase::Connecting {
            drop(st);
            tracing::debug!(epoch, "connect finished after session moved on");
            conn.close();
            return;
        }
        st.phase = Phase::Connected;
        st.conn = Some(conn.clone());
    }

    let weak = Arc::downgrade(inner);
    conn.send(LoginRequest::new(username), move |err| {
        if let Some(inner) = weak.upgrade() {
            inner.fail(epoch, format!("login request failed: {err}"));
        }
    });

    let mut st = inner.state();
    if st.epoch == epoch && st.phase == Phase::Connected {
        st.phase = Phase::LoginPending;
        tracing::debug!(epoch, state = ?st.phase, "login request queued");
    }
}

/// Per-connection bridge from transport events into the session.
struct SessionLink {
    session: Weak<Inner>,
    epoch: u64,
}

impl SessionLink {
    fn session(&self) -> Option<Arc<Inner>> {
        self.session.upgrade()
    }

    /// Current phase, if this link still belongs to the live epoch.
    fn current(&self, inner: &Inner) -> Option<Phase> {
        let st = inner.state();
        (st.epoch == self.epoch).then_some(st.phase)
    }
}

impl ResponseHandler for SessionLink {
    fn on_login(&self, msg: LoginResponse) {
        let Some(inner) = self.session() else { return };

        let joined_self = {
            let mut st = inner.state();
            if st.epoch != self.epoch {
                return;
            }
            let own = st.username.as_deref() == Some(msg.joining_username.as_str());
            match (st.phase, own) {
                // a fast reply can beat the Connected -> LoginPending step
                (Phase::LoginPending | Phase::Connected, true) => {
                    st.phase = Phase::LoggedIn;
                    true
                }
                (Phase::LoggedIn, false) => false,
                (phase, _) => {
                    tracing::debug!(%phase, joining = %msg.joining_username, "login response ignored");
                    return;
                }
            }
        };

        if joined_self {
            tracing::info!(username = %msg.joining_username, "logged in");
            inner.listener.on_logged_in(&msg.joining_username, msg.sent_at);
        } else {
            inner.listener.on_user_joined(&msg.joining_username, msg.sent_at);
        }
    }

    fn on_message(&self, msg: ChatMessageResponse) {
        let Some(inner) = self.session() else { return };
        match self.current(&inner) {
            Some(Phase::LoggedIn) => {
                inner.listener.on_message(&msg.originator, &msg.content, msg.sent_at)
            }
            Some(phase) => tracing::debug!(%phase, "chat message before login ignored"),
            None => {}
        }
    }

    fn on_server_error(&self, msg: ServerErrorMessage) {
        let Some(inner) = self.session() else { return };
        if self.current(&inner).is_some() {
            tracing::warn!(code = %msg.code, message = %msg.message, "server error");
            inner.listener.on_error(Some(msg.code), &msg.message);
        }
    }

    fn on_decode_error(&self, code: ErrorCode, detail: String) {
        let Some(inner) = self.session() else { return };
        if self.current(&inner).is_some() {
            inner.listener.on_error(Some(code), &detail);
        }
    }
}

impl ConnectionHandler for SessionLink {
    fn on_connection_lost(&self, err: ChatError) {
        if let Some(inner) = self.session() {
            inner.fail(self.epoch, format!("connection lost: {err}"));
        }
    }
}
