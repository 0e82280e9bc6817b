use chatline_core::error::ErrorCode;
use chatline_core::protocol::Timestamp;

/// Application callbacks raised by a [`Session`](super::Session).
///
/// Invoked from runtime tasks (the connection reader or a send task), never
/// while the session lock is held, so implementations may call back into
/// the session.
pub trait SessionListener: Send + Sync {
    /// The server confirmed our login.
    fn on_logged_in(&self, username: &str, at: Timestamp);

    /// A chat line relayed by the server, including our own.
    fn on_message(&self, originator: &str, content: &str, at: Timestamp);

    /// `code` is set for protocol and server errors, `None` for transport
    /// and connect failures.
    fn on_error(&self, code: Option<ErrorCode>, detail: &str);

    /// Another user joined while we are logged in.
    fn on_user_joined(&self, _username: &str, _at: Timestamp) {}

    /// The session fell back to `Idle` on its own: the connect failed or the
    /// connection was lost. Follows the matching `on_error(None, ..)`.
    /// Not raised for [`Session::close`](super::Session::close) or for a
    /// single failed send.
    fn on_disconnected(&self, _detail: &str) {}
}
