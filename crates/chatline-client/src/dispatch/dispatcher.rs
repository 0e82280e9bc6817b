use std::sync::Arc;

use chatline_core::error::{DecodeError, ErrorCode};
use chatline_core::protocol::{
    envelope, ChatMessageResponse, LoginResponse, Message, ServerErrorMessage,
};

/// Longest frame excerpt quoted in a decode-failure detail.
const DETAIL_PREVIEW_BYTES: usize = 256;

/// Typed handlers for inbound traffic.
///
/// Called synchronously on the connection's reader task, never on a UI
/// thread. Implementations that feed a UI marshal to it themselves.
pub trait ResponseHandler: Send + Sync {
    fn on_login(&self, msg: LoginResponse);
    fn on_message(&self, msg: ChatMessageResponse);
    fn on_server_error(&self, msg: ServerErrorMessage);
    /// A frame could not be decoded; the connection stays open.
    fn on_decode_error(&self, code: ErrorCode, detail: String);
}

/// Everything a client can receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Login(LoginResponse),
    Message(ChatMessageResponse),
    ServerError(ServerErrorMessage),
}

impl TryFrom<Message> for Response {
    type Error = DecodeError;

    fn try_from(msg: Message) -> Result<Self, Self::Error> {
        match msg {
            Message::LoginResponse(m) => Ok(Response::Login(m)),
            Message::ChatMessageResponse(m) => Ok(Response::Message(m)),
            Message::ServerError(m) => Ok(Response::ServerError(m)),
            // requests never flow server -> client
            other @ (Message::LoginRequest(_) | Message::ChatMessageRequest(_)) => {
                Err(DecodeError::UnknownType(other.kind().tag().to_string()))
            }
        }
    }
}

/// Decode one frame, keeping only response variants.
pub fn decode_response(frame: &[u8]) -> Result<Response, DecodeError> {
    let env = envelope::Envelope::peek(frame)?;
    match env.kind()? {
        k if !k.is_response() => Err(DecodeError::UnknownType(k.tag().to_string())),
        _ => Response::try_from(env.open()?),
    }
}

/// Routes decoded frames to exactly one handler method.
#[derive(Clone)]
pub struct Dispatcher {
    handler: Arc<dyn ResponseHandler>,
}

impl Dispatcher {
    pub fn new(handler: Arc<dyn ResponseHandler>) -> Self {
        Self { handler }
    }

    /// Decode `frame` and route it, or report the decode failure.
    pub fn dispatch_frame(&self, frame: &[u8]) {
        match decode_response(frame) {
            Ok(resp) => self.dispatch(resp),
            Err(e) => {
                tracing::debug!(error = %e, "inbound frame rejected");
                self.fail(&e, Some(frame));
            }
        }
    }

    pub fn dispatch(&self, resp: Response) {
        match resp {
            Response::Login(m) => self.handler.on_login(m),
            Response::Message(m) => self.handler.on_message(m),
            Response::ServerError(m) => self.handler.on_server_error(m),
        }
    }

    /// Report a failure that never produced a response.
    pub fn fail(&self, err: &DecodeError, frame: Option<&[u8]>) {
        let detail = match frame {
            Some(f) => format!("{err} (frame={})", preview(f)),
            None => err.to_string(),
        };
        self.handler.on_decode_error(err.error_code(), detail);
    }
}

fn preview(frame: &[u8]) -> String {
    let cut = frame.len().min(DETAIL_PREVIEW_BYTES);
    let mut s = String::from_utf8_lossy(frame.get(..cut).unwrap_or_default()).into_owned();
    if frame.len() > cut {
        s.push_str("...");
    }
    s
}
