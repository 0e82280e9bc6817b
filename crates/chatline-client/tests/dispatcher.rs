#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};

use chatline_client::dispatch::{decode_response, Dispatcher, Response, ResponseHandler};
use chatline_core::error::{DecodeError, ErrorCode};
use chatline_core::protocol::{
    encode, ChatMessageRequest, ChatMessageResponse, LoginRequest, LoginResponse, Message,
    ServerErrorMessage, TagStyle, Timestamp,
};

#[derive(Debug, PartialEq)]
enum Call {
    Login(String),
    Message(String, String),
    ServerError(ErrorCode, String),
    Decode(ErrorCode, String),
}

#[derive(Default)]
struct Calls(Mutex<Vec<Call>>);

impl Calls {
    fn take(&self) -> Vec<Call> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl ResponseHandler for Calls {
    fn on_login(&self, msg: LoginResponse) {
        self.0.lock().unwrap().push(Call::Login(msg.joining_username));
    }
    fn on_message(&self, msg: ChatMessageResponse) {
        self.0
            .lock()
            .unwrap()
            .push(Call::Message(msg.originator, msg.content));
    }
    fn on_server_error(&self, msg: ServerErrorMessage) {
        self.0
            .lock()
            .unwrap()
            .push(Call::ServerError(msg.code, msg.message));
    }
    fn on_decode_error(&self, code: ErrorCode, detail: String) {
        self.0.lock().unwrap().push(Call::Decode(code, detail));
    }
}

fn setup() -> (Arc<Calls>, Dispatcher) {
    let calls = Arc::new(Calls::default());
    let dispatcher = Dispatcher::new(calls.clone());
    (calls, dispatcher)
}

fn wire(msg: impl Into<Message>, style: TagStyle) -> Vec<u8> {
    encode(&msg.into(), style).unwrap()
}

#[test]
fn each_response_kind_routes_to_one_handler() {
    let (calls, d) = setup();
    let now = Timestamp::now();

    d.dispatch_frame(&wire(LoginResponse::new(now, "alice"), TagStyle::Canonical));
    d.dispatch_frame(&wire(
        ChatMessageResponse::new(now, "bob", "hello"),
        TagStyle::Canonical,
    ));
    d.dispatch_frame(&wire(
        ServerErrorMessage::new(now, ErrorCode::UserNameInUse, "name taken"),
        TagStyle::Canonical,
    ));

    assert_eq!(
        calls.take(),
        vec![
            Call::Login("alice".into()),
            Call::Message("bob".into(), "hello".into()),
            Call::ServerError(ErrorCode::UserNameInUse, "name taken".into()),
        ]
    );
}

#[test]
fn legacy_tags_route_like_canonical_ones() {
    let (calls, d) = setup();
    d.dispatch_frame(&wire(
        ChatMessageResponse::new(Timestamp::now(), "carol", "hi"),
        TagStyle::Legacy,
    ));
    assert_eq!(calls.take(), vec![Call::Message("carol".into(), "hi".into())]);
}

#[test]
fn missing_type_reports_no_type() {
    let (calls, d) = setup();
    d.dispatch_frame(br#"{"object":{"sender":"@server"}}"#);

    let seen = calls.take();
    assert_eq!(seen.len(), 1);
    match &seen[0] {
        Call::Decode(code, detail) => {
            assert_eq!(*code, ErrorCode::MalformedRequestNoType);
            assert!(detail.contains("@server"), "detail should quote the frame: {detail}");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn unknown_type_reports_unknown_type() {
    let (calls, d) = setup();
    d.dispatch_frame(br#"{"type":"Shrug","object":{}}"#);
    assert!(matches!(
        calls.take().as_slice(),
        [Call::Decode(ErrorCode::MalformedRequestUnknownType, _)]
    ));
}

#[test]
fn request_tags_are_not_responses() {
    let (calls, d) = setup();
    d.dispatch_frame(&wire(LoginRequest::new("mallory"), TagStyle::Canonical));
    d.dispatch_frame(&wire(
        ChatMessageRequest::new(Timestamp::now(), "mallory", "x"),
        TagStyle::Canonical,
    ));

    let seen = calls.take();
    assert_eq!(seen.len(), 2);
    assert!(seen
        .iter()
        .all(|c| matches!(c, Call::Decode(ErrorCode::MalformedRequestUnknownType, _))));
}

#[test]
fn bad_object_and_missing_object() {
    let (calls, d) = setup();
    d.dispatch_frame(br#"{"type":"ChatMessageResponse","object":{"sender":"@server"}}"#);
    d.dispatch_frame(br#"{"type":"ChatMessageResponse"}"#);
    d.dispatch_frame(b"not json at all");

    let codes: Vec<ErrorCode> = calls
        .take()
        .into_iter()
        .map(|c| match c {
            Call::Decode(code, _) => code,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(
        codes,
        vec![
            ErrorCode::MalformedRequestBadObjectDef,
            ErrorCode::MalformedRequestNoObj,
            ErrorCode::MalformedRequestUnknown,
        ]
    );
}

#[test]
fn decode_response_filters_requests() {
    let frame = wire(LoginRequest::new("alice"), TagStyle::Canonical);
    assert!(matches!(
        decode_response(&frame),
        Err(DecodeError::UnknownType(_))
    ));

    let frame = wire(
        LoginResponse::new(Timestamp::now(), "alice"),
        TagStyle::Canonical,
    );
    match decode_response(&frame).unwrap() {
        Response::Login(m) => assert_eq!(m.joining_username, "alice"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn fail_without_frame_uses_error_text() {
    let (calls, d) = setup();
    d.fail(&DecodeError::FrameTooLarge { len: 9000, max: 256 }, None);
    match calls.take().as_slice() {
        [Call::Decode(ErrorCode::MalformedRequestUnknown, detail)] => {
            assert!(detail.contains("9000"))
        }
        other => panic!("unexpected {other:?}"),
    }
}
