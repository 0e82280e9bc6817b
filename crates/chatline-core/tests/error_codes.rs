//! ErrorCode table tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use chatline_core::{ChatError, DecodeError, ErrorCode};

#[test]
fn table_is_authoritative() {
    let table = [
        ("INVALID_REQUEST_FROM_CLIENT", 50),
        ("USER_NAME_IN_USE", 1),
        ("INVALID_USER_NAME", 2),
        ("MALFORMED_REQUEST_UNKNOWN", 200),
        ("MALFORMED_REQUEST_NO_TYPE", 201),
        ("MALFORMED_REQUEST_UNKNOWN_TYPE", 202),
        ("MALFORMED_REQUEST_BAD_OBJECT_DEF", 203),
        ("MALFORMED_REQUEST_NO_OBJ", 210),
    ];
    for (name, code) in table {
        let by_code = ErrorCode::from_code(i64::from(code)).unwrap();
        assert_eq!(by_code.name(), name);
        assert_eq!(ErrorCode::from_name(name), Some(by_code));
        assert_eq!(by_code.code(), code);
    }
}

#[test]
fn from_code_succeeds_only_for_known_codes() {
    let known: Vec<i64> = ErrorCode::ALL.iter().map(|c| i64::from(c.code())).collect();
    for code in -16..=1024i64 {
        assert_eq!(ErrorCode::from_code(code).is_ok(), known.contains(&code), "code={code}");
    }
    assert_eq!(ErrorCode::from_code(999), Err(DecodeError::UnknownErrorCode(999)));
    assert_eq!(ErrorCode::from_code(0), Err(DecodeError::UnknownErrorCode(0)));
}

#[test]
fn codes_outside_u16_are_unknown_not_truncated() {
    for code in [-1, 70_000, 65_536 + 50, i64::from(u16::MAX) + 1, i64::MIN, i64::MAX] {
        assert_eq!(ErrorCode::from_code(code), Err(DecodeError::UnknownErrorCode(code)));
    }
}

#[test]
fn transport_errors_carry_no_code() {
    let e = ChatError::ReadFailure(std::io::Error::other("reset"));
    assert!(e.is_transport());
    assert_eq!(e.error_code(), None);

    let e = ChatError::from(DecodeError::NoType);
    assert!(!e.is_transport());
    assert_eq!(e.error_code(), Some(ErrorCode::MalformedRequestNoType));

    let e = ChatError::Server { code: ErrorCode::UserNameInUse, message: "taken".into() };
    assert_eq!(e.error_code(), Some(ErrorCode::UserNameInUse));
}
