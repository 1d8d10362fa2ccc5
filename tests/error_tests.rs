// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use ironpath_session::error::AppError;

#[test]
fn test_status_codes() {
    let cases = [
        (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
        (AppError::NotFound("x".to_string()), StatusCode::NOT_FOUND),
        (AppError::BadRequest("x".to_string()), StatusCode::BAD_REQUEST),
        (AppError::NoActiveSession, StatusCode::CONFLICT),
        (AppError::Superseded, StatusCode::CONFLICT),
        (
            AppError::OutOfRange {
                what: "sets",
                index: 4,
                len: 2,
            },
            StatusCode::NOT_FOUND,
        ),
        (AppError::Database("x".to_string()), StatusCode::BAD_GATEWAY),
        (
            AppError::Cache("x".to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (err, expected) in cases {
        assert_eq!(err.into_response().status(), expected);
    }
}

#[test]
fn test_out_of_range_message() {
    let err = AppError::OutOfRange {
        what: "exercises",
        index: 3,
        len: 1,
    };
    assert_eq!(
        err.to_string(),
        "Index 3 out of range for exercises (length 1)"
    );
}
