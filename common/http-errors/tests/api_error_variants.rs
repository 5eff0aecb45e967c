use axum::http::StatusCode;
use axum::response::IntoResponse;
use common_http_errors::ApiError;
use uuid::Uuid;

#[test]
fn unauthorized_variant() {
    let err = ApiError::Unauthorized {
        code: "invalid_credentials",
        trace_id: None,
        message: None,
    };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.headers().get("X-Error-Code").unwrap(),
        "invalid_credentials"
    );
}

#[test]
fn forbidden_missing_role_variant() {
    let err = ApiError::missing_role("admin, manager", None);
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "missing_role");
}

#[test]
fn forbidden_variant() {
    let err = ApiError::Forbidden { trace_id: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "forbidden");
}

#[test]
fn bad_request_variant() {
    let err = ApiError::bad_request("invalid_filter", None);
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.headers().get("X-Error-Code").unwrap(),
        "invalid_filter"
    );
}

#[test]
fn not_found_variant() {
    let err = ApiError::NotFound {
        code: "product_not_found",
        trace_id: None,
    };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        resp.headers().get("X-Error-Code").unwrap(),
        "product_not_found"
    );
}

#[test]
fn conflict_variant() {
    let err = ApiError::Conflict {
        code: "cnpj_in_use",
        trace_id: None,
        message: None,
    };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "cnpj_in_use");
}

#[test]
fn internal_variant() {
    let trace = Some(Uuid::new_v4());
    let err = ApiError::Internal {
        trace_id: trace,
        message: Some("boom".into()),
    };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        resp.headers().get("X-Error-Code").unwrap(),
        "internal_error"
    );
}
