use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use hypertext::prelude::*;

use crate::{template::Page, widgets::alert::ErrorAlert};

pub fn see_other_ok(r: Redirect) -> StandardResponse {
    Ok(SuccessResponse::SeeOther(Box::new(r)))
}

pub fn err_not_found() -> StandardResponse {
    Err(FailureResponse::NotFound(()))
}

pub fn bad_request(html: Rendered<String>) -> StandardResponse {
    Err(FailureResponse::BadRequest(html))
}

pub fn success(html: Rendered<String>) -> StandardResponse {
    Ok(SuccessResponse::Success(html))
}

pub fn unauthorized() -> StandardResponse {
    Err(FailureResponse::Unauthorized(()))
}

/// Renders a full page containing a single error message. Used for the
/// bodies of 400 and 409 responses.
pub fn error_page(msg: &str) -> Rendered<String> {
    Page::new()
        .body(maud! {
            div class="container py-4" {
                ErrorAlert msg=(msg);
            }
        })
        .render()
}

pub type StandardResponse = Result<SuccessResponse, FailureResponse>;

pub enum SuccessResponse {
    Success(Rendered<String>),
    SeeOther(Box<Redirect>),
}

impl IntoResponse for SuccessResponse {
    fn into_response(self) -> Response {
        match self {
            SuccessResponse::Success(html) => {
                Html(html.into_inner()).into_response()
            }
            SuccessResponse::SeeOther(redirect) => redirect.into_response(),
        }
    }
}

#[derive(Debug)]
pub enum FailureResponse {
    BadRequest(Rendered<String>),
    Unauthorized(()),
    Forbidden(()),
    NotFound(()),
    Conflict(Rendered<String>),
    ServerError(()),
}

impl IntoResponse for FailureResponse {
    fn into_response(self) -> Response {
        match self {
            FailureResponse::BadRequest(html) => {
                (StatusCode::BAD_REQUEST, Html(html.into_inner()))
                    .into_response()
            }
            FailureResponse::Unauthorized(()) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
            }
            FailureResponse::Forbidden(()) => {
                (StatusCode::FORBIDDEN, "Forbidden").into_response()
            }
            FailureResponse::NotFound(()) => {
                (StatusCode::NOT_FOUND, "Not found").into_response()
            }
            FailureResponse::Conflict(html) => {
                (StatusCode::CONFLICT, Html(html.into_inner())).into_response()
            }
            FailureResponse::ServerError(()) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
                    .into_response()
            }
        }
    }
}

impl From<diesel::result::Error> for FailureResponse {
    fn from(e: diesel::result::Error) -> Self {
        tracing::error!("database error: {e}");
        FailureResponse::ServerError(())
    }
}

impl From<tokio::task::JoinError> for FailureResponse {
    fn from(e: tokio::task::JoinError) -> Self {
        tracing::error!("blocking task failed: {e}");
        FailureResponse::ServerError(())
    }
}
