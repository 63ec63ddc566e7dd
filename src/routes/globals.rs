use serde::{Deserialize, Serialize};
use warp::http::StatusCode;

use db::models::{User, UserKind};
use db::WorkflowError;

#[derive(Serialize)]
pub struct FailureResponse {
    status: &'static str,
    code: ErrorCode,
}

impl FailureResponse {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            status: "error",
            code,
        }
    }

    pub fn new_reply(code: ErrorCode) -> warp::reply::Json {
        warp::reply::json(&Self::new(code))
    }
}

#[derive(Serialize)]
pub enum ErrorCode {
    InvalidCredentials,
    InsufficientAuthorization,
    MalformedData,
    MissingField,
    EmailAlreadyRegistered,
    AccountRecordMissing,
    InvalidRole,
    InvalidID,
    InvalidStatus,
    ConfirmationRequired,
    MethodNotAllowed,
    NotFound,
    InternalServerError,
}

#[derive(Serialize)]
pub struct SimpleSuccessResponse {
    status: &'static str,
}

impl SimpleSuccessResponse {
    pub fn new() -> Self {
        Self { status: "success" }
    }
}

#[derive(Deserialize, Debug)]
pub struct PaginatedQueryableListRequest {
    pub query: Option<String>,
    pub page: Option<usize>,
}

impl PaginatedQueryableListRequest {
    /// Checks that the page number is valid, and if its not it returns 1
    pub fn normalized_page_number(&self) -> usize {
        self.page
            .map(|v| if v >= 1 { v } else { 1 })
            .unwrap_or(1usize)
    }
}

/// Body of every destructive endpoint: the caller has to confirm explicitly
/// before the change is applied.
#[derive(Deserialize)]
pub struct Confirmation {
    #[serde(default)]
    pub confirm: bool,
}

pub fn confirmation_required() -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        FailureResponse::new_reply(ErrorCode::ConfirmationRequired),
        StatusCode::BAD_REQUEST,
    )
}

/// One place to turn a store-side workflow failure into the uniform failure
/// envelope.
pub fn workflow_failure(err: WorkflowError) -> warp::reply::WithStatus<warp::reply::Json> {
    use WorkflowError::*;

    let (code, status) = match err {
        MissingField(_) => (ErrorCode::MissingField, StatusCode::BAD_REQUEST),
        InvalidStatus => (ErrorCode::InvalidStatus, StatusCode::BAD_REQUEST),
        UnknownId | UnknownTeacher => (ErrorCode::InvalidID, StatusCode::BAD_REQUEST),
        NotOwner | NotPending => (
            ErrorCode::InsufficientAuthorization,
            StatusCode::FORBIDDEN,
        ),
    };

    warp::reply::with_status(FailureResponse::new_reply(code), status)
}

/// Session account as it is echoed back to clients: the role-specific
/// attributes only appear for the role that has them.
#[derive(Serialize)]
pub struct AccountResponse<'a> {
    pub uid: u32,
    pub name: &'a str,
    pub email: &'a str,
    pub role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
}

impl<'a> AccountResponse<'a> {
    pub fn from_user(user: &'a User) -> Self {
        let mut response = Self {
            uid: user.uid,
            name: &user.name,
            email: &user.email,
            role: user.role().as_str(),
            department: None,
            subject: None,
            status: None,
        };

        match &user.kind {
            UserKind::Admin => {}
            UserKind::Teacher(profile) => {
                response.department = Some(&profile.department);
                response.subject = Some(&profile.subject);
            }
            UserKind::Student(profile) => {
                response.status = Some(match profile.status {
                    db::models::RegistrationStatus::Pending => "Pending",
                    db::models::RegistrationStatus::Active => "Active",
                });
            }
        }

        response
    }
}
