use serde::{Deserialize, Serialize};
use warp::{http::StatusCode, Filter, Rejection, Reply};

use super::globals::{AccountResponse, SimpleSuccessResponse};
use super::{ErrorCode, FailureResponse};
use db::{AuthError, Database, Db, NewAccount, NewAccountKind};
use filters::{parse_bearer, with_db, Forbidden};

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse<'a> {
    status: &'a str,
    token: &'a str,
    user: AccountResponse<'a>,
}

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
    email: String,
    password: String,
    role: String,
}

#[derive(Serialize)]
struct RegisteredResponse<'a> {
    status: &'static str,
    account: AccountResponse<'a>,
}

pub fn routes(db: &Db) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let post_session_route = warp::path!("api" / "session")
        .and(warp::post())
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and(with_db(db.clone()))
        .and_then(post_session)
        .boxed();

    let delete_session_route = warp::path!("api" / "session")
        .and(warp::delete())
        .and(warp::header::optional::<String>("Authorization"))
        .and(with_db(db.clone()))
        .and_then(delete_session)
        .boxed();

    let register_route = warp::path!("api" / "register")
        .and(warp::post())
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and(with_db(db.clone()))
        .and_then(register)
        .boxed();

    post_session_route.or(delete_session_route).or(register_route)
}

async fn post_session(request: LoginRequest, db: Db) -> Result<impl warp::Reply, warp::Rejection> {
    let mut db = db.lock().await;

    match db.auth_sign_in(&request.email, &request.password) {
        Ok((user, token)) => Ok(warp::reply::with_status(
            warp::reply::json(&LoginResponse {
                status: "success",
                token: &token,
                user: AccountResponse::from_user(user),
            }),
            StatusCode::OK,
        )),
        // Identity without a profile record: the sign-in is aborted and the
        // caller ends up signed out, there is no session to keep.
        Err(AuthError::AccountRecordMissing) => Ok(warp::reply::with_status(
            FailureResponse::new_reply(ErrorCode::AccountRecordMissing),
            StatusCode::INTERNAL_SERVER_ERROR,
        )),
        Err(_) => Err(warp::reject::custom(Forbidden)),
    }
}

async fn delete_session(
    authorization: Option<String>,
    db: Db,
) -> Result<impl warp::Reply, warp::Rejection> {
    // The session is cleared even when the token is unknown or the header is
    // missing entirely: logout can never strand a client in a stale session.
    if let Some(token) = authorization.as_deref().and_then(parse_bearer) {
        let mut db = db.lock().await;
        db.auth_sign_out(token);
    }

    Ok(warp::reply::json(&SimpleSuccessResponse::new()))
}

async fn register(request: RegisterRequest, db: Db) -> Result<impl warp::Reply, warp::Rejection> {
    if request.name.is_empty()
        || request.email.is_empty()
        || request.password.is_empty()
        || request.role.is_empty()
    {
        return Ok(warp::reply::with_status(
            FailureResponse::new_reply(ErrorCode::MissingField),
            StatusCode::BAD_REQUEST,
        ));
    }

    // Admin accounts are seeded out-of-band, never self-registered.
    let kind = match request.role.as_str() {
        "Student" => NewAccountKind::Student,
        "Teacher" => NewAccountKind::Teacher {
            department: "N/A".to_string(),
            subject: "N/A".to_string(),
        },
        _ => {
            return Ok(warp::reply::with_status(
                FailureResponse::new_reply(ErrorCode::InvalidRole),
                StatusCode::BAD_REQUEST,
            ))
        }
    };

    let mut db = db.lock().await;

    match db.register(NewAccount {
        name: request.name,
        email: request.email,
        password: request.password,
        kind,
    }) {
        Ok(user) => Ok(warp::reply::with_status(
            warp::reply::json(&RegisteredResponse {
                status: "success",
                account: AccountResponse::from_user(user),
            }),
            StatusCode::OK,
        )),
        Err(AuthError::EmailTaken) => Ok(warp::reply::with_status(
            FailureResponse::new_reply(ErrorCode::EmailAlreadyRegistered),
            StatusCode::CONFLICT,
        )),
        Err(_) => Ok(warp::reply::with_status(
            FailureResponse::new_reply(ErrorCode::InternalServerError),
            StatusCode::INTERNAL_SERVER_ERROR,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::routes;
    use crate::handle_rejection;
    use db::new_db;
    use warp::Filter;
    use serde_json::{json, Value};

    fn test_db() -> (tempfile::TempDir, db::Db) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("db.json");

        (dir, new_db(path.to_string_lossy().into_owned()))
    }

    #[tokio::test]
    async fn register_then_login() {
        let (_dir, db) = test_db();
        let api = routes(&db).recover(handle_rejection);

        let res = warp::test::request()
            .method("POST")
            .path("/api/register")
            .json(&json!({
                "name": "Sam Doe",
                "email": "s@x.com",
                "password": "pw",
                "role": "Student",
            }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 200);

        let body: Value = serde_json::from_slice(res.body()).expect("json body");
        assert_eq!(body["account"]["status"], "Pending");

        let res = warp::test::request()
            .method("POST")
            .path("/api/session")
            .json(&json!({"email": "s@x.com", "password": "pw"}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 200);

        let body: Value = serde_json::from_slice(res.body()).expect("json body");
        assert_eq!(body["user"]["role"], "Student");
        assert!(body["token"].as_str().is_some());
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let (_dir, db) = test_db();
        let api = routes(&db).recover(handle_rejection);

        let res = warp::test::request()
            .method("POST")
            .path("/api/session")
            .json(&json!({"email": "admin@school.edu", "password": "nope"}))
            .reply(&api)
            .await;

        assert_eq!(res.status(), 403);
        let body: Value = serde_json::from_slice(res.body()).expect("json body");
        assert_eq!(body["code"], "InvalidCredentials");
    }

    #[tokio::test]
    async fn register_validates_its_input() {
        let (_dir, db) = test_db();
        let api = routes(&db).recover(handle_rejection);

        let res = warp::test::request()
            .method("POST")
            .path("/api/register")
            .json(&json!({"name": "", "email": "s@x.com", "password": "pw", "role": "Student"}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 400);

        let res = warp::test::request()
            .method("POST")
            .path("/api/register")
            .json(&json!({"name": "Eve", "email": "e@x.com", "password": "pw", "role": "Admin"}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 400);

        let body: Value = serde_json::from_slice(res.body()).expect("json body");
        assert_eq!(body["code"], "InvalidRole");
    }

    #[tokio::test]
    async fn logout_always_succeeds() {
        let (_dir, db) = test_db();
        let api = routes(&db).recover(handle_rejection);

        let res = warp::test::request()
            .method("DELETE")
            .path("/api/session")
            .header("Authorization", "Bearer not-a-live-token")
            .reply(&api)
            .await;
        assert_eq!(res.status(), 200);

        let res = warp::test::request()
            .method("DELETE")
            .path("/api/session")
            .reply(&api)
            .await;
        assert_eq!(res.status(), 200);
    }
}
