use serde::{Deserialize, Serialize};
use warp::{http::StatusCode, Filter, Rejection, Reply};

use super::globals::{AccountResponse, PaginatedQueryableListRequest, SimpleSuccessResponse};
use super::{ErrorCode, FailureResponse};
use db::models::{Role, UserKind};
use db::{AuthError, Database, Db, NewAccount, NewAccountKind, TeacherUpdate};
use filters::{authed, authed_is_of_kind, with_db};

pub fn routes(db: &Db) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    // Readable by every signed-in role: the booking form needs the teacher
    // directory too.
    let list_route = warp::path!("api" / "teachers")
        .and(warp::get())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and(warp::query::<PaginatedQueryableListRequest>())
        .and_then(list)
        .boxed();

    let create_route = warp::path!("api" / "teachers")
        .and(warp::post())
        .and(authed_is_of_kind(db, &[Role::Admin]))
        .and(with_db(db.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(create)
        .boxed();

    let update_route = warp::path!("api" / "teachers" / u32)
        .and(warp::put())
        .and(authed_is_of_kind(db, &[Role::Admin]))
        .and(with_db(db.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(update)
        .boxed();

    list_route.or(create_route).or(update_route)
}

#[derive(Serialize)]
struct ListResponse<'a> {
    status: &'static str,
    total: usize,
    teachers: Vec<Teacher<'a>>,
}

#[derive(Serialize)]
struct Teacher<'a> {
    uid: u32,
    name: &'a str,
    email: &'a str,
    department: &'a str,
    subject: &'a str,
}

async fn list(
    _email: String,
    db: Db,
    request: PaginatedQueryableListRequest,
) -> Result<impl warp::Reply, warp::Rejection> {
    let db = db.lock().await;

    let page = request.normalized_page_number();
    let (total, users) = db.teacher_list(page, request.query.as_deref());

    let teachers = users
        .into_iter()
        .map(|user| match &user.kind {
            UserKind::Teacher(profile) => Teacher {
                uid: user.uid,
                name: &user.name,
                email: &user.email,
                department: &profile.department,
                subject: &profile.subject,
            },
            _ => unreachable!("teacher_list only yields teachers"),
        })
        .collect();

    Ok(warp::reply::json(&ListResponse {
        status: "success",
        total,
        teachers,
    }))
}

#[derive(Deserialize)]
struct NewTeacherRequest {
    name: String,
    email: String,
    password: String,
    department: String,
    subject: String,
}

#[derive(Serialize)]
struct CreatedResponse<'a> {
    status: &'static str,
    account: AccountResponse<'a>,
}

async fn create(
    _email: String,
    db: Db,
    request: NewTeacherRequest,
) -> Result<impl warp::Reply, warp::Rejection> {
    if request.name.is_empty()
        || request.email.is_empty()
        || request.password.is_empty()
        || request.department.is_empty()
        || request.subject.is_empty()
    {
        return Ok(warp::reply::with_status(
            FailureResponse::new_reply(ErrorCode::MissingField),
            StatusCode::BAD_REQUEST,
        ));
    }

    let mut db = db.lock().await;

    match db.register(NewAccount {
        name: request.name,
        email: request.email,
        password: request.password,
        kind: NewAccountKind::Teacher {
            department: request.department,
            subject: request.subject,
        },
    }) {
        Ok(user) => Ok(warp::reply::with_status(
            warp::reply::json(&CreatedResponse {
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

async fn update(
    uid: u32,
    _email: String,
    db: Db,
    request: TeacherUpdate,
) -> Result<impl warp::Reply, warp::Rejection> {
    if request.name.is_empty() || request.department.is_empty() || request.subject.is_empty() {
        return Ok(warp::reply::with_status(
            FailureResponse::new_reply(ErrorCode::MissingField),
            StatusCode::BAD_REQUEST,
        ));
    }

    let mut db = db.lock().await;
    let status = db.teacher_update(uid, request);

    if status.found {
        Ok(warp::reply::with_status(
            warp::reply::json(&SimpleSuccessResponse::new()),
            StatusCode::OK,
        ))
    } else {
        Ok(warp::reply::with_status(
            FailureResponse::new_reply(ErrorCode::InvalidID),
            StatusCode::BAD_REQUEST,
        ))
    }
}

#[cfg(test)]
mod tests {
    use crate::handle_rejection;
    use crate::routes::routes;
    use db::new_db;
    use warp::Filter;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn directory_is_visible_to_students_but_not_writable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = new_db(dir.path().join("db.json").to_string_lossy().into_owned());
        let api = routes(&db).recover(handle_rejection);

        let res = warp::test::request()
            .method("POST")
            .path("/api/session")
            .json(&json!({"email": "alice.martin@school.edu", "password": "alice.martin"}))
            .reply(&api)
            .await;
        let body: Value = serde_json::from_slice(res.body()).expect("json body");
        let token = body["token"].as_str().expect("token").to_string();

        let res = warp::test::request()
            .method("GET")
            .path("/api/teachers")
            .header("Authorization", format!("Bearer {}", token))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 200);
        let body: Value = serde_json::from_slice(res.body()).expect("json body");
        assert_eq!(body["total"], 3);

        let res = warp::test::request()
            .method("POST")
            .path("/api/teachers")
            .header("Authorization", format!("Bearer {}", token))
            .json(&json!({
                "name": "Eve",
                "email": "eve@x.com",
                "password": "pw",
                "department": "X",
                "subject": "X",
            }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 401);
    }

    #[tokio::test]
    async fn update_needs_an_existing_teacher() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = new_db(dir.path().join("db.json").to_string_lossy().into_owned());
        let api = routes(&db).recover(handle_rejection);

        let res = warp::test::request()
            .method("POST")
            .path("/api/session")
            .json(&json!({"email": "admin@school.edu", "password": "admin.user"}))
            .reply(&api)
            .await;
        let body: Value = serde_json::from_slice(res.body()).expect("json body");
        let token = body["token"].as_str().expect("token").to_string();

        let res = warp::test::request()
            .method("PUT")
            .path("/api/teachers/9999")
            .header("Authorization", format!("Bearer {}", token))
            .json(&json!({"name": "N", "department": "D", "subject": "S"}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 400);
        let body: Value = serde_json::from_slice(res.body()).expect("json body");
        assert_eq!(body["code"], "InvalidID");
    }
}
