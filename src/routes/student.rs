use serde::Serialize;
use warp::{http::StatusCode, Filter, Rejection, Reply};

use super::globals::{
    confirmation_required, Confirmation, PaginatedQueryableListRequest, SimpleSuccessResponse,
};
use super::{ErrorCode, FailureResponse};
use db::models::Role;
use db::{Database, Db};
use filters::{authed_is_of_kind, with_db};

pub fn routes(db: &Db) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let pending_route = warp::path!("api" / "students" / "pending")
        .and(warp::get())
        .and(authed_is_of_kind(db, &[Role::Admin]))
        .and(with_db(db.clone()))
        .and(warp::query::<PaginatedQueryableListRequest>())
        .and_then(pending)
        .boxed();

    let approve_route = warp::path!("api" / "students" / u32 / "approve")
        .and(warp::post())
        .and(authed_is_of_kind(db, &[Role::Admin]))
        .and(with_db(db.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(approve)
        .boxed();

    let reject_route = warp::path!("api" / "students" / u32 / "reject")
        .and(warp::post())
        .and(authed_is_of_kind(db, &[Role::Admin]))
        .and(with_db(db.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(reject)
        .boxed();

    pending_route.or(approve_route).or(reject_route)
}

#[derive(Serialize)]
struct ListResponse<'a> {
    status: &'static str,
    total: usize,
    students: Vec<Student<'a>>,
}

#[derive(Serialize)]
struct Student<'a> {
    uid: u32,
    name: &'a str,
    email: &'a str,
}

async fn pending(
    _email: String,
    db: Db,
    request: PaginatedQueryableListRequest,
) -> Result<impl warp::Reply, warp::Rejection> {
    let db = db.lock().await;

    let page = request.normalized_page_number();
    let (total, users) = db.student_list_pending(page, request.query.as_deref());

    let students = users
        .into_iter()
        .map(|user| Student {
            uid: user.uid,
            name: &user.name,
            email: &user.email,
        })
        .collect();

    Ok(warp::reply::json(&ListResponse {
        status: "success",
        total,
        students,
    }))
}

async fn approve(
    uid: u32,
    _email: String,
    db: Db,
    request: Confirmation,
) -> Result<impl warp::Reply, warp::Rejection> {
    if !request.confirm {
        return Ok(confirmation_required());
    }

    let mut db = db.lock().await;
    let status = db.student_approve(uid);

    if status.updated {
        Ok(warp::reply::with_status(
            warp::reply::json(&SimpleSuccessResponse::new()),
            StatusCode::OK,
        ))
    } else if status.found {
        // Exists, but is not a pending registration.
        Ok(warp::reply::with_status(
            FailureResponse::new_reply(ErrorCode::InvalidStatus),
            StatusCode::BAD_REQUEST,
        ))
    } else {
        Ok(warp::reply::with_status(
            FailureResponse::new_reply(ErrorCode::InvalidID),
            StatusCode::BAD_REQUEST,
        ))
    }
}

async fn reject(
    uid: u32,
    _email: String,
    db: Db,
    request: Confirmation,
) -> Result<impl warp::Reply, warp::Rejection> {
    if !request.confirm {
        return Ok(confirmation_required());
    }

    let mut db = db.lock().await;

    if db.student_reject(uid) {
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
    async fn rejected_registration_disappears() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = new_db(dir.path().join("db.json").to_string_lossy().into_owned());
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
        let uid = body["account"]["uid"].as_u64().expect("uid");

        let res = warp::test::request()
            .method("POST")
            .path("/api/session")
            .json(&json!({"email": "admin@school.edu", "password": "admin.user"}))
            .reply(&api)
            .await;
        let body: Value = serde_json::from_slice(res.body()).expect("json body");
        let token = body["token"].as_str().expect("token").to_string();

        let res = warp::test::request()
            .method("GET")
            .path("/api/students/pending?query=Sam")
            .header("Authorization", format!("Bearer {}", token))
            .reply(&api)
            .await;
        let body: Value = serde_json::from_slice(res.body()).expect("json body");
        assert_eq!(body["total"], 1);

        let res = warp::test::request()
            .method("POST")
            .path(&format!("/api/students/{}/reject", uid))
            .header("Authorization", format!("Bearer {}", token))
            .json(&json!({"confirm": true}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 200);

        let res = warp::test::request()
            .method("GET")
            .path("/api/students/pending?query=Sam")
            .header("Authorization", format!("Bearer {}", token))
            .reply(&api)
            .await;
        let body: Value = serde_json::from_slice(res.body()).expect("json body");
        assert_eq!(body["total"], 0);

        // The account record is gone, not merely marked.
        let res = warp::test::request()
            .method("POST")
            .path("/api/session")
            .json(&json!({"email": "s@x.com", "password": "pw"}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 403);
    }

    #[tokio::test]
    async fn approval_activates_the_account() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = new_db(dir.path().join("db.json").to_string_lossy().into_owned());
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
        let body: Value = serde_json::from_slice(res.body()).expect("json body");
        let uid = body["account"]["uid"].as_u64().expect("uid");

        let res = warp::test::request()
            .method("POST")
            .path("/api/session")
            .json(&json!({"email": "admin@school.edu", "password": "admin.user"}))
            .reply(&api)
            .await;
        let body: Value = serde_json::from_slice(res.body()).expect("json body");
        let token = body["token"].as_str().expect("token").to_string();

        let res = warp::test::request()
            .method("POST")
            .path(&format!("/api/students/{}/approve", uid))
            .header("Authorization", format!("Bearer {}", token))
            .json(&json!({"confirm": true}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 200);

        // A second approval has nothing left to approve.
        let res = warp::test::request()
            .method("POST")
            .path(&format!("/api/students/{}/approve", uid))
            .header("Authorization", format!("Bearer {}", token))
            .json(&json!({"confirm": true}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 400);
        let body: Value = serde_json::from_slice(res.body()).expect("json body");
        assert_eq!(body["code"], "InvalidStatus");

        let res = warp::test::request()
            .method("POST")
            .path("/api/session")
            .json(&json!({"email": "s@x.com", "password": "pw"}))
            .reply(&api)
            .await;
        let body: Value = serde_json::from_slice(res.body()).expect("json body");
        assert_eq!(body["user"]["status"], "Active");
    }
}
