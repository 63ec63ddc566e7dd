use warp::{http::StatusCode, Filter, Rejection, Reply};

use super::globals::{confirmation_required, Confirmation, SimpleSuccessResponse};
use super::{ErrorCode, FailureResponse};
use db::models::Role;
use db::{Database, Db};
use filters::{authed_is_of_kind, with_db};

pub fn routes(db: &Db) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "accounts" / u32)
        .and(warp::delete())
        .and(authed_is_of_kind(db, &[Role::Admin]))
        .and(with_db(db.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(delete)
        .boxed()
}

async fn delete(
    uid: u32,
    _email: String,
    db: Db,
    request: Confirmation,
) -> Result<impl warp::Reply, warp::Rejection> {
    if !request.confirm {
        return Ok(confirmation_required());
    }

    let mut db = db.lock().await;

    match db.user_get(uid).map(|user| user.role()) {
        None => Ok(warp::reply::with_status(
            FailureResponse::new_reply(ErrorCode::InvalidID),
            StatusCode::BAD_REQUEST,
        )),
        // Admin accounts are seeded out-of-band and stay out of reach here.
        Some(Role::Admin) => Ok(warp::reply::with_status(
            FailureResponse::new_reply(ErrorCode::InsufficientAuthorization),
            StatusCode::FORBIDDEN,
        )),
        Some(_) => {
            db.account_remove(uid);

            Ok(warp::reply::with_status(
                warp::reply::json(&SimpleSuccessResponse::new()),
                StatusCode::OK,
            ))
        }
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
    async fn deletion_is_confirm_gated_and_spares_admins() {
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
        let admin_uid = body["user"]["uid"].as_u64().expect("uid");

        // No confirmation, no deletion.
        let res = warp::test::request()
            .method("DELETE")
            .path("/api/accounts/1")
            .header("Authorization", format!("Bearer {}", token))
            .json(&json!({}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 400);
        let body: Value = serde_json::from_slice(res.body()).expect("json body");
        assert_eq!(body["code"], "ConfirmationRequired");

        let res = warp::test::request()
            .method("DELETE")
            .path(&format!("/api/accounts/{}", admin_uid))
            .header("Authorization", format!("Bearer {}", token))
            .json(&json!({"confirm": true}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 403);

        // A seeded teacher account is removable.
        let res = warp::test::request()
            .method("DELETE")
            .path("/api/accounts/1")
            .header("Authorization", format!("Bearer {}", token))
            .json(&json!({"confirm": true}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 200);

        let res = warp::test::request()
            .method("DELETE")
            .path("/api/accounts/1")
            .header("Authorization", format!("Bearer {}", token))
            .json(&json!({"confirm": true}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 400);
    }
}
