use futures::stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use warp::{http::StatusCode, Filter, Rejection, Reply};

use super::globals::{workflow_failure, SimpleSuccessResponse};
use db::models::{Message, Role, User};
use db::{Database, Db, MessageFilter, NewMessage};
use filters::{authed_is_of_kind, with_db};

pub fn routes(db: &Db) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let live_route = warp::path!("api" / "messages" / "live")
        .and(warp::get())
        .and(authed_is_of_kind(db, &[Role::Teacher, Role::Student]))
        .and(with_db(db.clone()))
        .and_then(live)
        .boxed();

    let send_route = warp::path!("api" / "messages")
        .and(warp::post())
        .and(authed_is_of_kind(db, &[Role::Student]))
        .and(with_db(db.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(send)
        .boxed();

    let list_route = warp::path!("api" / "messages")
        .and(warp::get())
        .and(authed_is_of_kind(db, &[Role::Teacher, Role::Student]))
        .and(with_db(db.clone()))
        .and_then(list)
        .boxed();

    let reply_route = warp::path!("api" / "messages" / u32 / "reply")
        .and(warp::put())
        .and(authed_is_of_kind(db, &[Role::Teacher]))
        .and(with_db(db.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(reply)
        .boxed();

    live_route.or(send_route).or(list_route).or(reply_route)
}

#[derive(Deserialize)]
struct ReplyRequest {
    reply: String,
}

#[derive(Serialize)]
struct SentResponse<'a> {
    status: &'static str,
    message: &'a Message,
}

#[derive(Serialize)]
struct ListResponse<'a> {
    status: &'static str,
    total: usize,
    messages: Vec<&'a Message>,
}

fn scope_filter(user: &User) -> MessageFilter {
    match user.role() {
        Role::Teacher => MessageFilter {
            teacher_email: Some(user.email.clone()),
            ..MessageFilter::default()
        },
        Role::Student => MessageFilter {
            student_email: Some(user.email.clone()),
            ..MessageFilter::default()
        },
        // Not routed; an admin scope would be unfiltered.
        Role::Admin => MessageFilter::default(),
    }
}

async fn send(
    email: String,
    db: Db,
    request: NewMessage,
) -> Result<impl warp::Reply, warp::Rejection> {
    let mut db = db.lock().await;

    match db.message_send(&email, request) {
        Ok(message) => Ok(warp::reply::with_status(
            warp::reply::json(&SentResponse {
                status: "success",
                message,
            }),
            StatusCode::OK,
        )),
        Err(err) => Ok(workflow_failure(err)),
    }
}

async fn list(email: String, db: Db) -> Result<impl warp::Reply, warp::Rejection> {
    let db = db.lock().await;
    let user = db
        .user_get_by_email(&email)
        .expect("session account should still exist");
    let filter = scope_filter(user);

    let messages = db.message_list(&filter);

    Ok(warp::reply::json(&ListResponse {
        status: "success",
        total: messages.len(),
        messages,
    }))
}

async fn reply(
    id: u32,
    email: String,
    db: Db,
    request: ReplyRequest,
) -> Result<impl warp::Reply, warp::Rejection> {
    let mut db = db.lock().await;
    let actor = db
        .user_get_by_email(&email)
        .expect("session account should still exist")
        .actor();

    match db.message_reply(id, &actor, request.reply) {
        Ok(()) => Ok(warp::reply::with_status(
            warp::reply::json(&SimpleSuccessResponse::new()),
            StatusCode::OK,
        )),
        Err(err) => Ok(workflow_failure(err)),
    }
}

async fn live(email: String, db: Db) -> Result<impl warp::Reply, warp::Rejection> {
    let rx = {
        let mut db = db.lock().await;
        let filter = {
            let user = db
                .user_get_by_email(&email)
                .expect("session account should still exist");
            scope_filter(user)
        };

        db.message_subscribe(filter)
    };

    let events = stream::unfold(rx, |mut rx| async move {
        let snapshot = rx.recv().await?;
        Some((Ok::<_, Infallible>(warp::sse::json(snapshot)), rx))
    });

    Ok(warp::sse::reply(warp::sse::keep_alive().stream(events)))
}

#[cfg(test)]
mod tests {
    use crate::handle_rejection;
    use crate::routes::routes;
    use db::new_db;
    use warp::Filter;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn student_writes_and_teacher_replies() {
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
        let student_token = body["token"].as_str().expect("token").to_string();

        let res = warp::test::request()
            .method("POST")
            .path("/api/messages")
            .header("Authorization", format!("Bearer {}", student_token))
            .json(&json!({
                "teacher_email": "marie.curie@school.edu",
                "content": "Could we move the lab session?",
            }))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 200);
        let body: Value = serde_json::from_slice(res.body()).expect("json body");
        let id = body["message"]["id"].as_u64().expect("id");

        let res = warp::test::request()
            .method("POST")
            .path("/api/session")
            .json(&json!({"email": "marie.curie@school.edu", "password": "marie.curie"}))
            .reply(&api)
            .await;
        let body: Value = serde_json::from_slice(res.body()).expect("json body");
        let teacher_token = body["token"].as_str().expect("token").to_string();

        let res = warp::test::request()
            .method("PUT")
            .path(&format!("/api/messages/{}/reply", id))
            .header("Authorization", format!("Bearer {}", teacher_token))
            .json(&json!({"reply": "Yes, Thursday works."}))
            .reply(&api)
            .await;
        assert_eq!(res.status(), 200);

        let res = warp::test::request()
            .method("GET")
            .path("/api/messages")
            .header("Authorization", format!("Bearer {}", student_token))
            .reply(&api)
            .await;
        let body: Value = serde_json::from_slice(res.body()).expect("json body");
        assert_eq!(body["total"], 1);
        assert_eq!(body["messages"][0]["teacher_reply"], "Yes, Thursday works.");
    }
}
