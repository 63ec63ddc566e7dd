use db::models::Role;
use db::{Database, Db};
use warp::{Filter, Rejection};

use crate::with_db;

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let mut parts = header.splitn(2, ' ');
    let auth_type = parts.next().unwrap_or("");
    let token = parts.next().unwrap_or("");

    if auth_type.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// Filter that checks if the request carries a live session, and rejects it
/// otherwise; extracts the session account's email.
pub fn authed(db: &Db) -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    with_db(db.clone())
        .and(warp::header::optional::<String>("Authorization"))
        .and_then(guard)
}

/// Filter that checks if the session account holds one of the wanted roles,
/// and rejects the request otherwise; also checks that the request is
/// authenticated at all.
pub fn authed_is_of_kind<'a>(
    db: &Db,
    roles: &'a [Role],
) -> impl Filter<Extract = (String,), Error = Rejection> + Clone + 'a {
    with_db(db.clone())
        .and(authed(db))
        .map(move |db, email| (db, email, roles))
        .untuple_one()
        .and_then(guard_role)
}

#[derive(Debug)]
pub struct Forbidden;

impl warp::reject::Reject for Forbidden {}

#[derive(Debug)]
pub struct Unauthorized;

impl warp::reject::Reject for Unauthorized {}

async fn guard(db: Db, authorization: Option<String>) -> Result<String, warp::Rejection> {
    let authorization = match authorization {
        Some(authorization) => authorization,
        None => return Err(warp::reject::custom(Forbidden)),
    };

    let token = match parse_bearer(&authorization) {
        Some(token) => token.to_string(),
        None => return Err(warp::reject::custom(Forbidden)),
    };

    let db = db.lock().await;

    match db.auth_resolve(&token) {
        Some(user) => Ok(user.email.clone()),
        None => Err(warp::reject::custom(Forbidden)),
    }
}

async fn guard_role(db: Db, email: String, wanted: &[Role]) -> Result<String, warp::Rejection> {
    let db = db.lock().await;
    let user = db
        .user_get_by_email(&email)
        .expect("session account should still exist");

    if wanted.contains(&user.role()) {
        Ok(email)
    } else {
        Err(warp::reject::custom(Unauthorized))
    }
}
