use warp::{Filter, Rejection, Reply};

use super::globals::SimpleSuccessResponse;
use db::models::Role;
use db::{Database, Db};
use filters::{authed_is_of_kind, with_db};

/// Operational surface, admin only: inspect the raw store, or throw it away
/// and go back to the development seed.
pub fn routes(db: &Db) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let dump_route = warp::path!("api" / "dump")
        .and(warp::get())
        .and(authed_is_of_kind(db, &[Role::Admin]))
        .and(with_db(db.clone()))
        .and_then(dump);

    let reset_route = warp::path!("api" / "reset")
        .and(warp::get())
        .and(authed_is_of_kind(db, &[Role::Admin]))
        .and(with_db(db.clone()))
        .and_then(reset);

    dump_route.or(reset_route)
}

async fn dump(_email: String, db: Db) -> Result<impl warp::Reply, warp::Rejection> {
    let db = db.lock().await;

    Ok(warp::reply::with_header(
        db.dump_as_json().unwrap(),
        "content-type",
        "application/json",
    ))
}

async fn reset(_email: String, db: Db) -> Result<impl warp::Reply, std::convert::Infallible> {
    let mut db = db.lock().await;
    db.reset();

    Ok(warp::reply::json(&SimpleSuccessResponse::new()))
}
