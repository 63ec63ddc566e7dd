use db::Db;
use std::convert::Infallible;
use warp::Filter;

/// Clones a handle to the shared store into the request pipeline.
pub fn with_db(db: Db) -> impl Filter<Extract = (Db,), Error = Infallible> + Clone {
    warp::any().map(move || db.clone())
}
