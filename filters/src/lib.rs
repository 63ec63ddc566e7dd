mod authed;
mod with_db;

pub use authed::{authed, authed_is_of_kind, parse_bearer, Forbidden, Unauthorized};
pub use with_db::with_db;

#[derive(Debug)]
pub struct Malformed;

impl warp::reject::Reject for Malformed {}
