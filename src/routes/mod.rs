use warp::{Filter, Rejection, Reply};

use db::Db;

mod account;
mod appointment;
mod auth;
mod gate;
mod globals;
mod manage;
mod message;
mod student;
mod teacher;

pub use globals::{ErrorCode, FailureResponse};

pub fn routes(db: &Db) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    manage::routes(db)
        .or(auth::routes(db))
        .or(gate::routes(db))
        .or(teacher::routes(db))
        .or(student::routes(db))
        .or(account::routes(db))
        .or(appointment::routes(db))
        .or(message::routes(db))
}
