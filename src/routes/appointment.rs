use futures::stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use warp::{http::StatusCode, Filter, Rejection, Reply};

use super::globals::{
    confirmation_required, workflow_failure, Confirmation, SimpleSuccessResponse,
};
use db::models::{Appointment, AppointmentStatus, Role, User};
use db::{AppointmentFilter, Database, Db, NewAppointment};
use filters::{authed, authed_is_of_kind, with_db};

pub fn routes(db: &Db) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let live_route = warp::path!("api" / "appointments" / "live")
        .and(warp::get())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and(warp::query::<ListQuery>())
        .and_then(live)
        .boxed();

    let request_route = warp::path!("api" / "appointments")
        .and(warp::post())
        .and(authed_is_of_kind(db, &[Role::Student]))
        .and(with_db(db.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(request)
        .boxed();

    let list_route = warp::path!("api" / "appointments")
        .and(warp::get())
        .and(authed(db))
        .and(with_db(db.clone()))
        .and(warp::query::<ListQuery>())
        .and_then(list)
        .boxed();

    let status_route = warp::path!("api" / "appointments" / u32 / "status")
        .and(warp::put())
        .and(authed_is_of_kind(db, &[Role::Teacher]))
        .and(with_db(db.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(set_status)
        .boxed();

    let cancel_route = warp::path!("api" / "appointments" / u32)
        .and(warp::delete())
        .and(authed_is_of_kind(db, &[Role::Student, Role::Admin]))
        .and(with_db(db.clone()))
        .and(warp::body::content_length_limit(1024 * 16).and(warp::body::json()))
        .and_then(cancel)
        .boxed();

    live_route
        .or(request_route)
        .or(list_route)
        .or(status_route)
        .or(cancel_route)
}

#[derive(Deserialize)]
struct ListQuery {
    status: Option<AppointmentStatus>,
}

#[derive(Deserialize)]
struct StatusRequest {
    status: AppointmentStatus,
    #[serde(default)]
    confirm: bool,
}

#[derive(Serialize)]
struct RequestedResponse<'a> {
    status: &'static str,
    appointment: &'a Appointment,
}

#[derive(Serialize)]
struct ListResponse<'a> {
    status: &'static str,
    total: usize,
    appointments: Vec<&'a Appointment>,
}

/// Role visibility: admins see everything, teachers and students only their
/// own records.
fn scope_filter(user: &User, status: Option<AppointmentStatus>) -> AppointmentFilter {
    match user.role() {
        Role::Admin => AppointmentFilter {
            status,
            ..AppointmentFilter::default()
        },
        Role::Teacher => AppointmentFilter {
            teacher_email: Some(user.email.clone()),
            status,
            ..AppointmentFilter::default()
        },
        Role::Student => AppointmentFilter {
            student_email: Some(user.email.clone()),
            status,
            ..AppointmentFilter::default()
        },
    }
}

async fn request(
    email: String,
    db: Db,
    request: NewAppointment,
) -> Result<impl warp::Reply, warp::Rejection> {
    let mut db = db.lock().await;

    match db.appointment_request(&email, request) {
        Ok(appointment) => Ok(warp::reply::with_status(
            warp::reply::json(&RequestedResponse {
                status: "success",
                appointment,
            }),
            StatusCode::OK,
        )),
        Err(err) => Ok(workflow_failure(err)),
    }
}

async fn list(
    email: String,
    db: Db,
    query: ListQuery,
) -> Result<impl warp::Reply, warp::Rejection> {
    let db = db.lock().await;
    let user = db
        .user_get_by_email(&email)
        .expect("session account should still exist");
    let filter = scope_filter(user, query.status);

    let appointments = db.appointment_list(&filter);

    Ok(warp::reply::json(&ListResponse {
        status: "success",
        total: appointments.len(),
        appointments,
    }))
}

async fn set_status(
    id: u32,
    email: String,
    db: Db,
    request: StatusRequest,
) -> Result<impl warp::Reply, warp::Rejection> {
    if !request.confirm {
        return Ok(confirmation_required());
    }

    let mut db = db.lock().await;
    let actor = db
        .user_get_by_email(&email)
        .expect("session account should still exist")
        .actor();

    match db.appointment_set_status(id, request.status, &actor) {
        Ok(()) => Ok(warp::reply::with_status(
            warp::reply::json(&SimpleSuccessResponse::new()),
            StatusCode::OK,
        )),
        Err(err) => Ok(workflow_failure(err)),
    }
}

async fn cancel(
    id: u32,
    email: String,
    db: Db,
    request: Confirmation,
) -> Result<impl warp::Reply, warp::Rejection> {
    if !request.confirm {
        return Ok(confirmation_required());
    }

    let mut db = db.lock().await;
    let actor = db
        .user_get_by_email(&email)
        .expect("session account should still exist")
        .actor();

    match db.appointment_cancel(id, &actor) {
        Ok(()) => Ok(warp::reply::with_status(
            warp::reply::json(&SimpleSuccessResponse::new()),
            StatusCode::OK,
        )),
        Err(err) => Ok(workflow_failure(err)),
    }
}

/// One server-sent event per store change, each carrying the full result set
/// for the caller's scope. The subscription dies with the connection.
async fn live(
    email: String,
    db: Db,
    query: ListQuery,
) -> Result<impl warp::Reply, warp::Rejection> {
    let rx = {
        let mut db = db.lock().await;
        let filter = {
            let user = db
                .user_get_by_email(&email)
                .expect("session account should still exist");
            scope_filter(user, query.status)
        };

        db.appointment_subscribe(filter)
    };

    let events = stream::unfold(rx, |mut rx| async move {
        let snapshot = rx.recv().await?;
        Some((Ok::<_, Infallible>(warp::sse::json(snapshot)), rx))
    });

    Ok(warp::sse::reply(warp::sse::keep_alive().stream(events)))
}
