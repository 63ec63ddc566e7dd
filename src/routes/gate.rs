use serde::Serialize;
use warp::{Filter, Rejection, Reply};

use db::gate::{authorize, Decision, View};
use db::{Database, Db};
use filters::{parse_bearer, with_db, Malformed};

/// `GET /api/gate/<view>` answers the page-load question: may the caller
/// stay on this view, or where should it be sent instead. The Authorization
/// header is optional by design, an anonymous caller is a valid session
/// state here.
pub fn routes(db: &Db) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "gate" / String)
        .and(warp::get())
        .and(warp::header::optional::<String>("Authorization"))
        .and(with_db(db.clone()))
        .and_then(decide)
        .boxed()
}

#[derive(Serialize)]
struct GateResponse {
    status: &'static str,
    decision: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<&'static str>,
}

async fn decide(
    view: String,
    authorization: Option<String>,
    db: Db,
) -> Result<impl warp::Reply, warp::Rejection> {
    let view: View = view
        .parse()
        .map_err(|()| warp::reject::custom(Malformed))?;

    let db = db.lock().await;
    let session = authorization
        .as_deref()
        .and_then(parse_bearer)
        .and_then(|token| db.auth_resolve(token));

    let response = match authorize(session, view) {
        Decision::Allow => GateResponse {
            status: "success",
            decision: "allow",
            to: None,
        },
        Decision::RedirectTo(target) => GateResponse {
            status: "success",
            decision: "redirect",
            to: Some(target.as_str()),
        },
    };

    Ok(warp::reply::json(&response))
}
