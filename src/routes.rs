use std::convert::Infallible;
use std::sync::Arc;

use hyper::Body;
use serde::Deserialize;
use tracing::{error, warn};
use warp::http::header::{CONTENT_TYPE, SET_COOKIE};
use warp::http::{Response, StatusCode, Uri};
use warp::path::FullPath;
use warp::{Filter, Rejection, Reply};

use crate::auth::{self, Origin, Route};
use crate::config::Config;
use crate::error::Error;
use crate::html::escape;
use crate::pipeline::{self, Progress};
use crate::session::{session_cookie, Session, SessionStore, SESSION_COOKIE};
use crate::strava::StravaClient;

/// Everything a request handler needs.
pub struct App {
    pub config: Config,
    pub client: StravaClient,
    pub sessions: SessionStore,
}

impl App {
    pub fn new(config: Config) -> Self {
        App {
            client: StravaClient::new(&config.api_base),
            sessions: SessionStore::new(config.session_ttl),
            config,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

pub fn routes(app: Arc<App>) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let index = warp::get()
        .and(warp::path::end())
        .and(with_app(app.clone()))
        .and(with_session(app.clone()))
        .and(origin())
        .and_then(index);

    let create_json = warp::get()
        .and(warp::path("create_json"))
        .and(warp::path::end())
        .and(with_app(app.clone()))
        .and(with_session(app.clone()))
        .and(origin())
        .and_then(create_json);

    let token_exchange = warp::get()
        .and(warp::path("token_exchange"))
        .and(warp::path::end())
        .and(with_app(app))
        .and(warp::query::<CallbackQuery>())
        .and(origin())
        .and_then(token_exchange);

    index
        .or(create_json)
        .or(token_exchange)
        .recover(handle_rejection)
}

fn with_app(app: Arc<App>) -> impl Filter<Extract = (Arc<App>,), Error = Infallible> + Clone {
    warp::any().map(move || app.clone())
}

/// The live session named by the session cookie, if any.
fn with_session(
    app: Arc<App>,
) -> impl Filter<Extract = (Option<(String, Session)>,), Error = Infallible> + Clone {
    warp::cookie::optional(SESSION_COOKIE).map(move |id: Option<String>| {
        id.and_then(|id| app.sessions.get(&id).map(|session| (id, session)))
    })
}

fn origin() -> impl Filter<Extract = (Origin,), Error = Rejection> + Clone {
    warp::header::optional::<String>("x-forwarded-proto")
        .and(warp::header::optional::<String>("host"))
        .and(warp::path::full())
        .map(|scheme: Option<String>, host: Option<String>, path: FullPath| Origin {
            scheme: scheme.unwrap_or_else(|| "http".to_string()),
            host: host.unwrap_or_else(|| "localhost".to_string()),
            path: path.as_str().to_string(),
        })
}

fn login(app: &App, origin: &Origin, target: Route) -> Result<Box<dyn Reply>, Rejection> {
    match auth::login_and_redirect(app, origin, target) {
        Ok(redirect) => Ok(Box::new(redirect)),
        Err(err) => Err(warp::reject::custom(err)),
    }
}

async fn index(
    app: Arc<App>,
    session: Option<(String, Session)>,
    origin: Origin,
) -> Result<Box<dyn Reply>, Rejection> {
    let Some((_, session)) = session else {
        return login(&app, &origin, Route::Index);
    };

    let mut body = format!(
        "<p>logged in as <b>{}</b></p>\n<a href=\"create_json\">generate JSON file</a>\n",
        escape(&session.username)
    );
    if let Some(tracks) = &session.tracks {
        body.push_str(&format!("<p>last export: {} tracks</p>\n", tracks.len()));
    }
    Ok(Box::new(warp::reply::html(body)))
}

/// Runs the export on a spawned task and streams its progress lines as the response body.
async fn create_json(
    app: Arc<App>,
    session: Option<(String, Session)>,
    origin: Origin,
) -> Result<Box<dyn Reply>, Rejection> {
    let Some((id, session)) = session else {
        return login(&app, &origin, Route::CreateJson);
    };

    let (progress, rx) = Progress::channel();
    tokio::spawn(async move {
        match pipeline::run(&app.client, &app.config, &session.access_token, &progress).await {
            Ok(tracks) => app.sessions.store_tracks(&id, tracks),
            Err(err) => {
                error!(username = %session.username, error = %err, "export failed");
                progress.send(format!(
                    "<p><b>Export failed:</b> {}</p>",
                    escape(&err.to_string())
                ));
            }
        }
    });

    let response = Response::builder()
        .header(CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Body::wrap_stream(rx))
        .map_err(|e| warp::reject::custom(Error::Internal(e.to_string())))?;
    Ok(Box::new(response))
}

async fn token_exchange(
    app: Arc<App>,
    query: CallbackQuery,
    origin: Origin,
) -> Result<Box<dyn Reply>, Rejection> {
    let route = Route::from_state(query.state.as_deref());

    let code = match (query.code, query.error) {
        (Some(code), None) if !code.is_empty() => code,
        (_, error) => {
            let reason = error.unwrap_or_else(|| "no code".to_string());
            warn!(reason = %reason, "authorization not granted");
            let body = format!(
                "<p>Authorization was not granted ({}).</p>\n<a href=\"{}\">try again</a>\n",
                escape(&reason),
                route.path()
            );
            return Ok(Box::new(warp::reply::with_status(
                warp::reply::html(body),
                StatusCode::BAD_REQUEST,
            )));
        }
    };

    let (session_id, route) = auth::accept_token(&app, &code, query.state.as_deref())
        .await
        .map_err(warp::reject::custom)?;

    Ok(Box::new(warp::reply::with_header(
        warp::redirect::found(Uri::from_static(route.path())),
        SET_COOKIE,
        session_cookie(&session_id, origin.scheme == "https"),
    )))
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<Error>() {
        error!(error = %e, "request failed");
        let status = if e.is_upstream() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        error!(rejection = ?err, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::html(format!("<p><b>Error:</b> {}</p>\n", escape(&message))),
        status,
    ))
}
