use reqwest::Url;
use tracing::info;
use warp::http::Uri;
use warp::Reply;

use crate::error::{Error, Result};
use crate::routes::App;

/// Pages a finished authorization can return to. The OAuth `state` carries the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Index,
    CreateJson,
}

impl Route {
    pub fn state(self) -> &'static str {
        match self {
            Route::Index => "index",
            Route::CreateJson => "create_json",
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Route::Index => "/",
            Route::CreateJson => "/create_json",
        }
    }

    /// Unknown or missing names fall back to the index page.
    pub fn from_state(state: Option<&str>) -> Route {
        match state {
            Some("create_json") => Route::CreateJson,
            _ => Route::Index,
        }
    }
}

/// Where the browser's current request was addressed.
#[derive(Debug, Clone)]
pub struct Origin {
    pub scheme: String,
    pub host: String,
    pub path: String,
}

impl Origin {
    /// The token exchange route next to the current one: the current path with its last
    /// segment replaced by `token_exchange`.
    pub fn callback_url(&self) -> String {
        let dir = &self.path[..self.path.rfind('/').unwrap_or(0)];
        format!("{}://{}{}/token_exchange", self.scheme, self.host, dir)
    }
}

pub fn authorize_url(app: &App, origin: &Origin, target: Route) -> Result<Url> {
    Url::parse_with_params(
        &app.client.authorize_url(),
        &[
            ("client_id", app.config.credentials.client_id.as_str()),
            ("response_type", "code"),
            ("scope", "read,activity:read_all"),
            ("state", target.state()),
            ("redirect_uri", origin.callback_url().as_str()),
        ],
    )
    .map_err(|e| Error::Internal(format!("bad authorize url: {e}")))
}

/// Sends the browser to the provider's consent page; it comes back to `token_exchange`
/// and from there to `target`.
pub fn login_and_redirect(app: &App, origin: &Origin, target: Route) -> Result<impl Reply> {
    let url = authorize_url(app, origin, target)?;
    let uri: Uri = url
        .as_str()
        .parse()
        .map_err(|e| Error::Internal(format!("bad authorize url: {e}")))?;
    Ok(warp::redirect::found(uri))
}

/// Trades an authorization code for an access token and opens a session for the user.
/// Returns the session id and the page to continue to.
pub async fn accept_token(app: &App, code: &str, state: Option<&str>) -> Result<(String, Route)> {
    let credentials = &app.config.credentials;
    let grant = app
        .client
        .exchange_code(&credentials.client_id, &credentials.client_secret, code)
        .await?;

    info!(username = %grant.username, "has logged in");
    let id = app.sessions.create(grant.username, grant.access_token);
    Ok((id, Route::from_state(state)))
}
