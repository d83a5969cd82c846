use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Public page of an activity, linked from the progress output.
pub const ACTIVITY_PAGE_URL: &str = "https://www.strava.com/activities";

#[derive(Clone)]
pub struct StravaClient {
    http: Client,
    base: String,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
    grant_type: &'static str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    athlete: Athlete,
}

#[derive(Deserialize)]
struct Athlete {
    id: Option<u64>,
    email: Option<String>,
    username: Option<String>,
}

impl Athlete {
    fn display_name(self) -> Option<String> {
        self.email
            .filter(|e| !e.is_empty())
            .or(self.username.filter(|u| !u.is_empty()))
            .or(self.id.map(|id| id.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub username: String,
    pub access_token: String,
}

/// The fields kept from an activity-list entry.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ActivitySummary {
    pub id: u64,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub start_date_local: String,
    pub max_speed: f64,
    pub average_speed: f64,
    pub distance: f64,
    pub elapsed_time: i64,
}

#[derive(Debug, Deserialize)]
struct Stream {
    #[serde(rename = "type")]
    stream_type: String,
    data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackStreams {
    pub coords: Vec<[f64; 2]>,
    pub times: Vec<i64>,
}

impl StravaClient {
    pub fn new(base: &str) -> Self {
        StravaClient {
            http: Client::new(),
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/oauth/authorize", self.base)
    }

    pub async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
    ) -> Result<TokenGrant> {
        let url = format!("{}/oauth/token", self.base);
        let request = self.http.post(&url).form(&TokenRequest {
            client_id,
            client_secret,
            code,
            grant_type: "authorization_code",
        });

        let token: TokenResponse = send_json(request, &url, "token exchange").await?;
        let username = token
            .athlete
            .display_name()
            .ok_or_else(|| Error::malformed("token exchange", "athlete has no email or id"))?;

        Ok(TokenGrant {
            username,
            access_token: token.access_token,
        })
    }

    /// One page of the athlete's activities, oldest-first from the epoch, undecoded.
    pub async fn list_activities(
        &self,
        access_token: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Value>> {
        let url = format!("{}/api/v3/athlete/activities", self.base);
        let request = self.http.get(&url).bearer_auth(access_token).query(&[
            ("after", 0),
            ("page", page),
            ("per_page", per_page),
        ]);

        send_json(request, &url, &format!("activity list page {page}")).await
    }

    pub async fn activity_streams(&self, access_token: &str, id: u64) -> Result<TrackStreams> {
        let url = format!("{}/api/v3/activities/{id}/streams/latlng,time", self.base);
        let request = self.http.get(&url).bearer_auth(access_token);

        let context = format!("streams of activity {id}");
        let streams: Vec<Stream> = send_json(request, &url, &context).await?;
        decode_streams(&context, streams)
    }
}

async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    url: &str,
    context: &str,
) -> Result<T> {
    debug!(url, "calling provider");

    let http_err = |source| Error::Http {
        url: url.to_string(),
        source,
    };

    let response = request.send().await.map_err(http_err)?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Status {
            url: url.to_string(),
            status,
        });
    }

    let body = response.text().await.map_err(http_err)?;
    serde_json::from_str(&body).map_err(|e| Error::malformed(context, e))
}

/// Picks the `latlng` and `time` streams out of a streams response by their type tag.
fn decode_streams(context: &str, streams: Vec<Stream>) -> Result<TrackStreams> {
    let mut coords = None;
    let mut times = None;

    for stream in streams {
        match stream.stream_type.as_str() {
            "latlng" => {
                let data: Vec<[f64; 2]> = serde_json::from_value(stream.data)
                    .map_err(|e| Error::malformed(context, format!("latlng data: {e}")))?;
                coords = Some(data);
            }
            "time" => {
                let data: Vec<i64> = serde_json::from_value(stream.data)
                    .map_err(|e| Error::malformed(context, format!("time data: {e}")))?;
                times = Some(data);
            }
            _ => {}
        }
    }

    let coords = coords.ok_or_else(|| Error::malformed(context, "no latlng stream"))?;
    let times = times.ok_or_else(|| Error::malformed(context, "no time stream"))?;

    if coords.len() != times.len() {
        return Err(Error::malformed(
            context,
            format!(
                "{} latlng samples but {} time samples",
                coords.len(),
                times.len()
            ),
        ));
    }

    Ok(TrackStreams { coords, times })
}
