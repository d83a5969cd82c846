//! A local stand-in for the provider's OAuth and REST endpoints.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use warp::http::StatusCode;
use warp::Filter;

use crate::config::{Config, StravaCredentials};

pub const GOOD_CODE: &str = "good-code";
pub const ACCESS_TOKEN: &str = "token-abc";
pub const EMAIL: &str = "rider@example.com";

/// Configuration pointing at a mock provider and writing to `export_path`.
pub fn test_config(api_base: &str, export_path: PathBuf) -> Config {
    Config {
        credentials: StravaCredentials {
            client_id: "12345".to_string(),
            client_secret: "c0ffee".to_string(),
        },
        activity_type: "Windsurf".to_string(),
        export_path,
        api_base: api_base.to_string(),
        bind_addr: ([127, 0, 0, 1], 0).into(),
        session_ttl: Duration::from_secs(60),
        page_size: 30,
    }
}

#[derive(Clone)]
struct MockActivity {
    id: u64,
    activity_type: String,
    samples: Option<Vec<(f64, f64, i64)>>,
}

#[derive(Default)]
pub struct MockStrava {
    activities: Vec<MockActivity>,
    page_cap: Option<usize>,
}

pub struct MockServer {
    pub base: String,
    stream_requests: Arc<Mutex<Vec<u64>>>,
}

impl MockServer {
    /// Activity ids whose streams were requested, in request order.
    pub fn stream_requests(&self) -> Vec<u64> {
        self.stream_requests.lock().unwrap().clone()
    }
}

impl MockStrava {
    pub fn with_activity(
        mut self,
        id: u64,
        activity_type: &str,
        samples: Vec<(f64, f64, i64)>,
    ) -> Self {
        self.activities.push(MockActivity {
            id,
            activity_type: activity_type.to_string(),
            samples: Some(samples),
        });
        self
    }

    /// Serve at most `cap` activities per list page, whatever `per_page` asks for.
    pub fn with_page_cap(mut self, cap: usize) -> Self {
        self.page_cap = Some(cap);
        self
    }

    /// An activity whose streams response lacks the time stream.
    pub fn with_broken_activity(mut self, id: u64, activity_type: &str) -> Self {
        self.activities.push(MockActivity {
            id,
            activity_type: activity_type.to_string(),
            samples: None,
        });
        self
    }

    pub fn serve(self) -> MockServer {
        let activities = Arc::new(self.activities);
        let page_cap = self.page_cap.unwrap_or(usize::MAX);
        let stream_requests = Arc::new(Mutex::new(Vec::new()));

        let token = warp::post()
            .and(warp::path!("oauth" / "token"))
            .and(warp::body::form::<HashMap<String, String>>())
            .map(|form: HashMap<String, String>| {
                let granted = form.get("code").map(String::as_str) == Some(GOOD_CODE)
                    && form.get("grant_type").map(String::as_str) == Some("authorization_code");
                if granted {
                    reply(
                        StatusCode::OK,
                        json!({
                            "token_type": "Bearer",
                            "access_token": ACCESS_TOKEN,
                            "athlete": {"id": 1, "email": EMAIL, "username": "rider"}
                        }),
                    )
                } else {
                    reply(StatusCode::BAD_REQUEST, json!({"message": "Bad Request"}))
                }
            });

        let list_source = activities.clone();
        let list = warp::get()
            .and(warp::path!("api" / "v3" / "athlete" / "activities"))
            .and(warp::header::optional::<String>("authorization"))
            .and(warp::query::<HashMap<String, String>>())
            .map(move |auth: Option<String>, query: HashMap<String, String>| {
                if !authorized(&auth) {
                    return unauthorized();
                }
                let number = |key: &str, default: usize| {
                    query
                        .get(key)
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(default)
                };
                let page = number("page", 1).max(1);
                let per_page = number("per_page", 30).min(page_cap).max(1);
                let entries: Vec<Value> = list_source
                    .iter()
                    .skip((page - 1) * per_page)
                    .take(per_page)
                    .map(activity_json)
                    .collect();
                reply(StatusCode::OK, Value::Array(entries))
            });

        let stream_source = activities;
        let requests = stream_requests.clone();
        let streams = warp::get()
            .and(warp::path!("api" / "v3" / "activities" / u64 / "streams" / String))
            .and(warp::header::optional::<String>("authorization"))
            .map(move |id: u64, _keys: String, auth: Option<String>| {
                if !authorized(&auth) {
                    return unauthorized();
                }
                requests.lock().unwrap().push(id);
                match stream_source.iter().find(|a| a.id == id) {
                    Some(activity) => reply(StatusCode::OK, streams_json(activity)),
                    None => reply(
                        StatusCode::NOT_FOUND,
                        json!({"message": "Record Not Found"}),
                    ),
                }
            });

        let routes = token.or(list).unify().or(streams).unify();
        let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        MockServer {
            base: format!("http://{addr}"),
            stream_requests,
        }
    }
}

fn reply(status: StatusCode, body: Value) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(&body), status)
}

fn authorized(auth: &Option<String>) -> bool {
    auth.as_deref() == Some(format!("Bearer {ACCESS_TOKEN}").as_str())
}

fn unauthorized() -> warp::reply::WithStatus<warp::reply::Json> {
    reply(
        StatusCode::UNAUTHORIZED,
        json!({"message": "Authorization Error"}),
    )
}

fn activity_json(activity: &MockActivity) -> Value {
    json!({
        "id": activity.id,
        "name": format!("Session {}", activity.id),
        "type": activity.activity_type,
        "start_date_local": format!("2018-06-{:02}T10:00:00Z", activity.id % 28 + 1),
        "max_speed": 10.5,
        "average_speed": 5.25,
        "distance": 1000.0 * activity.id as f64,
        "elapsed_time": 3600,
    })
}

fn streams_json(activity: &MockActivity) -> Value {
    match &activity.samples {
        Some(samples) => {
            let latlng: Vec<[f64; 2]> =
                samples.iter().map(|(lat, lon, _)| [*lat, *lon]).collect();
            let time: Vec<i64> = samples.iter().map(|(_, _, t)| *t).collect();
            let distance: Vec<f64> = (0..samples.len()).map(|i| i as f64 * 2.5).collect();
            json!([
                {"type": "latlng", "data": latlng, "series_type": "distance", "original_size": samples.len(), "resolution": "high"},
                {"type": "distance", "data": distance, "series_type": "distance", "original_size": samples.len(), "resolution": "high"},
                {"type": "time", "data": time, "series_type": "distance", "original_size": samples.len(), "resolution": "high"}
            ])
        }
        None => json!([
            {"type": "latlng", "data": [[52.0, 4.0]], "series_type": "distance", "original_size": 1, "resolution": "high"}
        ]),
    }
}
