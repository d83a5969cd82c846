use reqwest::StatusCode;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("environment variable {0} is required")]
    MissingEnv(&'static str),

    #[error("environment variable {name} has an invalid value {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: StatusCode },

    /// The provider answered, but not with what we asked for.
    #[error("malformed response for {context}: {reason}")]
    Malformed { context: String, reason: String },

    #[error("no matching activities to export")]
    NoActivities,

    #[error("cannot write non-finite number {0} as JSON")]
    NonFiniteNumber(f64),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("written file is not valid JSON: {0}")]
    InvalidOutput(#[source] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn malformed(context: impl Into<String>, reason: impl ToString) -> Self {
        Error::Malformed {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// True when the fault originated at the provider rather than in this process.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::Http { .. } | Error::Status { .. } | Error::Malformed { .. }
        )
    }
}

impl warp::reject::Reject for Error {}
