use derivative::Derivative;
use reqwest::Url;
use serde::Deserialize;
use serde::Serialize;

use crate::BuildOptions;
use crate::Error;
use crate::api::Pagination;

/// JSON:API root used when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://elearning.uni-bremen.de/jsonapi.php/v1/";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_owned()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Everything needed to expose one course.
///
/// Deserializable so the embedding application can load it from whatever
/// configuration format it uses. The password is never printed by `Debug`.
#[derive(Derivative, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[derivative(Debug)]
pub struct Options {
    /// Base URL of the Stud.IP JSON:API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Stud.IP login name.
    pub username: String,
    /// Stud.IP password.
    #[derivative(Debug = "ignore")]
    pub password: String,
    /// Course to expose.
    pub course_id: String,
    /// Sub-directory of the course tree exposed as the root. Empty for the
    /// whole course.
    #[serde(default)]
    pub root: String,
    /// Timeout of a single HTTP request.
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// How paginated collections are consumed.
    #[serde(default)]
    pub pagination: Pagination,
    /// Limits applied while building the snapshot.
    #[serde(default)]
    pub build: BuildOptions,
}

impl Options {
    /// Options for `course_id` with default settings.
    pub fn new(username: &str, password: &str, course_id: &str) -> Self {
        Self {
            base_url: default_base_url(),
            username: username.to_owned(),
            password: password.to_owned(),
            course_id: course_id.to_owned(),
            root: String::new(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            pagination: Pagination::default(),
            build: BuildOptions::default(),
        }
    }

    /// Checks the options and returns the base URL, always ending in `/` so
    /// relative endpoints join below it.
    pub fn validate(&self) -> Result<Url, Error> {
        if self.course_id.trim().is_empty() {
            return Err(Error::InvalidArgument("course_id is required".into()));
        }
        let mut base = self.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Url::parse(&base).map_err(|e| Error::InvalidArgument(format!("invalid base_url: {e}")))
    }
}
