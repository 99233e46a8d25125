// The shared dataset as a file in a GitHub repository, through the contents API.
//
// The blob sha returned by the API is the version token: an update carries the sha of
// the content it was built on, and GitHub refuses it if the file changed since.

use base64::{engine::general_purpose::STANDARD, Engine};
use log::{debug, warn};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::time::Duration;

use crate::survey::*;

const API_VERSION: &str = "2022-11-28";
const TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct GitHubSettings {
    /// owner/name
    pub repository: String,
    pub file_path: String,
    /// The default branch of the repository when not set.
    pub branch: Option<String>,
    pub token: String,
    pub api_url: String,
    pub create_message: String,
    pub update_message: String,
}

pub struct GitHubStore {
    settings: GitHubSettings,
    client: Client,
}

#[derive(Deserialize, Debug)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Serialize, Debug)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum Request {
    Fetch,
    Create,
    Update,
}

impl GitHubStore {
    pub fn new(settings: GitHubSettings) -> BSurveyResult<GitHubStore> {
        let client = Client::builder()
            .user_agent(concat!("vslsurvey/", env!("CARGO_PKG_VERSION")))
            .timeout(TIMEOUT)
            .build()
            .context(HttpClientSnafu {})?;
        Ok(GitHubStore { settings, client })
    }

    fn api(&self) -> &str {
        self.settings.api_url.trim_end_matches('/')
    }

    fn repository_url(&self) -> String {
        format!("{}/repos/{}", self.api(), self.settings.repository)
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/contents/{}",
            self.repository_url(),
            self.settings.file_path.trim_start_matches('/')
        )
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.settings.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    fn put(&self, content: &str, sha: Option<&str>) -> Result<Response, StoreFailure> {
        let message = match sha {
            Some(_) => self.settings.update_message.as_str(),
            None => self.settings.create_message.as_str(),
        };
        let body = PutRequest {
            message,
            content: STANDARD.encode(content.as_bytes()),
            sha,
            branch: self.settings.branch.as_deref(),
        };
        self.authorized(self.client.put(self.contents_url()))
            .json(&body)
            .send()
            .map_err(transport_failure)
    }

    /// Called after a 404 on the file: the dataset is only missing if the repository
    /// (and the branch) can be seen with these credentials.
    fn confirm_missing(&self) -> Result<Fetched, StoreFailure> {
        let url = match &self.settings.branch {
            Some(b) => format!("{}/branches/{}", self.repository_url(), b),
            None => self.repository_url(),
        };
        let resp = self
            .authorized(self.client.get(url))
            .send()
            .map_err(transport_failure)?;
        let status = resp.status().as_u16();
        match status {
            200 => {
                debug!("GitHubStore::fetch: {} does not exist yet", self.describe());
                Ok(Fetched::Missing)
            }
            404 => Err(StoreFailure::Rejected(format!(
                "repository {} (or its branch) not found with the given token",
                self.settings.repository
            ))),
            _ => Err(failure_for(Request::Fetch, status, is_rate_limited(&resp))),
        }
    }
}

impl DatasetStore for GitHubStore {
    fn fetch(&self) -> Result<Fetched, StoreFailure> {
        let url = match &self.settings.branch {
            Some(b) => format!("{}?ref={}", self.contents_url(), b),
            None => self.contents_url(),
        };
        let resp = self
            .authorized(self.client.get(url))
            .send()
            .map_err(transport_failure)?;
        let status = resp.status().as_u16();
        match status {
            200 => {
                let body: ContentsResponse = resp.json().map_err(|e| {
                    StoreFailure::Unavailable(format!("unreadable contents response: {}", e))
                })?;
                let content = decode_content(&body)?;
                Ok(Fetched::Found {
                    content,
                    version: VersionToken(body.sha),
                })
            }
            404 => self.confirm_missing(),
            _ => Err(failure_for(Request::Fetch, status, is_rate_limited(&resp))),
        }
    }

    fn create(&self, content: &str) -> Result<(), StoreFailure> {
        let resp = self.put(content, None)?;
        let status = resp.status().as_u16();
        match status {
            200 | 201 => Ok(()),
            _ => {
                let failure = failure_for(Request::Create, status, is_rate_limited(&resp));
                debug!("GitHubStore::create: status {} -> {:?}", status, failure);
                Err(failure)
            }
        }
    }

    fn update(&self, content: &str, version: &VersionToken) -> Result<(), StoreFailure> {
        let resp = self.put(content, Some(version.0.as_str()))?;
        let status = resp.status().as_u16();
        match status {
            200 | 201 => Ok(()),
            _ => {
                let failure = failure_for(Request::Update, status, is_rate_limited(&resp));
                debug!("GitHubStore::update: status {} -> {:?}", status, failure);
                Err(failure)
            }
        }
    }

    fn describe(&self) -> String {
        match &self.settings.branch {
            Some(b) => format!(
                "github:{}/{}@{}",
                self.settings.repository, self.settings.file_path, b
            ),
            None => format!(
                "github:{}/{}",
                self.settings.repository, self.settings.file_path
            ),
        }
    }
}

fn transport_failure(e: reqwest::Error) -> StoreFailure {
    warn!("GitHubStore: request failed: {}", e);
    StoreFailure::Unavailable(e.to_string())
}

fn is_rate_limited(resp: &Response) -> bool {
    resp.headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false)
}

fn failure_for(request: Request, status: u16, rate_limited: bool) -> StoreFailure {
    match status {
        409 | 422 => StoreFailure::Stale,
        404 if request == Request::Update => StoreFailure::Vanished,
        401 | 403 | 429 if rate_limited || status == 429 => {
            StoreFailure::Unavailable(format!("rate limited (HTTP {})", status))
        }
        401 => StoreFailure::Rejected("the access token was refused (HTTP 401)".to_string()),
        403 => StoreFailure::Rejected(
            "the access token does not allow writing to this repository (HTTP 403)".to_string(),
        ),
        404 => StoreFailure::Rejected("repository not found (HTTP 404)".to_string()),
        400..=499 => StoreFailure::Rejected(format!("HTTP {}", status)),
        _ => StoreFailure::Unavailable(format!("HTTP {}", status)),
    }
}

fn decode_content(body: &ContentsResponse) -> Result<String, StoreFailure> {
    if body.encoding != "base64" {
        // Files over 1MB come back without content.
        return Err(StoreFailure::Rejected(format!(
            "the dataset cannot be read through the contents API (encoding {:?})",
            body.encoding
        )));
    }
    let cleaned: String = body
        .content
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| StoreFailure::Unavailable(format!("invalid base64 content: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|_| StoreFailure::Rejected("the dataset is not valid UTF-8".to_string()))
}
