use crate::survey::io_github::GitHubSettings;
use crate::survey::*;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use survey_form::RetryPolicy;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_EXPORT_PATH: &str = "vsl_responses.csv";
pub const DEFAULT_PROVIDER: &str = "github";
pub const DEFAULT_REPOSITORY: &str = "abdhulkhadhir/qd_visualiser";
pub const DEFAULT_DATASET_PATH: &str = "responses.csv";
pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_CREATE_MESSAGE: &str = "Create VSL responses";
pub const DEFAULT_UPDATE_MESSAGE: &str = "Update VSL responses";

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputSettings {
    #[serde(rename = "exportPath")]
    pub export_path: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageSettings {
    pub provider: Option<String>,
    pub repository: Option<String>,
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
    pub branch: Option<String>,
    #[serde(rename = "tokenEnv")]
    pub token_env: Option<String>,
    #[serde(rename = "apiUrl")]
    pub api_url: Option<String>,
    #[serde(rename = "createMessage")]
    pub create_message: Option<String>,
    #[serde(rename = "updateMessage")]
    pub update_message: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct RetrySettings {
    #[serde(rename = "maxAttempts")]
    pub max_attempts: Option<u32>,
    #[serde(rename = "backoffMillis")]
    pub backoff_millis: Option<u64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct SurveyConfig {
    #[serde(rename = "outputSettings", default)]
    pub output_settings: OutputSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub retry: RetrySettings,
}

/// Where the shared dataset lives.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum StorageProvider {
    GitHub(GitHubSettings),
    File(PathBuf),
    NoStorage,
}

impl StorageSettings {
    pub fn provider(&self) -> BSurveyResult<StorageProvider> {
        self.provider_with_env(|name| std::env::var(name).ok())
    }

    /// Resolves the provider, looking up the access token with the given function.
    pub fn provider_with_env(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> BSurveyResult<StorageProvider> {
        let provider = self
            .provider
            .clone()
            .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());
        let file_path = self
            .file_path
            .clone()
            .unwrap_or_else(|| DEFAULT_DATASET_PATH.to_string());
        match provider.as_str() {
            "github" => {
                let env_var = self
                    .token_env
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TOKEN_ENV.to_string());
                let token = lookup(&env_var)
                    .filter(|t| !t.trim().is_empty())
                    .context(MissingTokenSnafu {
                        env_var: env_var.clone(),
                    })?;
                Ok(StorageProvider::GitHub(GitHubSettings {
                    repository: self
                        .repository
                        .clone()
                        .unwrap_or_else(|| DEFAULT_REPOSITORY.to_string()),
                    file_path,
                    branch: self.branch.clone(),
                    token,
                    api_url: self
                        .api_url
                        .clone()
                        .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                    create_message: self
                        .create_message
                        .clone()
                        .unwrap_or_else(|| DEFAULT_CREATE_MESSAGE.to_string()),
                    update_message: self
                        .update_message
                        .clone()
                        .unwrap_or_else(|| DEFAULT_UPDATE_MESSAGE.to_string()),
                }))
            }
            "file" => match &self.file_path {
                Some(p) => Ok(StorageProvider::File(PathBuf::from(p))),
                None => Err(Box::new(SurveyError::MissingStorageSetting {
                    provider: provider.clone(),
                    setting: "filePath".to_string(),
                })),
            },
            "none" => Ok(StorageProvider::NoStorage),
            x => Err(Box::new(SurveyError::UnknownProvider {
                provider: x.to_string(),
            })),
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        let default = RetryPolicy::DEFAULT_POLICY;
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(default.max_attempts),
            backoff: self
                .backoff_millis
                .map(Duration::from_millis)
                .unwrap_or(default.backoff),
        }
    }
}

pub fn read_config(path: &str) -> BSurveyResult<SurveyConfig> {
    let contents = fs::read_to_string(path).context(OpeningConfigSnafu { path })?;
    let config: SurveyConfig =
        serde_json::from_str(&contents).context(ParsingConfigSnafu { path })?;
    Ok(config)
}
