//! Alert delivery for vulnerable packages.
//!
//! Two targets are supported: a Slack incoming webhook and a GitHub issue.
//! Credentials come from the environment (`SLACK_WEBHOOK`, `GITHUB_TOKEN`,
//! `GITHUB_REPO`) with `[notify]` config values as fallback.

use crate::config::NotifyConfig;
use crate::model::VulnerabilityMatch;
use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use tracing::{info, warn};

const ISSUE_TITLE: &str = "Vulnerable packages detected";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NotifyMethod {
    Slack,
    Github,
}

/// Resolved notification credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifySettings {
    pub slack_webhook: Option<String>,
    pub github_token: Option<String>,
    pub github_repo: Option<String>,
    pub github_api: String,
}

impl NotifySettings {
    pub fn from_env_and_config(config: &NotifyConfig) -> Self {
        Self::resolve(config, |key| std::env::var(key).ok())
    }

    fn resolve(config: &NotifyConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Self {
            slack_webhook: non_empty(env("SLACK_WEBHOOK")).or_else(|| config.slack_webhook.clone()),
            github_token: non_empty(env("GITHUB_TOKEN")),
            github_repo: non_empty(env("GITHUB_REPO")).or_else(|| config.github_repo.clone()),
            github_api: config.github_api.clone(),
        }
    }
}

/// Builds the plain-text alert body, one line per match.
pub fn format_alert(matches: &[VulnerabilityMatch]) -> String {
    let mut message = String::from("[patchwatch] Vulnerabilities detected:\n");
    for m in matches {
        message.push_str(&format!(
            "- {} {} | CVE: {}\n",
            m.package_name, m.package_version, m.identifier
        ));
    }
    message
}

#[derive(Serialize)]
struct SlackMessage<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GithubIssue<'a> {
    title: &'a str,
    body: &'a str,
}

pub struct SlackNotifier {
    client: reqwest::Client,
    webhook: String,
}

impl SlackNotifier {
    pub fn new(webhook: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook: webhook.into(),
        }
    }

    pub async fn send(&self, message: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook)
            .json(&SlackMessage { text: message })
            .send()
            .await
            .context("Failed to reach Slack webhook")?;

        if !response.status().is_success() {
            bail!("Slack webhook returned HTTP {}", response.status());
        }
        Ok(())
    }
}

pub struct GithubNotifier {
    client: reqwest::Client,
    api_base: String,
    token: String,
    repo: String,
}

impl GithubNotifier {
    pub fn new(
        api_base: impl Into<String>,
        token: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            token: token.into(),
            repo: repo.into(),
        }
    }

    fn issues_url(&self) -> String {
        format!(
            "{}/repos/{}/issues",
            self.api_base.trim_end_matches('/'),
            self.repo
        )
    }

    pub async fn send(&self, message: &str) -> Result<()> {
        let response = self
            .client
            .post(self.issues_url())
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", concat!("patchwatch/", env!("CARGO_PKG_VERSION")))
            .json(&GithubIssue {
                title: ISSUE_TITLE,
                body: message,
            })
            .send()
            .await
            .context("Failed to reach GitHub API")?;

        if !response.status().is_success() {
            bail!("GitHub API returned HTTP {}", response.status());
        }
        Ok(())
    }
}

/// Sends an alert for `matches` through `method`.
///
/// Returns `Ok(false)` when there is nothing to send or the target is not
/// configured.
pub async fn send_alert(
    matches: &[VulnerabilityMatch],
    method: NotifyMethod,
    settings: &NotifySettings,
) -> Result<bool> {
    if matches.is_empty() {
        return Ok(false);
    }

    let message = format_alert(matches);

    match method {
        NotifyMethod::Slack => {
            let Some(webhook) = &settings.slack_webhook else {
                warn!("SLACK_WEBHOOK is not set, skipping Slack notification");
                return Ok(false);
            };
            SlackNotifier::new(webhook).send(&message).await?;
        }
        NotifyMethod::Github => {
            let (Some(token), Some(repo)) = (&settings.github_token, &settings.github_repo) else {
                warn!("GITHUB_TOKEN or GITHUB_REPO is not set, skipping GitHub notification");
                return Ok(false);
            };
            GithubNotifier::new(&settings.github_api, token, repo)
                .send(&message)
                .await?;
        }
    }

    info!(method = ?method, matches = matches.len(), "Alert sent");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PackageRecord;
    use std::collections::HashMap;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_matches() -> Vec<VulnerabilityMatch> {
        let openssl = PackageRecord::new("openssl", "1.1.1");
        vec![
            VulnerabilityMatch::from_hit(&openssl, "CVE-2021-0001"),
            VulnerabilityMatch::from_hit(&openssl, "CVE-2021-0002"),
        ]
    }

    #[test]
    fn test_format_alert() {
        assert_eq!(
            format_alert(&sample_matches()),
            "[patchwatch] Vulnerabilities detected:\n\
             - openssl 1.1.1 | CVE: CVE-2021-0001\n\
             - openssl 1.1.1 | CVE: CVE-2021-0002\n"
        );
    }

    #[test]
    fn test_settings_env_overrides_config() {
        let config = NotifyConfig {
            slack_webhook: Some("https://config.example/hook".into()),
            github_repo: Some("config/repo".into()),
            ..NotifyConfig::default()
        };
        let env: HashMap<&str, &str> = [
            ("SLACK_WEBHOOK", "https://env.example/hook"),
            ("GITHUB_TOKEN", "ghp_test"),
            ("GITHUB_REPO", ""),
        ]
        .into_iter()
        .collect();

        let settings = NotifySettings::resolve(&config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(settings.slack_webhook.as_deref(), Some("https://env.example/hook"));
        assert_eq!(settings.github_token.as_deref(), Some("ghp_test"));
        assert_eq!(settings.github_repo.as_deref(), Some("config/repo"));
        assert_eq!(settings.github_api, "https://api.github.com");
    }

    #[tokio::test]
    async fn test_slack_notification() {
        let server = MockServer::start().await;
        let expected = format_alert(&sample_matches());

        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_json(serde_json::json!({ "text": expected })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let settings = NotifySettings {
            slack_webhook: Some(format!("{}/hook", server.uri())),
            ..NotifySettings::default()
        };

        let sent = send_alert(&sample_matches(), NotifyMethod::Slack, &settings)
            .await
            .unwrap();
        assert!(sent);
    }

    #[tokio::test]
    async fn test_github_issue_notification() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/repos/acme/infra/issues"))
            .and(header("Authorization", "token ghp_test"))
            .and(body_json(serde_json::json!({
                "title": ISSUE_TITLE,
                "body": format_alert(&sample_matches()),
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let settings = NotifySettings {
            github_token: Some("ghp_test".into()),
            github_repo: Some("acme/infra".into()),
            github_api: server.uri(),
            ..NotifySettings::default()
        };

        let sent = send_alert(&sample_matches(), NotifyMethod::Github, &settings)
            .await
            .unwrap();
        assert!(sent);
    }

    #[tokio::test]
    async fn test_github_error_status_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let notifier = GithubNotifier::new(server.uri(), "bad", "acme/infra");
        let err = notifier.send("hello").await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_missing_credentials_skip() {
        let settings = NotifySettings::default();
        assert!(!send_alert(&sample_matches(), NotifyMethod::Slack, &settings)
            .await
            .unwrap());
        assert!(!send_alert(&sample_matches(), NotifyMethod::Github, &settings)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_no_matches_nothing_sent() {
        let settings = NotifySettings {
            slack_webhook: Some("http://127.0.0.1:9/unreachable".into()),
            ..NotifySettings::default()
        };
        assert!(!send_alert(&[], NotifyMethod::Slack, &settings).await.unwrap());
    }
}
