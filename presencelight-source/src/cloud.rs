//! Cloud directory status source.
//!
//! Polls a directory presence endpoint (Microsoft Graph shaped) for the
//! user's availability. Token acquisition is silent-cache-first with an
//! interactive device-code fallback; the credential is cached on the
//! adapter and invalidated on any authentication or transport failure so
//! the next cycle re-authenticates. One bad network call never escapes
//! `read`: the previous status is returned instead, at the cost of
//! staleness.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use presencelight_core::config::CloudDirectoryConfig;
use presencelight_core::{normalize, CanonicalStatus, ConfigError, NormalizedReading, StatusSource};

use crate::error::SourceError;

/// A bearer credential for the presence endpoint.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
}

/// Directory collaborator: token acquisition plus the presence call.
///
/// Faked in tests; the production implementation is [`RestDirectoryApi`].
#[async_trait]
pub trait DirectoryApi: Send {
    /// Redeem a cached credential without user interaction.
    async fn acquire_silent(&mut self) -> Result<AccessToken, SourceError>;

    /// Interactive fallback (device-code prompt). Must observe `cancel`.
    async fn acquire_interactive(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<AccessToken, SourceError>;

    /// Fetch the raw availability token for the signed-in user.
    async fn fetch_availability(&mut self, token: &AccessToken) -> Result<String, SourceError>;
}

/// Polls a directory presence endpoint.
pub struct CloudDirectorySource {
    api: Box<dyn DirectoryApi>,
    interval: Duration,
    token: Option<AccessToken>,
    last_status: CanonicalStatus,
}

impl CloudDirectorySource {
    pub fn new(
        config: &CloudDirectoryConfig,
        api: Box<dyn DirectoryApi>,
    ) -> Result<Self, ConfigError> {
        if config.interval_secs == 0 {
            return Err(ConfigError::NonPositiveInterval {
                section: "cloud-directory",
            });
        }
        Ok(Self {
            api,
            interval: Duration::from_secs(config.interval_secs),
            token: None,
            last_status: CanonicalStatus::Unknown,
        })
    }

    async fn poll(&mut self, cancel: &CancellationToken) -> Result<String, SourceError> {
        let token = match &self.token {
            Some(token) => token.clone(),
            None => {
                let token = match self.api.acquire_silent().await {
                    Ok(token) => token,
                    Err(err) => {
                        debug!(error = %err, "silent token acquisition failed; trying interactive");
                        self.api.acquire_interactive(cancel).await?
                    }
                };
                info!("directory authentication succeeded");
                self.token = Some(token.clone());
                token
            }
        };
        self.api.fetch_availability(&token).await
    }
}

#[async_trait]
impl StatusSource for CloudDirectorySource {
    fn poll_interval(&self) -> Duration {
        self.interval
    }

    async fn read(&mut self, cancel: &CancellationToken) -> CanonicalStatus {
        match self.poll(cancel).await {
            Ok(raw) => match normalize(&raw, "cloud-directory") {
                NormalizedReading::Mapped(status) => {
                    if status != self.last_status {
                        info!(status = %status, "cloud directory presence status changed");
                        self.last_status = status;
                    }
                }
                NormalizedReading::Ignore => {}
                NormalizedReading::Unmapped => self.last_status = CanonicalStatus::Unknown,
            },
            Err(err) => {
                // Invalidate the credential so the next cycle starts a
                // fresh acquisition instead of replaying a dead token.
                self.token = None;
                warn!(error = %err, "cloud directory poll failed; keeping previous status");
            }
        }
        self.last_status
    }
}

// ---------------------------------------------------------------------------
// Production REST implementation
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    interval: u64,
    expires_in: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
}

#[derive(Deserialize)]
struct PresenceResponse {
    availability: String,
}

/// OAuth device-code flow plus the presence call, over `reqwest`.
pub struct RestDirectoryApi {
    http: reqwest::Client,
    config: CloudDirectoryConfig,
    refresh_token: Option<String>,
}

impl RestDirectoryApi {
    pub fn new(config: CloudDirectoryConfig) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            config,
            refresh_token: None,
        })
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.config.authority.trim_end_matches('/'),
            self.config.tenant_id
        )
    }

    fn device_code_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/devicecode",
            self.config.authority.trim_end_matches('/'),
            self.config.tenant_id
        )
    }

    fn scope(&self) -> String {
        self.config.scopes.join(" ")
    }

    async fn redeem(&mut self, params: &[(&str, &str)]) -> Result<AccessToken, SourceError> {
        let response = self
            .http
            .post(self.token_url())
            .form(params)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response
                .json::<TokenErrorResponse>()
                .await
                .map(|e| e.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(SourceError::Auth(detail));
        }
        let tokens: TokenResponse = response.json().await?;
        if let Some(refresh) = tokens.refresh_token {
            self.refresh_token = Some(refresh);
        }
        Ok(AccessToken {
            value: tokens.access_token,
        })
    }
}

#[async_trait]
impl DirectoryApi for RestDirectoryApi {
    async fn acquire_silent(&mut self) -> Result<AccessToken, SourceError> {
        let Some(refresh) = self.refresh_token.clone() else {
            return Err(SourceError::Auth("no cached credential".to_owned()));
        };
        let client_id = self.config.client_id.clone();
        let scope = self.scope();
        self.redeem(&[
            ("grant_type", "refresh_token"),
            ("client_id", &client_id),
            ("refresh_token", &refresh),
            ("scope", &scope),
        ])
        .await
    }

    async fn acquire_interactive(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<AccessToken, SourceError> {
        let response = self
            .http
            .post(self.device_code_url())
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("scope", &self.scope()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let grant: DeviceCodeResponse = response.json().await?;

        info!(
            uri = %grant.verification_uri,
            code = %grant.user_code,
            "interactive sign-in required: open the verification page and enter the code"
        );

        let poll_every = Duration::from_secs(grant.interval.max(1));
        let deadline = tokio::time::Instant::now() + Duration::from_secs(grant.expires_in);
        let client_id = self.config.client_id.clone();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(SourceError::Auth("sign-in cancelled by shutdown".to_owned()));
                }
                _ = tokio::time::sleep(poll_every) => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SourceError::Auth("device code expired".to_owned()));
            }
            match self
                .redeem(&[
                    ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                    ("client_id", &client_id),
                    ("device_code", &grant.device_code),
                ])
                .await
            {
                Ok(token) => return Ok(token),
                Err(SourceError::Auth(detail)) if detail == "authorization_pending" => continue,
                Err(err) => return Err(err),
            }
        }
    }

    async fn fetch_availability(&mut self, token: &AccessToken) -> Result<String, SourceError> {
        let response = self
            .http
            .get(&self.config.presence_url)
            .bearer_auth(&token.value)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SourceError::Protocol(format!(
                "presence endpoint answered {}",
                response.status()
            )));
        }
        let presence: PresenceResponse = response.json().await?;
        Ok(presence.availability)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
