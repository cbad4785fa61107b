// FordPass HTTP client
//
// Wraps `reqwest::Client` with SSO token exchange, bearer-token
// injection, and response classification. Base URLs are configurable
// so tests can point the client at a mock server.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{
    CommandId, CommandResponse, CommandStatus, CommandStatusResponse, TokenResponse, TokenSet,
    VehicleDescriptor, VehicleListResponse, VehicleStatusEnvelope,
};
use crate::remote::RemoteControl;

const DEFAULT_SSO_URL: &str = "https://sso.ci.ford.com";
const DEFAULT_API_URL: &str = "https://usapi.cv.ford.com";
const OAUTH_CLIENT_ID: &str = "9fb503e0-715b-47e8-adfd-ad4b7770f73b";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the FordPass service.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// SSO base URL (token endpoints).
    pub sso_url: Url,
    /// Vehicle API base URL (commands, status, vehicle list).
    pub api_url: Url,
    pub username: String,
    pub password: SecretString,
    /// Per-account application id, sent on every vehicle API request.
    pub application_id: String,
    pub timeout: Duration,
}

impl ConnectionConfig {
    /// Build a config against the production endpoints.
    pub fn new(
        username: impl Into<String>,
        password: SecretString,
        application_id: impl Into<String>,
    ) -> Self {
        Self {
            sso_url: Url::parse(DEFAULT_SSO_URL).expect("default SSO URL"),
            api_url: Url::parse(DEFAULT_API_URL).expect("default API URL"),
            username: username.into(),
            password,
            application_id: application_id.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// HTTP client for the FordPass SSO + vehicle API.
///
/// Holds the current token set internally; [`authenticate`] must
/// succeed before any vehicle operation. Token renewal swaps the
/// stored set in place, so long-lived holders keep working across
/// renewals.
///
/// [`authenticate`]: RemoteControl::authenticate
pub struct ConnectionClient {
    http: reqwest::Client,
    config: ConnectionConfig,
    tokens: RwLock<Option<TokenSet>>,
}

impl ConnectionClient {
    pub fn new(config: ConnectionConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(Error::Transport)?;
        Ok(Self {
            http,
            config,
            tokens: RwLock::new(None),
        })
    }

    /// Create a client with a pre-built `reqwest::Client` (tests).
    pub fn with_client(http: reqwest::Client, config: ConnectionConfig) -> Self {
        Self {
            http,
            config,
            tokens: RwLock::new(None),
        }
    }

    // ── URL builders ─────────────────────────────────────────────────

    fn sso_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.config.sso_url.join(path)?)
    }

    fn api_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.config.api_url.join(path)?)
    }

    // ── Token plumbing ───────────────────────────────────────────────

    fn store_tokens(&self, tokens: TokenSet) -> TokenSet {
        *self.tokens.write().expect("token lock poisoned") = Some(tokens.clone());
        tokens
    }

    fn access_token(&self) -> Result<String, Error> {
        let guard = self.tokens.read().expect("token lock poisoned");
        guard
            .as_ref()
            .map(|t| t.access_token.expose_secret().to_owned())
            .ok_or(Error::Authentication {
                message: "not authenticated -- call authenticate() first".into(),
            })
    }

    fn refresh_token(&self) -> Result<String, Error> {
        let guard = self.tokens.read().expect("token lock poisoned");
        guard
            .as_ref()
            .map(|t| t.refresh_token.expose_secret().to_owned())
            .ok_or(Error::Authentication {
                message: "no refresh token -- call authenticate() first".into(),
            })
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenSet, Error> {
        let url = self.sso_url("oauth2/v1/token")?;
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("token request failed (HTTP {status}): {body}"),
            });
        }

        let raw: TokenResponse = parse_body(resp).await?;
        Ok(self.store_tokens(raw.into()))
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send an authenticated GET against the vehicle API.
    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = self
            .http
            .get(url)
            .bearer_auth(self.access_token()?)
            .header("Application-Id", &self.config.application_id)
            .send()
            .await
            .map_err(Error::Transport)?;
        classify(resp).await
    }

    /// Send an authenticated POST with JSON body against the vehicle API.
    async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &serde_json::Value,
    ) -> Result<T, Error> {
        debug!("POST {}", url);
        let resp = self
            .http
            .post(url)
            .bearer_auth(self.access_token()?)
            .header("Application-Id", &self.config.application_id)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;
        classify(resp).await
    }
}

/// Classify a vehicle API response: 401 means the token is stale,
/// other non-success statuses surface as API errors with a body
/// preview, and success bodies are deserialized.
async fn classify<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::TokenExpired);
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            message: body.chars().take(200).collect(),
            status: status.as_u16(),
        });
    }

    parse_body(resp).await
}

async fn parse_body<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let body = resp.text().await.map_err(Error::Transport)?;
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}

#[async_trait]
impl RemoteControl for ConnectionClient {
    async fn authenticate(&self) -> Result<TokenSet, Error> {
        let password = self.config.password.expose_secret().to_owned();
        let form = [
            ("client_id", OAUTH_CLIENT_ID),
            ("grant_type", "password"),
            ("username", self.config.username.as_str()),
            ("password", password.as_str()),
        ];
        let tokens = self.token_request(&form).await?;
        debug!(expires_in = tokens.expires_in_secs, "authenticated");
        Ok(tokens)
    }

    async fn renew_token(&self) -> Result<TokenSet, Error> {
        let refresh = self.refresh_token()?;
        let form = [
            ("client_id", OAUTH_CLIENT_ID),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh.as_str()),
        ];
        let tokens = self.token_request(&form).await?;
        debug!(expires_in = tokens.expires_in_secs, "token renewed");
        Ok(tokens)
    }

    async fn list_vehicles(&self) -> Result<Vec<VehicleDescriptor>, Error> {
        let url = self.api_url("api/vehicles")?;
        let resp: VehicleListResponse = self.get(url).await?;
        Ok(resp.vehicles)
    }

    async fn issue_command(
        &self,
        vehicle_id: &str,
        command_type: &str,
    ) -> Result<CommandId, Error> {
        let url = self.api_url(&format!("api/vehicles/{vehicle_id}/commands"))?;
        let body = serde_json::json!({ "type": command_type, "wakeUp": true });
        let resp: CommandResponse = self.post(url, &body).await?;
        debug!(vehicle_id, command_type, command_id = %resp.command_id, "command issued");
        Ok(resp.command_id)
    }

    async fn poll_command(
        &self,
        command_id: &CommandId,
        vehicle_id: &str,
        command_type: &str,
    ) -> Result<CommandStatus, Error> {
        let mut url =
            self.api_url(&format!("api/vehicles/{vehicle_id}/commands/{command_id}"))?;
        url.query_pairs_mut().append_pair("type", command_type);
        let resp: CommandStatusResponse = self.get(url).await?;
        Ok(resp.current_status)
    }

    async fn fetch_vehicle_status(
        &self,
        vehicle_id: &str,
    ) -> Result<VehicleStatusEnvelope, Error> {
        let url = self.api_url(&format!("api/vehicles/{vehicle_id}/status"))?;
        self.get(url).await
    }
}
