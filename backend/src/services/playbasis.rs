//! HTTP client for the Playbasis rewards service.
//!
//! Every endpoint answers with the same envelope:
//! `{"success": bool, "error_code": "0000", "message": "...", "response": ...}`.

use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use shared::{PlayResponse, PlaySource, Rule, RuleSource, ServiceError};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub const TRANSPORT_ERROR_CODE: &str = "TRANSPORT";
pub const PLAYER_ID_MISSING_CODE: &str = "PLAYER_ID_MISSING";
pub const TOKEN_EXPIRED_CODE: &str = "0002";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    error_code: Option<serde_json::Value>,
    #[serde(default)]
    message: String,
    response: Option<T>,
}

impl<T> Envelope<T> {
    fn code(&self) -> String {
        match &self.error_code {
            Some(serde_json::Value::String(code)) => code.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    fn into_result(self) -> Result<Option<T>, ServiceError> {
        if self.success {
            Ok(self.response)
        } else {
            Err(ServiceError::new(self.code(), self.message))
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
}

fn transport_error(err: reqwest::Error) -> ServiceError {
    ServiceError::new(TRANSPORT_ERROR_CODE, err.to_string())
}

pub struct PlaybasisClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    token: RwLock<Option<String>>,
}

impl PlaybasisClient {
    pub fn new(base_url: &str, api_key: &str, api_secret: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Envelope<T>, ServiceError> {
        let response = request.send().await.map_err(transport_error)?;
        response.json::<Envelope<T>>().await.map_err(transport_error)
    }

    async fn authenticate(&self) -> Result<String, ServiceError> {
        let form = [("api_key", self.api_key.as_str()), ("api_secret", self.api_secret.as_str())];
        let envelope: Envelope<AuthResponse> = self.send(self.client.post(self.url("/Auth")).form(&form)).await?;
        let auth = envelope
            .into_result()?
            .ok_or_else(|| ServiceError::new("AUTH", "Auth response carried no token"))?;
        debug!("Authenticated with the rewards service");
        Ok(auth.token)
    }

    async fn token(&self) -> Result<String, ServiceError> {
        let cached = self.token.read().await.clone();
        if let Some(token) = cached {
            return Ok(token);
        }
        let token = self.authenticate().await?;
        *self.token.write().await = Some(token.clone());
        Ok(token)
    }

    async fn post_rule(
        &self,
        token: &str,
        action: &str,
        player_id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Envelope<PlayResponse>, ServiceError> {
        let mut form: Vec<(&str, &str)> = vec![("token", token), ("action", action), ("player_id", player_id)];
        form.extend(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        self.send(self.client.post(self.url("/Engine/rule")).form(&form)).await
    }

    pub async fn rules(&self, action: &str) -> Result<Vec<Rule>, ServiceError> {
        let request = self
            .client
            .get(self.url("/Engine/rules"))
            .query(&[("api_key", self.api_key.as_str()), ("action", action)]);
        let envelope: Envelope<Vec<Rule>> = self.send(request).await?;
        let rules = envelope.into_result()?.unwrap_or_default();
        debug!("Fetched {} rules for action '{}'", rules.len(), action);
        Ok(rules)
    }

    pub async fn play(
        &self,
        action: &str,
        player_id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Option<PlayResponse>, ServiceError> {
        if player_id.trim().is_empty() {
            return Err(ServiceError::new(PLAYER_ID_MISSING_CODE, "Player id is required"));
        }

        let token = self.token().await?;
        let mut envelope = self.post_rule(&token, action, player_id, params).await?;
        if !envelope.success && envelope.code() == TOKEN_EXPIRED_CODE {
            warn!("Rewards service token expired, authenticating again");
            *self.token.write().await = None;
            let token = self.token().await?;
            envelope = self.post_rule(&token, action, player_id, params).await?;
        }
        envelope.into_result()
    }
}

impl RuleSource for PlaybasisClient {
    async fn fetch_rules(&self, action: &str) -> Result<Vec<Rule>, ServiceError> {
        self.rules(action).await
    }
}

impl PlaySource for PlaybasisClient {
    async fn execute_rule(
        &self,
        action: &str,
        player_id: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Option<PlayResponse>, ServiceError> {
        self.play(action, player_id, params).await
    }
}
