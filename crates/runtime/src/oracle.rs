//! HTTP client for the remote oracle
//!
//! Three calls, always in this order: `PUT /token` once, `PUT /fuzz/new`
//! once, then `POST /fuzz/next` until the oracle answers `done`. Every
//! response may carry a fresh token which replaces the current one.

use crate::config::RunConfig;
use crate::errors::OracleError;
use monkey_types::{Command, Outcome, SpecIR, CLIENT_NAME, CLIENT_VERSION};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use std::time::Instant;
use tracing::debug;
use url::Url;

pub const API_KEY_HEADER: &str = "X-Api-Key";
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest {
    num_tests: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub name: &'static str,
    pub version: &'static str,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: CLIENT_NAME,
            version: CLIENT_VERSION,
        }
    }
}

/// Body of `PUT /fuzz/new`.
#[derive(Debug, Serialize)]
pub struct InitRequest<'a> {
    pub spec: &'a SpecIR,
    pub config: &'a RunConfig,
    pub client: ClientInfo,
}

impl<'a> InitRequest<'a> {
    pub fn new(spec: &'a SpecIR, config: &'a RunConfig) -> Self {
        Self {
            spec,
            config,
            client: ClientInfo::default(),
        }
    }
}

/// Oracle calls have no timeout: the oracle may legitimately think for a
/// long time before answering.
#[derive(Clone)]
pub struct OracleClient {
    base_url: Url,
    http: Client,
    api_key: String,
    token: Option<String>,
}

impl OracleClient {
    pub fn new(base_url: impl AsRef<str>, api_key: impl Into<String>) -> Result<Self, OracleError> {
        Self::with_http_client(base_url, api_key, Client::builder().build()?)
    }

    pub fn with_http_client(
        base_url: impl AsRef<str>,
        api_key: impl Into<String>,
        http: Client,
    ) -> Result<Self, OracleError> {
        let mut url = Url::parse(base_url.as_ref())
            .map_err(|_| OracleError::InvalidBaseUrl(base_url.as_ref().to_string()))?;
        if url.cannot_be_a_base() {
            return Err(OracleError::InvalidBaseUrl(base_url.as_ref().to_string()));
        }
        if !url.path().ends_with('/') {
            let mut path = url.path().trim_end_matches('/').to_owned();
            path.push('/');
            url.set_path(&path);
        }
        Ok(Self {
            base_url: url,
            http,
            api_key: api_key.into(),
            token: None,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// `PUT /token`. Must answer 201 with a token.
    pub async fn authenticate(&mut self, num_tests: u32) -> Result<(), OracleError> {
        let url = self.base_url.join("token")?;
        let request = self
            .http
            .put(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&TokenRequest { num_tests });

        let response = Self::send("token", request, StatusCode::CREATED).await?;
        let token =
            token_from(response.headers()).ok_or(OracleError::MissingToken("token"))?;
        self.token = Some(token);
        Ok(())
    }

    /// `PUT /fuzz/new`. Answers 201 with the first command.
    pub async fn init(&mut self, request: &InitRequest<'_>) -> Result<Command, OracleError> {
        self.exchange("fuzz/new", Method::PUT, request, StatusCode::CREATED)
            .await
    }

    /// `POST /fuzz/next`. Answers 200 with the next command.
    pub async fn next(&mut self, outcome: &Outcome) -> Result<Command, OracleError> {
        self.exchange("fuzz/next", Method::POST, outcome, StatusCode::OK)
            .await
    }

    async fn exchange<B>(
        &mut self,
        call: &'static str,
        method: Method,
        body: &B,
        expected: StatusCode,
    ) -> Result<Command, OracleError>
    where
        B: Serialize + ?Sized,
    {
        let token = self.token.as_deref().ok_or(OracleError::Unauthenticated)?;
        let url = self.base_url.join(call)?;
        let request = self
            .http
            .request(method, url)
            .header(AUTH_TOKEN_HEADER, token)
            .json(body);

        let response = Self::send(call, request, expected).await?;
        if let Some(token) = token_from(response.headers()) {
            self.token = Some(token);
        }
        let bytes = response.bytes().await?;
        let command = Command::decode(&bytes)?;
        debug!(call, command = %command.kind(), "oracle command");
        Ok(command)
    }

    async fn send(
        call: &'static str,
        request: RequestBuilder,
        expected: StatusCode,
    ) -> Result<Response, OracleError> {
        let started = Instant::now();
        let response = request.send().await?;
        debug!(
            call,
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "oracle round-trip"
        );

        if response.status() != expected {
            return Err(Self::map_unexpected(call, expected, response).await);
        }
        Ok(response)
    }

    async fn map_unexpected(call: &'static str, expected: StatusCode, response: Response) -> OracleError {
        let status = response.status().as_u16();
        let bytes = response.bytes().await.unwrap_or_default();
        OracleError::UnexpectedStatus {
            call,
            status,
            expected: expected.as_u16(),
            body: String::from_utf8_lossy(&bytes).trim().to_string(),
        }
    }
}

fn token_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
