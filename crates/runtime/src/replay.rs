//! Executes `req` commands against the target

use monkey_types::{user_agent, Evidence, Header, HttpRequest, RecordedRequest, RecordedResponse};
use reqwest::{redirect, Client};
use std::error::Error as StdError;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// Placeholder the oracle puts in `User-Agent` for the client to fill in.
pub const USER_AGENT_SENTINEL: &str = "{{monkey-user-agent}}";

/// Frozen host and port every request is rewritten to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug)]
pub struct Replayed {
    pub elapsed_micros: u64,
    /// Evidence, or why no response was received.
    pub result: Result<Evidence, String>,
}

#[derive(Debug, Clone)]
pub struct Replayer {
    http: Client,
    timeout: Duration,
}

impl Replayer {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self { http, timeout })
    }

    pub async fn replay(&self, request: &HttpRequest, target: &Target) -> Replayed {
        let started = Instant::now();
        let result = self.execute(request, target).await;
        let elapsed_micros = started.elapsed().as_micros() as u64;

        match &result {
            Ok(evidence) => debug!(
                method = %request.method,
                url = %evidence.request.url,
                status = evidence.response.status,
                elapsed_micros,
                "request replayed"
            ),
            Err(reason) => debug!(method = %request.method, %reason, elapsed_micros, "request failed"),
        }
        Replayed {
            elapsed_micros,
            result,
        }
    }

    async fn execute(&self, request: &HttpRequest, target: &Target) -> Result<Evidence, String> {
        let recorded = prepare(request, target)?;

        let method = reqwest::Method::from_bytes(recorded.method.as_str().as_bytes())
            .map_err(|err| err.to_string())?;
        let mut builder = self.http.request(method, recorded.url.as_str());
        for header in &recorded.headers {
            builder = builder.header(header.name.as_str(), header.value.as_str());
        }
        if let Some(body) = &recorded.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|err| self.describe(&err, target))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                Header::new(name.as_str(), String::from_utf8_lossy(value.as_bytes()))
            })
            .collect();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.describe(&err, target))?;

        let (body, json) = if bytes.is_empty() {
            (None, None)
        } else {
            (
                Some(String::from_utf8_lossy(&bytes).into_owned()),
                serde_json::from_slice(&bytes).ok(),
            )
        };

        Ok(Evidence {
            request: recorded,
            response: RecordedResponse {
                status: status.as_u16(),
                reason: status.canonical_reason().map(str::to_string),
                headers,
                body,
                json,
            },
        })
    }

    fn describe(&self, err: &reqwest::Error, target: &Target) -> String {
        if err.is_timeout() {
            return format!("no response from {target} within {:?}", self.timeout);
        }
        if err.is_connect() {
            return format!("could not connect to {target}: {}", error_chain(err));
        }
        error_chain(err)
    }
}

/// The request exactly as it will be sent: target rewritten, user agent
/// filled in and a JSON body serialized.
pub fn prepare(request: &HttpRequest, target: &Target) -> Result<RecordedRequest, String> {
    let mut url =
        Url::parse(&request.url).map_err(|err| format!("invalid URL {:?}: {err}", request.url))?;
    url.set_host(Some(target.host.as_str()))
        .map_err(|err| format!("invalid host {:?}: {err}", target.host))?;
    url.set_port(Some(target.port))
        .map_err(|_| format!("cannot set a port on {url}"))?;

    let mut headers: Vec<Header> = request
        .headers
        .iter()
        .map(|header| {
            if header.name.eq_ignore_ascii_case("user-agent") {
                Header::new(
                    header.name.as_str(),
                    header.value.replace(USER_AGENT_SENTINEL, &user_agent()),
                )
            } else {
                header.clone()
            }
        })
        .collect();

    let body = match &request.body {
        Some(value) => {
            if !headers
                .iter()
                .any(|header| header.name.eq_ignore_ascii_case("content-type"))
            {
                headers.push(Header::new("content-type", "application/json"));
            }
            Some(serde_json::to_string(value).map_err(|err| err.to_string())?)
        }
        None => None,
    };

    Ok(RecordedRequest {
        method: request.method,
        url: url.to_string(),
        headers,
        body,
    })
}

fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use monkey_types::Method;
    use serde_json::json;

    fn target() -> Target {
        Target {
            host: "127.0.0.1".into(),
            port: 8123,
        }
    }

    #[test]
    fn test_prepare_rewrites_target() {
        let request = HttpRequest {
            method: Method::Get,
            url: "http://example.invalid:80/v1/pets/7?verbose=true".into(),
            headers: vec![],
            body: None,
        };
        let recorded = prepare(&request, &target()).unwrap();
        assert_eq!(recorded.url, "http://127.0.0.1:8123/v1/pets/7?verbose=true");
        assert!(recorded.headers.is_empty());
        assert_eq!(recorded.body, None);
    }

    #[test]
    fn test_prepare_fills_user_agent_sentinel() {
        let request = HttpRequest {
            method: Method::Get,
            url: "http://localhost/".into(),
            headers: vec![
                Header::new("User-Agent", USER_AGENT_SENTINEL),
                Header::new("X-Echo", USER_AGENT_SENTINEL),
            ],
            body: None,
        };
        let recorded = prepare(&request, &target()).unwrap();
        assert_eq!(recorded.headers[0].value, user_agent());
        assert_eq!(recorded.headers[1].value, USER_AGENT_SENTINEL);
    }

    #[test]
    fn test_prepare_serializes_json_body() {
        let request = HttpRequest {
            method: Method::Post,
            url: "http://localhost/v1/pets".into(),
            headers: vec![],
            body: Some(json!({"name": "Rex"})),
        };
        let recorded = prepare(&request, &target()).unwrap();
        assert_eq!(recorded.body.as_deref(), Some(r#"{"name":"Rex"}"#));
        assert_eq!(
            recorded.headers,
            vec![Header::new("content-type", "application/json")]
        );

        let explicit = HttpRequest {
            headers: vec![Header::new("Content-Type", "application/merge-patch+json")],
            ..request
        };
        assert_eq!(prepare(&explicit, &target()).unwrap().headers.len(), 1);
    }

    #[test]
    fn test_prepare_rejects_bad_urls() {
        let request = HttpRequest {
            method: Method::Get,
            url: "/relative/only".into(),
            headers: vec![],
            body: None,
        };
        assert!(prepare(&request, &target()).unwrap_err().contains("invalid URL"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_a_reason() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let replayer = Replayer::new(Duration::from_secs(2)).unwrap();
        let request = HttpRequest {
            method: Method::Get,
            url: "http://localhost/health".into(),
            headers: vec![],
            body: None,
        };
        let target = Target {
            host: "127.0.0.1".into(),
            port,
        };
        let replayed = replayer.replay(&request, &target).await;
        let reason = replayed.result.unwrap_err();
        assert!(reason.starts_with("could not connect to 127.0.0.1:"), "{reason}");
    }
}
