// ABOUTME: HTTP execution engine: request dispatch, last-response snapshot, extraction

use crate::ast::{Assertion, Auth, ExtractKind, Method, RequestOptions};
use crate::error::ScriptError;
use crate::jsonpath;
use crate::value::Value;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::collections::HashMap;
use std::io::Read;
use std::time::{Duration, Instant};

const USER_AGENT: &str = concat!("httpscript/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_IDLE_CONNECTIONS: usize = 100;
const MAX_IDLE_PER_HOST: usize = 10;
const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// The single stored record of the most recent response. Overwritten by the
/// next request. A transport failure stores a zero-status sentinel so
/// scripts can inspect and react.
#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub body_bytes: Vec<u8>,
    pub body: String,
    /// Header map with canonicalized names (e.g. `X-Request-Id`).
    pub headers: HashMap<String, String>,
    pub elapsed_ms: u64,
    pub url: String,
    pub method: String,
}

impl ResponseSnapshot {
    fn failure(method: &str, url: &str, elapsed: Duration) -> Self {
        ResponseSnapshot {
            status: 0,
            body_bytes: Vec::new(),
            body: String::new(),
            headers: HashMap::new(),
            elapsed_ms: elapsed.as_millis() as u64,
            url: url.to_string(),
            method: method.to_string(),
        }
    }
}

/// One engine per interpreter: owns the agent (connection pool + cookie
/// jar), the base-URL prefix, and the last-response snapshot.
pub struct HttpEngine {
    agent: ureq::Agent,
    base_url: Option<String>,
    default_timeout: Duration,
    last: Option<ResponseSnapshot>,
}

impl Default for HttpEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpEngine {
    pub fn new() -> Self {
        HttpEngine {
            agent: build_agent(),
            base_url: None,
            default_timeout: DEFAULT_TIMEOUT,
            last: None,
        }
    }

    pub fn last(&self) -> Option<&ResponseSnapshot> {
        self.last.as_ref()
    }

    pub fn set_base_url(&mut self, base: impl Into<String>) {
        self.base_url = Some(base.into());
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn set_default_timeout(&mut self, timeout: Duration) {
        self.default_timeout = timeout;
    }

    /// Drops all accumulated cookies by rebuilding the agent.
    pub fn clear_cookies(&mut self) {
        self.agent = build_agent();
    }

    /// Wipes engine state: cookies, base URL, and the last response.
    pub fn reset(&mut self) {
        self.agent = build_agent();
        self.base_url = None;
        self.default_timeout = DEFAULT_TIMEOUT;
        self.last = None;
    }

    /// Prefix relative URLs with the configured base; absolute URLs pass
    /// through untouched.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                url.trim_start_matches('/')
            ),
            None => url.to_string(),
        }
    }

    /// Execute a request. All option strings must already be
    /// variable-expanded. I/O failures do not error: the snapshot becomes a
    /// zero-status sentinel and a synthetic failure value is returned so
    /// the script keeps running.
    pub fn execute(&mut self, method: Method, url: &str, opts: &RequestOptions) -> Value {
        let url = self.resolve_url(url);
        log::debug!("{} {}", method.as_str(), url);

        let started = Instant::now();
        let mut req = self.agent.request(method.as_str(), &url);
        req = req.timeout(
            opts.timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(self.default_timeout),
        );

        if opts.json.is_some()
            && !opts
                .headers
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        {
            req = req.set("Content-Type", "application/json");
        }
        for (name, value) in &opts.headers {
            req = req.set(name, value);
        }
        match &opts.auth {
            Some(Auth::Basic { user, pass }) => {
                let encoded = BASE64.encode(format!("{}:{}", user, pass));
                req = req.set("Authorization", &format!("Basic {}", encoded));
            }
            Some(Auth::Bearer(token)) => {
                req = req.set("Authorization", &format!("Bearer {}", token));
            }
            None => {}
        }

        let body = opts.json.as_deref().or(opts.body.as_deref());
        let result = match body {
            Some(payload) => req.send_string(payload),
            None => req.call(),
        };

        // Non-2xx statuses are real responses, not failures.
        let resp = match result {
            Ok(resp) => resp,
            Err(ureq::Error::Status(_, resp)) => resp,
            Err(err) => {
                log::warn!("{} {} failed: {}", method.as_str(), url, err);
                self.last = Some(ResponseSnapshot::failure(
                    method.as_str(),
                    &url,
                    started.elapsed(),
                ));
                return Value::Str(format!("{} {} failed: {}", method.as_str(), url, err));
            }
        };

        let status = resp.status();
        let mut headers = HashMap::new();
        for name in resp.headers_names() {
            if let Some(value) = resp.header(&name) {
                headers.insert(canonical_header_name(&name), value.to_string());
            }
        }

        let mut body_bytes = Vec::new();
        if let Err(err) = resp
            .into_reader()
            .take(MAX_BODY_BYTES)
            .read_to_end(&mut body_bytes)
        {
            log::warn!("{} {} body read failed: {}", method.as_str(), url, err);
            self.last = Some(ResponseSnapshot::failure(
                method.as_str(),
                &url,
                started.elapsed(),
            ));
            return Value::Str(format!("{} {} failed: {}", method.as_str(), url, err));
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let body = String::from_utf8_lossy(&body_bytes).into_owned();
        self.last = Some(ResponseSnapshot {
            status,
            body_bytes,
            body,
            headers,
            elapsed_ms,
            url: url.clone(),
            method: method.as_str().to_string(),
        });

        Value::Str(format!(
            "{} {} -> {} ({} ms)",
            method.as_str(),
            url,
            status,
            elapsed_ms
        ))
    }

    /// Evaluate an extraction against the last response. Never fails: a
    /// missing response, unparsable body, or bad pattern yields the empty
    /// string plus a warning message.
    pub fn extract(&self, kind: ExtractKind, pattern: Option<&str>) -> (Value, Option<String>) {
        let last = match &self.last {
            Some(last) => last,
            None => {
                return (
                    Value::Str(String::new()),
                    Some("no response yet; extract before any request yields empty".to_string()),
                )
            }
        };

        match kind {
            ExtractKind::Status => (Value::Number(last.status as f64), None),
            ExtractKind::Header => {
                let name = canonical_header_name(pattern.unwrap_or(""));
                let value = last.headers.get(&name).cloned().unwrap_or_default();
                (Value::Str(value), None)
            }
            ExtractKind::JsonPath => {
                let doc: serde_json::Value = match serde_json::from_str(&last.body) {
                    Ok(doc) => doc,
                    Err(err) => {
                        return (
                            Value::Str(String::new()),
                            Some(format!("response body is not valid JSON: {}", err)),
                        )
                    }
                };
                match jsonpath::query(&doc, pattern.unwrap_or("$")) {
                    Ok(Value::Null) => (Value::Str(String::new()), None),
                    Ok(value) => (value, None),
                    Err(err) => (Value::Str(String::new()), Some(err.to_string())),
                }
            }
            ExtractKind::Regex => {
                let pattern = pattern.unwrap_or("");
                let re = match regex::Regex::new(pattern) {
                    Ok(re) => re,
                    Err(err) => {
                        return (
                            Value::Str(String::new()),
                            Some(format!("invalid regex '{}': {}", pattern, err)),
                        )
                    }
                };
                let value = match re.captures(&last.body) {
                    Some(caps) => caps
                        .get(1)
                        .or_else(|| caps.get(0))
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default(),
                    None => String::new(),
                };
                (Value::Str(value), None)
            }
            ExtractKind::XPath => {
                // Deliberately minimal: only //tag, via a regex over the body.
                let tag = match pattern.unwrap_or("").strip_prefix("//") {
                    Some(tag) if !tag.is_empty() && tag.chars().all(|c| c.is_ascii_alphanumeric()) => {
                        tag
                    }
                    _ => {
                        return (
                            Value::Str(String::new()),
                            Some("xpath supports only the //tag form".to_string()),
                        )
                    }
                };
                let re = regex::Regex::new(&format!(r"(?s)<{tag}[^>]*>(.*?)</{tag}>"))
                    .expect("tag chars are alphanumeric");
                let value = re
                    .captures(&last.body)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                (Value::Str(value), None)
            }
        }
    }

    /// Check an assertion against the last response. Returns the success
    /// description or a structured failure carrying expected vs actual.
    pub fn check_assertion(&self, assertion: &Assertion) -> Result<String, ScriptError> {
        match assertion {
            Assertion::Status(expected) => {
                let actual = self.last.as_ref().map(|r| r.status).unwrap_or(0);
                if actual == *expected {
                    Ok(format!("assert status {}: ok", expected))
                } else {
                    Err(ScriptError::assertion(
                        "status",
                        expected.to_string(),
                        actual.to_string(),
                    ))
                }
            }
            Assertion::TimeLess(bound_ms) => {
                let actual = self.last.as_ref().map(|r| r.elapsed_ms).unwrap_or(0);
                if actual < *bound_ms {
                    Ok(format!("assert time less {} ms: ok ({} ms)", bound_ms, actual))
                } else {
                    Err(ScriptError::assertion(
                        "time",
                        format!("less than {} ms", bound_ms),
                        format!("{} ms", actual),
                    ))
                }
            }
            Assertion::ResponseContains(needle) => {
                let body = self.last.as_ref().map(|r| r.body.as_str()).unwrap_or("");
                if body.contains(needle.as_str()) {
                    Ok(format!("assert response contains {:?}: ok", needle))
                } else {
                    let preview: String = body.chars().take(80).collect();
                    Err(ScriptError::assertion(
                        "response contains",
                        format!("{:?}", needle),
                        format!("body starting {:?}", preview),
                    ))
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn inject_response(&mut self, snapshot: ResponseSnapshot) {
        self.last = Some(snapshot);
    }
}

fn build_agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .user_agent(USER_AGENT)
        .max_idle_connections(MAX_IDLE_CONNECTIONS)
        .max_idle_connections_per_host(MAX_IDLE_PER_HOST)
        .build()
}

/// Standard HTTP capitalization: first letter and every letter after `-`
/// uppercased, the rest lowered (`x-request-id` -> `X-Request-Id`).
pub fn canonical_header_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for c in name.chars() {
        if c == '-' {
            out.push('-');
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(status: u16, body: &str) -> ResponseSnapshot {
        ResponseSnapshot {
            status,
            body_bytes: body.as_bytes().to_vec(),
            body: body.to_string(),
            headers: HashMap::from([
                ("Content-Type".to_string(), "application/json".to_string()),
                ("X-Request-Id".to_string(), "abc-123".to_string()),
            ]),
            elapsed_ms: 42,
            url: "http://test/x".to_string(),
            method: "GET".to_string(),
        }
    }

    #[test]
    fn test_canonical_header_name() {
        assert_eq!(canonical_header_name("content-type"), "Content-Type");
        assert_eq!(canonical_header_name("X-REQUEST-ID"), "X-Request-Id");
        assert_eq!(canonical_header_name("etag"), "Etag");
    }

    #[test]
    fn test_resolve_url_with_base() {
        let mut engine = HttpEngine::new();
        assert_eq!(engine.resolve_url("http://a/b"), "http://a/b");

        engine.set_base_url("http://api.local/v1/");
        assert_eq!(engine.resolve_url("/users"), "http://api.local/v1/users");
        assert_eq!(engine.resolve_url("users"), "http://api.local/v1/users");
        assert_eq!(engine.resolve_url("https://other/x"), "https://other/x");
    }

    #[test]
    fn test_extract_before_any_request() {
        let engine = HttpEngine::new();
        let (value, warning) = engine.extract(ExtractKind::JsonPath, Some("$.a"));
        assert_eq!(value, Value::Str(String::new()));
        assert!(warning.is_some());
    }

    #[test]
    fn test_extract_status_and_header() {
        let mut engine = HttpEngine::new();
        engine.inject_response(snapshot(404, "{}"));

        let (value, warning) = engine.extract(ExtractKind::Status, None);
        assert_eq!(value, Value::Number(404.0));
        assert!(warning.is_none());

        // lookup canonicalizes the queried name
        let (value, _) = engine.extract(ExtractKind::Header, Some("x-request-id"));
        assert_eq!(value, Value::Str("abc-123".into()));

        let (value, _) = engine.extract(ExtractKind::Header, Some("Missing"));
        assert_eq!(value, Value::Str(String::new()));
    }

    #[test]
    fn test_extract_jsonpath() {
        let mut engine = HttpEngine::new();
        engine.inject_response(snapshot(200, r#"{"user":{"id":42}}"#));

        let (value, warning) = engine.extract(ExtractKind::JsonPath, Some("$.user.id"));
        assert_eq!(value, Value::Number(42.0));
        assert!(warning.is_none());

        let (value, _) = engine.extract(ExtractKind::JsonPath, Some("$.nope"));
        assert_eq!(value, Value::Str(String::new()));
    }

    #[test]
    fn test_extract_jsonpath_invalid_body_warns() {
        let mut engine = HttpEngine::new();
        engine.inject_response(snapshot(200, "<html>not json</html>"));
        let (value, warning) = engine.extract(ExtractKind::JsonPath, Some("$.a"));
        assert_eq!(value, Value::Str(String::new()));
        assert!(warning.is_some());
    }

    #[test]
    fn test_extract_regex_group_and_full_match() {
        let mut engine = HttpEngine::new();
        engine.inject_response(snapshot(200, "id=77; name=ada"));

        let (value, _) = engine.extract(ExtractKind::Regex, Some(r"id=(\d+)"));
        assert_eq!(value, Value::Str("77".into()));

        let (value, _) = engine.extract(ExtractKind::Regex, Some(r"name=\w+"));
        assert_eq!(value, Value::Str("name=ada".into()));

        let (value, _) = engine.extract(ExtractKind::Regex, Some(r"zzz"));
        assert_eq!(value, Value::Str(String::new()));
    }

    #[test]
    fn test_extract_xpath_title() {
        let mut engine = HttpEngine::new();
        engine.inject_response(snapshot(200, "<html><title>X</title></html>"));

        let (value, warning) = engine.extract(ExtractKind::XPath, Some("//title"));
        assert_eq!(value, Value::Str("X".into()));
        assert!(warning.is_none());

        let (_, warning) = engine.extract(ExtractKind::XPath, Some("/html/body"));
        assert!(warning.is_some());
    }

    #[test]
    fn test_assertions() {
        let mut engine = HttpEngine::new();
        engine.inject_response(snapshot(200, r#"{"ok":true}"#));

        assert!(engine.check_assertion(&Assertion::Status(200)).is_ok());
        let err = engine.check_assertion(&Assertion::Status(201)).unwrap_err();
        assert!(err.is_assertion_failure());

        assert!(engine.check_assertion(&Assertion::TimeLess(100)).is_ok());
        assert!(engine.check_assertion(&Assertion::TimeLess(10)).is_err());

        assert!(engine
            .check_assertion(&Assertion::ResponseContains("ok".into()))
            .is_ok());
        assert!(engine
            .check_assertion(&Assertion::ResponseContains("nope".into()))
            .is_err());
    }

    #[test]
    fn test_transport_failure_sets_zero_status_sentinel() {
        let mut engine = HttpEngine::new();
        // Nothing listens on this port; connection is refused immediately.
        let opts = RequestOptions {
            timeout_ms: Some(500),
            ..Default::default()
        };
        let result = engine.execute(Method::Get, "http://127.0.0.1:9/none", &opts);
        assert!(matches!(result, Value::Str(ref s) if s.contains("failed")));

        let last = engine.last().expect("sentinel snapshot stored");
        assert_eq!(last.status, 0);
        assert!(last.body.is_empty());
    }
}
