// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use gridline_app::{
    BatchProcessor, DataSource, ItemProcessor, ItemResult, OperationHooks, RawRecord, WorkingRow,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Fetches records with `GET <url>?fields=a,b,c`.
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: Url,
    http: HttpClient,
}

impl HttpSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            url: parse_endpoint("source.url", url)?,
            http: build_client(timeout)?,
        })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn request_url(&self, fields: &[String]) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair("fields", &fields.join(","));
        url
    }
}

impl DataSource for HttpSource {
    fn fetch(&mut self, fields: &[String]) -> Result<Vec<RawRecord>> {
        let url = self.request_url(fields);
        debug!(%url, "fetching records");
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|error| connection_error(self.url.as_str(), error))?;
        let body = success_body(response)?;
        decode_records(&body)
    }
}

/// Parses a fetch response body. The body must be a JSON array; entries
/// that are not objects are skipped with a warning.
pub fn decode_records(body: &str) -> Result<Vec<RawRecord>> {
    let value: Value = serde_json::from_str(body).context("decode records: response is not JSON")?;
    let Value::Array(items) = value else {
        bail!("decode records: expected a JSON array, got {}", json_kind(&value));
    };
    let total = items.len();
    let records: Vec<RawRecord> = items.into_iter().filter_map(RawRecord::from_value).collect();
    if records.len() < total {
        warn!(
            skipped = total - records.len(),
            "response contained entries that are not records"
        );
    }
    Ok(records)
}

/// Posts each row's raw record to `url`. Settings are sent as query
/// parameters.
#[derive(Debug, Clone)]
pub struct HttpItemOperation {
    endpoint: Endpoint,
}

impl HttpItemOperation {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: Endpoint::new(url, timeout)?,
        })
    }

    pub fn with_settings(mut self, keys: &[&str]) -> Self {
        self.endpoint.declare(keys);
        self
    }
}

impl OperationHooks for HttpItemOperation {
    fn has_settings(&self) -> bool {
        !self.endpoint.settings.is_empty()
    }

    fn set_setting(&mut self, key: &str, value: &str) -> Result<()> {
        self.endpoint.set(key, value)
    }

    fn validate(&self) -> Result<()> {
        self.endpoint.validate()
    }
}

impl ItemProcessor for HttpItemOperation {
    fn process_item(&mut self, row: &WorkingRow) -> Result<ItemResult> {
        self.endpoint.post(&row.record.to_json())
    }
}

/// Posts every queued row at once as `{"items": [...]}` and applies the
/// single answer to all of them.
#[derive(Debug, Clone)]
pub struct HttpBatchOperation {
    endpoint: Endpoint,
}

impl HttpBatchOperation {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            endpoint: Endpoint::new(url, timeout)?,
        })
    }

    pub fn with_settings(mut self, keys: &[&str]) -> Self {
        self.endpoint.declare(keys);
        self
    }
}

impl OperationHooks for HttpBatchOperation {
    fn has_settings(&self) -> bool {
        !self.endpoint.settings.is_empty()
    }

    fn set_setting(&mut self, key: &str, value: &str) -> Result<()> {
        self.endpoint.set(key, value)
    }

    fn validate(&self) -> Result<()> {
        self.endpoint.validate()
    }
}

impl BatchProcessor for HttpBatchOperation {
    fn process_all_items(&mut self, rows: &[&WorkingRow]) -> Result<ItemResult> {
        let items: Vec<Value> = rows.iter().map(|row| row.record.to_json()).collect();
        self.endpoint.post(&json!({ "items": items }))
    }
}

#[derive(Debug, Clone)]
struct Endpoint {
    url: Url,
    http: HttpClient,
    /// Declared settings; `None` until the user picks a value.
    settings: BTreeMap<String, Option<String>>,
}

impl Endpoint {
    fn new(url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            url: parse_endpoint("operations.url", url)?,
            http: build_client(timeout)?,
            settings: BTreeMap::new(),
        })
    }

    fn declare(&mut self, keys: &[&str]) {
        for key in keys {
            self.settings.entry((*key).to_owned()).or_insert(None);
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let slot = self
            .settings
            .get_mut(key)
            .ok_or_else(|| anyhow!("operation has no setting named {key:?}"))?;
        let value = value.trim();
        *slot = (!value.is_empty()).then(|| value.to_owned());
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = self
            .settings
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(key, _)| key.as_str())
            .collect();
        if !missing.is_empty() {
            bail!("choose a value for {} first", missing.join(", "));
        }
        Ok(())
    }

    fn target(&self) -> Url {
        let mut url = self.url.clone();
        if !self.settings.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.settings {
                if let Some(value) = value {
                    pairs.append_pair(key, value);
                }
            }
        }
        url
    }

    /// Transport failures are errors; anything the server answered becomes
    /// an item result.
    fn post(&self, body: &Value) -> Result<ItemResult> {
        let response = self
            .http
            .post(self.target())
            .json(body)
            .send()
            .map_err(|error| connection_error(self.url.as_str(), error))?;

        let status = response.status();
        let text = response.text().unwrap_or_default();
        if !status.is_success() {
            return Ok(ItemResult::failed(
                clean_error_response(status, &text).to_string(),
            ));
        }
        match serde_json::from_str::<ItemResponse>(&text) {
            Ok(parsed) => Ok(ItemResult {
                success: parsed.success,
                message: parsed.message.filter(|message| !message.is_empty()),
            }),
            Err(error) => {
                warn!(url = %self.url, %error, "malformed operation response");
                Ok(ItemResult::failed("malformed response from operation endpoint"))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ItemResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

fn build_client(timeout: Duration) -> Result<HttpClient> {
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .context("build HTTP client")
}

fn parse_endpoint(setting: &str, raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("{setting} must not be empty");
    }
    let url = Url::parse(raw).with_context(|| format!("{setting} {raw:?} is not a valid URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("{setting} must use http or https, got {}://", url.scheme());
    }
    Ok(url)
}

fn success_body(response: Response) -> Result<String> {
    let status = response.status();
    let body = response.text().context("read response body")?;
    if !status.is_success() {
        return Err(clean_error_response(status, &body));
    }
    Ok(body)
}

fn connection_error(url: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("{url} did not answer in time -- raise source.timeout or retry");
    }
    anyhow!("cannot reach {url} -- check the address and retry ({error})")
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body) {
        let message = match parsed.error {
            Some(Value::String(text)) => Some(text),
            Some(Value::Object(fields)) => fields
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned),
            _ => parsed.message,
        };
        if let Some(message) = message.filter(|message| !message.is_empty()) {
            return anyhow!("server error ({}): {}", status.as_u16(), message);
        }
    }

    let body = body.trim();
    if !body.is_empty() && body.len() < 100 && !body.contains('{') {
        return anyhow!("server error ({}): {}", status.as_u16(), body);
    }

    anyhow!("server returned {}", status.as_u16())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::{HttpSource, clean_error_response, decode_records, parse_endpoint};
    use reqwest::StatusCode;
    use std::time::Duration;

    #[test]
    fn request_url_lists_fields() -> anyhow::Result<()> {
        let source = HttpSource::new("http://example.com/users?active=1", Duration::from_secs(1))?;
        let url = source.request_url(&["name".to_owned(), "age".to_owned()]);
        assert_eq!(
            url.as_str(),
            "http://example.com/users?active=1&fields=name%2Cage"
        );
        Ok(())
    }

    #[test]
    fn endpoints_must_be_http() {
        assert!(parse_endpoint("source.url", "").is_err());
        assert!(parse_endpoint("source.url", "ftp://example.com").is_err());
        assert!(parse_endpoint("source.url", "not a url").is_err());
        assert!(parse_endpoint("source.url", "https://example.com/api").is_ok());
    }

    #[test]
    fn records_must_be_an_array() -> anyhow::Result<()> {
        let error = decode_records(r#"{"id": 1}"#).expect_err("object body should fail");
        assert!(error.to_string().contains("expected a JSON array, got an object"));
        assert!(decode_records("<html>").is_err());

        let records = decode_records(r#"[{"id": 1}, 7, {"id": 2}]"#)?;
        assert_eq!(records.len(), 2);
        Ok(())
    }

    #[test]
    fn error_bodies_are_summarized() {
        let nested = clean_error_response(
            StatusCode::BAD_REQUEST,
            r#"{"error": {"message": "group is locked"}}"#,
        );
        assert_eq!(nested.to_string(), "server error (400): group is locked");

        let flat = clean_error_response(StatusCode::FORBIDDEN, r#"{"message": "no access"}"#);
        assert_eq!(flat.to_string(), "server error (403): no access");

        let plain = clean_error_response(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(plain.to_string(), "server error (502): upstream down");

        let opaque = clean_error_response(StatusCode::INTERNAL_SERVER_ERROR, "<html>{}</html>");
        assert_eq!(opaque.to_string(), "server returned 500");
    }
}
