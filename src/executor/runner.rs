use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::{
    header::{HeaderMap, CONTENT_TYPE},
    multipart::{Form, Part},
    Client, Method,
};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::builder::{FormData, RequestDescriptor, RequestOptions};

use super::models::{decode_body, ExecutionResult};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends a built request. Transport failures are reported in the result,
/// never as an error.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, request: &RequestDescriptor) -> ExecutionResult;
}

/// reqwest backed executor.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: Client,
}

impl HttpExecutor {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self { client })
    }

    async fn send(&self, options: &RequestOptions) -> Result<(u16, HeaderMap, Vec<u8>)> {
        let method = Method::from_bytes(options.method.as_bytes())
            .with_context(|| format!("invalid HTTP method {}", options.method))?;
        let url = request_url(options)?;
        debug!(%method, %url, "sending request");

        let mut builder = self.client.request(method, url);

        if !options.query_string.is_empty() {
            let pairs: Vec<(&str, &str)> = options
                .query_string
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str()))
                .collect();
            builder = builder.query(&pairs);
        }

        for (name, value) in &options.headers {
            builder = builder.header(name, value);
        }

        if let Some(auth) = &options.auth {
            let (user, password) = auth.split_once(':').unwrap_or((auth.as_str(), ""));
            builder = builder.basic_auth(user, Some(password));
        }

        if let Some(form) = &options.form {
            builder = builder.multipart(build_form(form).await?);
        } else if let Some(body) = &options.body {
            builder = match body {
                Value::String(text) => builder.body(text.clone()),
                other => {
                    let mut builder = builder.body(serde_json::to_vec(other)?);
                    if !has_header(&options.headers, CONTENT_TYPE.as_str()) {
                        builder = builder.header(CONTENT_TYPE, "application/json");
                    }
                    builder
                }
            };
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;
        Ok((status, headers, bytes.to_vec()))
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(&self, request: &RequestDescriptor) -> ExecutionResult {
        let start = Instant::now();
        let outcome = self.send(&request.options).await;
        let elapsed = start.elapsed().as_millis() as u64;

        match outcome {
            Ok((status, headers, bytes)) => {
                info!(title = %request.title, status, elapsed_ms = elapsed, "request executed");
                ExecutionResult::success(status, elapsed, collect_headers(&headers), decode_body(&bytes))
            }
            Err(err) => {
                info!(title = %request.title, error = %err, "request failed");
                ExecutionResult::failure(format!("{:#}", err), elapsed)
            }
        }
    }
}

/// An empty protocol means http on port 80 and https anywhere else.
pub fn request_url(options: &RequestOptions) -> Result<Url> {
    let scheme = match options.protocol.trim_end_matches(':') {
        "" if options.port == "80" => "http",
        "" => "https",
        scheme => scheme,
    };
    let path = if options.path.starts_with('/') || options.path.is_empty() {
        options.path.clone()
    } else {
        format!("/{}", options.path)
    };
    let raw = format!("{}://{}:{}{}", scheme, options.host, options.port, path);
    Url::parse(&raw).with_context(|| format!("invalid request url {}", raw))
}

async fn build_form(data: &FormData) -> Result<Form> {
    let mut form = Form::new();
    for (name, value) in &data.fields {
        form = form.text(name.clone(), value.clone());
    }
    for (name, path) in &data.files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading form file {}", path))?;
        let file_name = std::path::Path::new(path)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| name.clone());
        form = form.part(name.clone(), Part::bytes(bytes).file_name(file_name));
    }
    Ok(form)
}

fn has_header(headers: &IndexMap<String, String>, name: &str) -> bool {
    headers.keys().any(|key| key.eq_ignore_ascii_case(name))
}

fn collect_headers(headers: &HeaderMap) -> IndexMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}
