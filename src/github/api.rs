//! GitHub REST API call forwarding
//!
//! Any verb against any resource, with the access token attached. JSON
//! responses are decoded; everything else is handed back untouched.

use std::time::Instant;

use http::{
    HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
    header::{ACCEPT, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, LINK},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use super::GitHub;
use crate::error::{ApiErrorResponse, GitHubError, Result};
use crate::metrics::{GITHUB_API_REQUEST_DURATION_SECONDS, GITHUB_API_REQUESTS_TOTAL};

const GITHUB_JSON: &str = "application/vnd.github+json";

/// Per-call request options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    /// Use this token instead of asking the registered getter
    pub access_token: Option<String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// JSON-encode `data` as the body
    ///
    /// Sets `Content-Type: application/json` unless a content type was
    /// already given.
    pub fn json<T: Serialize + ?Sized>(mut self, data: &T) -> Result<Self> {
        self.body = Some(serde_json::to_vec(data)?);
        self.headers
            .entry(CONTENT_TYPE)
            .or_insert(HeaderValue::from_static("application/json"));
        Ok(self)
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

/// Result of a successful API call
#[derive(Debug)]
pub enum ApiResponse {
    /// Decoded body of a JSON response
    Json(Value),
    /// Any other response, unread
    Raw(reqwest::Response),
}

impl ApiResponse {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ApiResponse::Json(value) => Some(value),
            ApiResponse::Raw(_) => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            ApiResponse::Json(value) => Some(value),
            ApiResponse::Raw(_) => None,
        }
    }

    /// Deserialize the body into `T`
    ///
    /// Raw responses are read and parsed as JSON regardless of content type.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            ApiResponse::Json(value) => Ok(serde_json::from_value(value)?),
            ApiResponse::Raw(response) => {
                let bytes = response.bytes().await?;
                Ok(serde_json::from_slice(&bytes)?)
            }
        }
    }
}

/// `true` for `application/json` and `application/json; charset=...`
pub(crate) fn is_json_response(headers: &HeaderMap) -> bool {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    content_type == "application/json" || content_type.starts_with("application/json;")
}

/// Resolve a resource against the API base URL
///
/// Absolute URLs pass through, so pagination links can be followed as is.
/// Whether a successful response has a JSON body worth decoding
///
/// HEAD and 204 responses keep the resource's JSON content type but carry
/// no body.
fn has_json_body(method: &Method, status: StatusCode, headers: &HeaderMap) -> bool {
    let empty = headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        == Some(0);

    *method != Method::HEAD
        && status != StatusCode::NO_CONTENT
        && !empty
        && is_json_response(headers)
}

pub(crate) fn resource_url(base_url: &str, resource: &str) -> String {
    if resource.starts_with("http://") || resource.starts_with("https://") {
        resource.to_string()
    } else if resource.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), resource)
    } else if base_url.ends_with('/') {
        format!("{base_url}{resource}")
    } else {
        format!("{base_url}/{resource}")
    }
}

/// Target of the `rel="next"` entry of a `Link` header
pub(crate) fn next_page_url(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(next_link)
}

fn next_link(value: &str) -> Option<String> {
    let mut rest = value;
    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        let end = after.find('>')?;
        let target = &after[..end];
        let tail = &after[end + 1..];
        let params = match tail.find('<') {
            Some(next) => &tail[..next],
            None => tail,
        };
        if params.split(';').any(is_rel_next) {
            return Some(target.to_string());
        }
        rest = &tail[params.len()..];
    }
    None
}

fn is_rel_next(param: &str) -> bool {
    let Some((key, value)) = param.split_once('=') else {
        return false;
    };
    key.trim().eq_ignore_ascii_case("rel")
        && value
            .trim()
            .trim_matches('"')
            .split_whitespace()
            .any(|rel| rel.eq_ignore_ascii_case("next"))
}

/// Append one page to the accumulated result
///
/// Arrays are concatenated; search-style objects get their `items` extended.
fn merge_page(result: &mut Value, page: Value) -> bool {
    match (result, page) {
        (Value::Array(acc), Value::Array(items)) => {
            acc.extend(items);
            true
        }
        (Value::Object(acc), Value::Object(mut page)) => {
            match (acc.get_mut("items"), page.remove("items")) {
                (Some(Value::Array(acc_items)), Some(Value::Array(items))) => {
                    acc_items.extend(items);
                    true
                }
                _ => false,
            }
        }
        _ => false,
    }
}

impl GitHub {
    /// Make a request and return the raw response
    ///
    /// Attaches `Authorization: Bearer <token>` when a token is available and
    /// follows redirects. The status is not checked.
    pub async fn raw_request(
        &self,
        method: Method,
        resource: &str,
        options: RequestOptions,
    ) -> Result<reqwest::Response> {
        let RequestOptions {
            mut headers,
            query,
            body,
            access_token,
        } = options;

        match self.resolve_access_token(access_token).await? {
            Some(token) => {
                headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
            }
            None => tracing::debug!("No access token available, calling GitHub anonymously"),
        }
        headers
            .entry(ACCEPT)
            .or_insert(HeaderValue::from_static(GITHUB_JSON));

        let url = resource_url(&self.config().base_url, resource);
        tracing::debug!(method = %method, url = %url, "GitHub API request");

        let mut request = self
            .http_client()
            .request(method.clone(), url.as_str())
            .headers(headers);
        if !query.is_empty() {
            request = request.query(&query);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let started = Instant::now();
        let response = request.send().await?;

        GITHUB_API_REQUEST_DURATION_SECONDS
            .with_label_values(&[method.as_str()])
            .observe(started.elapsed().as_secs_f64());
        GITHUB_API_REQUESTS_TOTAL
            .with_label_values(&[method.as_str(), response.status().as_str()])
            .inc();

        Ok(response)
    }

    /// Make a request to the given endpoint
    ///
    /// JSON responses are decoded into [`ApiResponse::Json`]; with
    /// `all_pages` the `Link: rel="next"` chain is followed and merged. Any
    /// other content type, and bodiless HEAD or 204 responses, come back as
    /// [`ApiResponse::Raw`].
    ///
    /// # Errors
    /// [`GitHubError::Api`] for a non-2xx status, or a follow-up page that is
    /// not JSON or cannot be merged
    pub async fn request(
        &self,
        method: Method,
        resource: &str,
        all_pages: bool,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        let response = self
            .raw_request(method.clone(), resource, options.clone())
            .await?;

        if !response.status().is_success() {
            let error = ApiErrorResponse::from_response(response).await;
            tracing::debug!(status = %error.status, resource, "GitHub API call failed");
            return Err(GitHubError::Api(error));
        }
        if !has_json_body(&method, response.status(), response.headers()) {
            return Ok(ApiResponse::Raw(response));
        }

        let mut next = if all_pages {
            next_page_url(response.headers())
        } else {
            None
        };
        let mut result: Value = response.json().await?;

        // The next link already carries the original query string.
        let page_options = RequestOptions {
            query: Vec::new(),
            ..options
        };
        while let Some(url) = next {
            tracing::debug!(url = %url, "Following GitHub pagination");
            let response = self
                .raw_request(method.clone(), &url, page_options.clone())
                .await?;
            if !response.status().is_success() || !is_json_response(response.headers()) {
                return Err(GitHubError::Api(ApiErrorResponse::from_response(response).await));
            }

            next = next_page_url(response.headers());
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.text().await?;
            let page: Value = serde_json::from_str(&body)?;
            if !merge_page(&mut result, page) {
                return Err(GitHubError::Api(ApiErrorResponse {
                    status,
                    headers,
                    body,
                }));
            }
        }

        Ok(ApiResponse::Json(result))
    }

    /// Shortcut for `request(GET, resource)`
    pub async fn get(&self, resource: &str) -> Result<ApiResponse> {
        self.request(Method::GET, resource, false, RequestOptions::default())
            .await
    }

    /// GET with query parameters
    pub async fn get_with_query<K, V>(&self, resource: &str, query: &[(K, V)]) -> Result<ApiResponse>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let options = query
            .iter()
            .fold(RequestOptions::default(), |options, (key, value)| {
                options.query(key.as_ref(), value.as_ref())
            });
        self.request(Method::GET, resource, false, options).await
    }

    /// GET every page of a paginated collection
    pub async fn get_all_pages(&self, resource: &str) -> Result<ApiResponse> {
        self.request(Method::GET, resource, true, RequestOptions::default())
            .await
    }

    /// Shortcut for `request(HEAD, resource)`
    pub async fn head(&self, resource: &str) -> Result<ApiResponse> {
        self.request(Method::HEAD, resource, false, RequestOptions::default())
            .await
    }

    /// Shortcut for `request(DELETE, resource)`
    pub async fn delete(&self, resource: &str) -> Result<ApiResponse> {
        self.request(Method::DELETE, resource, false, RequestOptions::default())
            .await
    }

    /// Shortcut for `request(POST, resource)` with a JSON body
    pub async fn post<T: Serialize + ?Sized>(&self, resource: &str, data: &T) -> Result<ApiResponse> {
        let options = RequestOptions::new().json(data)?;
        self.request(Method::POST, resource, false, options).await
    }

    /// Shortcut for `request(PATCH, resource)` with a JSON body
    pub async fn patch<T: Serialize + ?Sized>(
        &self,
        resource: &str,
        data: &T,
    ) -> Result<ApiResponse> {
        let options = RequestOptions::new().json(data)?;
        self.request(Method::PATCH, resource, false, options).await
    }

    /// Shortcut for `request(PUT, resource)` with a JSON body
    pub async fn put<T: Serialize + ?Sized>(&self, resource: &str, data: &T) -> Result<ApiResponse> {
        let options = RequestOptions::new().json(data)?;
        self.request(Method::PUT, resource, false, options).await
    }
}
