//! In-process stand-in for github.com and api.github.com
//!
//! Records every request it receives so tests can assert on exactly what
//! the extension sent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::Body,
    extract::{Form, Path, Query, Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde_json::json;
use tokio::net::TcpListener;
use url::Url;

pub const CLIENT_ID: &str = "test-client-id";
pub const CLIENT_SECRET: &str = "test-client-secret";
pub const VALID_CODE: &str = "KODE";
/// Accepted like [`VALID_CODE`] but answered with a JSON token body
pub const JSON_CODE: &str = "JSON-KODE";
pub const ACCESS_TOKEN: &str = "asdf";

/// One request as seen by the fake provider
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    /// Body decoded as `application/x-www-form-urlencoded`
    pub fn form(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(self.body.as_bytes())
            .into_owned()
            .collect()
    }
}

#[derive(Clone)]
struct FakeState {
    base: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub struct FakeGitHub {
    pub addr: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeGitHub {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = FakeState {
            base: addr.clone(),
            requests: requests.clone(),
        };

        let app = Router::new()
            .route("/login/oauth/authorize", get(authorize))
            .route("/login/oauth/access_token", post(access_token))
            .route("/user", get(user))
            .route("/user/repos", get(user_repos))
            .route("/search/issues", get(search_issues))
            .route("/paged/:failure", get(paged_failure))
            .route(
                "/repos/:owner/:repo",
                get(repository).delete(delete_repository),
            )
            .route("/zen", get(zen))
            .route("/echo", post(echo).patch(echo).put(echo))
            .layer(middleware::from_fn_with_state(state.clone(), record))
            .with_state(state);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, requests }
    }

    /// Value for `github.base_url`
    pub fn base_url(&self) -> String {
        format!("{}/", self.addr)
    }

    /// Value for `github.auth_url`
    pub fn auth_url(&self) -> String {
        format!("{}/login/oauth/", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.path == path)
            .collect()
    }
}

async fn record(State(state): State<FakeState>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let header_value = |name: header::HeaderName| {
        parts
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned)
    };

    state.requests.lock().unwrap().push(RecordedRequest {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(ToOwned::to_owned),
        authorization: header_value(header::AUTHORIZATION),
        content_type: header_value(header::CONTENT_TYPE),
        body: String::from_utf8_lossy(&bytes).into_owned(),
    });

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Mimics the consent screen of an already-approved app: bounce straight
/// back to `redirect_uri` with a code.
async fn authorize(Query(params): Query<HashMap<String, String>>) -> Response {
    if params.get("client_id").map(String::as_str) != Some(CLIENT_ID) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let Some(redirect_uri) = params.get("redirect_uri") else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let mut callback = Url::parse(redirect_uri).unwrap();
    callback.query_pairs_mut().append_pair("code", VALID_CODE);
    if let Some(state) = params.get("state") {
        callback.query_pairs_mut().append_pair("state", state);
    }
    Redirect::to(callback.as_str()).into_response()
}

async fn access_token(Form(form): Form<HashMap<String, String>>) -> Response {
    let code = form.get("code").map(String::as_str);
    let valid = matches!(code, Some(VALID_CODE) | Some(JSON_CODE))
        && form.get("client_id").map(String::as_str) == Some(CLIENT_ID)
        && form.get("client_secret").map(String::as_str) == Some(CLIENT_SECRET);

    if valid && code == Some(JSON_CODE) {
        return Json(json!({
            "access_token": ACCESS_TOKEN,
            "scope": "read:user",
            "token_type": "bearer"
        }))
        .into_response();
    }

    let body = if valid {
        format!("access_token={ACCESS_TOKEN}&scope=read%3Auser&token_type=bearer")
    } else {
        "error=bad_verification_code&error_description=The+code+passed+is+incorrect+or+expired."
            .to_string()
    };

    (
        [(header::CONTENT_TYPE, "application/x-www-form-urlencoded")],
        body,
    )
        .into_response()
}

async fn user(headers: HeaderMap) -> Response {
    let expected = format!("Bearer {ACCESS_TOKEN}");
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some(expected.as_str());

    if authorized {
        Json(json!({"id": 1, "login": "octocat"})).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "message": "Bad credentials",
                "documentation_url": "https://docs.github.com/rest"
            })),
        )
            .into_response()
    }
}

#[derive(serde::Deserialize)]
struct PageQuery {
    page: Option<u32>,
}

fn with_next_link(mut response: Response, next: Option<String>) -> Response {
    if let Some(next) = next {
        let value = format!("<{next}>; rel=\"next\", <{next}>; rel=\"last\"");
        response
            .headers_mut()
            .insert(header::LINK, HeaderValue::from_str(&value).unwrap());
    }
    response
}

/// Three pages of two repositories each
async fn user_repos(State(state): State<FakeState>, Query(query): Query<PageQuery>) -> Response {
    let page = query.page.unwrap_or(1);
    let body = Json(json!([{"id": page * 10 + 1}, {"id": page * 10 + 2}])).into_response();
    let next = (page < 3).then(|| format!("{}/user/repos?page={}&per_page=2", state.base, page + 1));
    with_next_link(body, next)
}

/// Search results split across two pages
async fn search_issues(State(state): State<FakeState>, Query(query): Query<PageQuery>) -> Response {
    match query.page.unwrap_or(1) {
        1 => with_next_link(
            Json(json!({"total_count": 3, "items": [1, 2]})).into_response(),
            Some(format!("{}/search/issues?q=bug&page=2", state.base)),
        ),
        _ => Json(json!({"total_count": 3, "items": [3]})).into_response(),
    }
}

/// First page is fine, the second one breaks in the way named by `failure`
async fn paged_failure(
    State(state): State<FakeState>,
    Path(failure): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    if query.page.unwrap_or(1) == 1 {
        return with_next_link(
            Json(json!([1, 2])).into_response(),
            Some(format!("{}/paged/{failure}?page=2", state.base)),
        );
    }

    match failure.as_str() {
        "status" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "Server Error"})),
        )
            .into_response(),
        "text" => "not json".into_response(),
        _ => Json(json!({"message": "unexpected shape"})).into_response(),
    }
}

async fn repository(Path((owner, repo)): Path<(String, String)>) -> Json<serde_json::Value> {
    Json(json!({"full_name": format!("{owner}/{repo}")}))
}

/// GitHub answers deletes with an empty 204 that still names JSON
async fn delete_repository() -> Response {
    (
        StatusCode::NO_CONTENT,
        [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
    )
        .into_response()
}

async fn zen() -> &'static str {
    "Keep it logically awesome."
}

async fn echo(method: Method, headers: HeaderMap, body: String) -> Json<serde_json::Value> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body: serde_json::Value = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
    Json(json!({
        "method": method.as_str(),
        "content_type": content_type,
        "body": body
    }))
}
