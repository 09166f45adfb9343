use axum::extract::Query;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use integrated::{Config, Emulator};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Raw request bodies received by the form endpoints.
pub type Submissions = Arc<Mutex<Vec<String>>>;

const LOGIN: &str = r#"<html><body>
<h1>Sign in</h1>
<form action="/sessions" method="POST">
  <input type="text" id="username" name="username">
  <input type="password" id="password" name="password">
  <button type="submit">Log In</button>
</form>
</body></html>"#;

const PREFERENCES: &str = r#"<html><body>
<form action="/preferences" method="post">
  <input type="checkbox" id="remember" name="remember">
  <input type="checkbox" id="newsletter" name="newsletter" value="weekly" checked>
  <select id="locale" name="locale">
    <option value="en">English</option>
    <option value="fr">French</option>
  </select>
  <input type="submit" value="Save">
</form>
<form action="/search" method="get">
  <input type="text" name="q">
  <input type="submit" value="Search">
</form>
</body></html>"#;

const UPLOAD: &str = r#"<html><body>
<form action="/upload" method="post" enctype="multipart/form-data">
  <input type="text" name="caption">
  <input type="file" id="avatar" name="avatar">
  <button>Upload</button>
</form>
</body></html>"#;

const ERROR_PAGE: &str = r#"<html><body>
<div class="exception_title">
  <abbr title="RuntimeException">RuntimeException</abbr>
  in <a title="/srv/app/routes.rs line 42">routes.rs line 42</a>
</div>
</body></html>"#;

pub fn app(submissions: Submissions) -> Router {
    let login_log = submissions.clone();
    let prefs_log = submissions;

    Router::new()
        .route("/", get(|| async { Html(r#"<h1>Home</h1><a href="/login">Sign in</a>"#) }))
        .route("/login", get(|| async { Html(LOGIN) }))
        .route(
            "/sessions",
            post(move |body: String| {
                let log = login_log.clone();
                async move {
                    log.lock().push(body);
                    (
                        [(header::SET_COOKIE, "session=alice; Path=/")],
                        Redirect::to("/dashboard"),
                    )
                }
            }),
        )
        .route("/dashboard", get(dashboard))
        .route("/profile", get(|| async { Html("<h1>Your profile</h1>") }))
        .route(
            "/preferences",
            get(|| async { Html(PREFERENCES) }).post(move |body: String| {
                let log = prefs_log.clone();
                async move {
                    log.lock().push(body);
                    Html("<p>Preferences saved</p>")
                }
            }),
        )
        .route(
            "/search",
            get(|Query(query): Query<HashMap<String, String>>| async move {
                Html(format!("<p>Results for {}</p>", query.get("q").cloned().unwrap_or_default()))
            }),
        )
        .route(
            "/upload",
            get(|| async { Html(UPLOAD) }).post(|body: String| async move {
                if body.contains(r#"filename="avatar.txt""#) && body.contains("hello avatar") {
                    Html("<p>Upload received</p>")
                } else {
                    Html("<p>Upload missing</p>")
                }
            }),
        )
        .route("/old", get(|| async { Redirect::permanent("/new") }))
        .route("/new", get(|| async { Html("<h1>Same content</h1>") }))
        .route("/new-copy", get(|| async { Html("<h1>Same content</h1>") }))
        .route("/loop", get(|| async { Redirect::to("/loop") }))
        .route(
            "/broken",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Html(ERROR_PAGE)) }),
        )
        .route(
            "/api/users",
            get(|| async { Json(serde_json::json!([{"id": 1, "name": "alice"}, {"id": 2, "name": "bob"}])) })
                .post(|Form(user): Form<HashMap<String, String>>| async move {
                    (StatusCode::CREATED, Json(serde_json::json!({"id": 3, "name": user.get("name")})))
                }),
        )
        .route(
            "/api/whoami",
            get(|headers: HeaderMap| async move { Json(echo_token(&headers)) })
                .post(|headers: HeaderMap| async move { Json(echo_token(&headers)) }),
        )
        .route(
            "/api/users/:id",
            axum::routing::delete(|| async { StatusCode::NO_CONTENT }),
        )
}

fn echo_token(headers: &HeaderMap) -> serde_json::Value {
    let token = headers
        .get("x-api-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous");
    serde_json::json!({ "token": token })
}

async fn dashboard(headers: HeaderMap) -> impl IntoResponse {
    let signed_in = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|cookies| cookies.contains("session=alice"));

    if signed_in {
        Html(r#"<h1>Welcome back, alice</h1><a href="/profile">Profile</a>"#).into_response()
    } else {
        Redirect::to("/login").into_response()
    }
}

/// An in-process emulator with diagnostics written under `logs`.
pub fn emulator(logs: &Path) -> (Emulator, Submissions) {
    let submissions = Submissions::default();
    let shared = submissions.clone();
    let config = Config::default().with_logs(logs.join("output.txt"), logs.join("screenshot.png"));

    let emulator = Emulator::in_process(config, move || app(shared.clone()));
    (emulator, submissions)
}

/// Decode one urlencoded body into sorted pairs.
pub fn decode(body: &str) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = url::form_urlencoded::parse(body.as_bytes())
        .into_owned()
        .collect();
    pairs.sort();
    pairs
}
