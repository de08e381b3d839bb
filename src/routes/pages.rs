//! Demo page handlers.

use crate::auth::Authenticated;
use crate::models::ProfileResponse;
use axum::{response::Html, Json};

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><title>sessionauth</title></head>
<body>
<form method="post" action="/login">
<input name="user" placeholder="user">
<input name="pass" type="password" placeholder="password">
<button type="submit">Log in</button>
</form>
<p><a href="/profile">Profile</a> | <a href="/logout">Log out</a></p>
</body>
</html>
"#;

/// GET / — login form
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /profile — identity of the logged-in user
pub async fn profile(Authenticated(identity): Authenticated) -> Json<ProfileResponse> {
    Json(ProfileResponse { identity })
}
