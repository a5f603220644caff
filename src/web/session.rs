use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::tracker::Session;

/// Attach a [`Session`] keyed by the named cookie, unless one is already set.
///
/// Only the session ID is filled in; the session carries no data, so the
/// `user_source` lookup never finds a user. Hosts that track by `user_id`
/// must insert their own [`Session`] extension with the user stored under
/// that key.
pub async fn session_from_cookie(
    State(cookie_name): State<Arc<str>>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.extensions().get::<Session>().is_none() {
        let session_id = request
            .headers()
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|cookies| cookie_value(cookies, &cookie_name));

        if let Some(id) = session_id {
            request.extensions_mut().insert(Session::new(id));
        }
    }

    next.run(request).await
}

fn cookie_value(cookies: &str, name: &str) -> Option<String> {
    cookies
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_value() {
        let cookies = "theme=dark; visits_session=abc123; other=1";
        assert_eq!(
            cookie_value(cookies, "visits_session").as_deref(),
            Some("abc123")
        );
        assert_eq!(cookie_value(cookies, "missing"), None);
        assert_eq!(cookie_value("visits_session=", "visits_session"), None);
    }
}
