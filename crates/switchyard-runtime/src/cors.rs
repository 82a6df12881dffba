//! Cross-origin resource sharing

use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE, VARY,
};
use http::{HeaderValue, Method, Response, StatusCode};
use switchyard_config::CorsConfig;
use switchyard_core::response::empty;
use switchyard_core::{Body, Error, Result};

/// CORS policy applied by the dispatcher
///
/// `OPTIONS` requests are answered locally with the allowed methods and
/// headers. Every other response gets `Access-Control-Allow-Origin` unless
/// the upstream already set it.
#[derive(Debug, Clone)]
pub struct Cors {
    any_origin: bool,
    origins: Vec<String>,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    expose_headers: Option<HeaderValue>,
    max_age: Option<HeaderValue>,
    allow_credentials: bool,
}

impl Cors {
    /// Build the policy, rejecting methods or header lists that are not valid
    pub fn new(config: &CorsConfig) -> Result<Self> {
        for method in &config.allowed_methods {
            Method::from_bytes(method.as_bytes())
                .map_err(|_| Error::Config(format!("cors: invalid method '{method}'")))?;
        }

        Ok(Self {
            any_origin: config.allowed_origins.iter().any(|origin| origin == "*"),
            origins: config.allowed_origins.clone(),
            allow_methods: header_list("allowed_methods", &config.allowed_methods)?,
            allow_headers: header_list("allowed_headers", &config.allowed_headers)?,
            expose_headers: if config.exposed_headers.is_empty() {
                None
            } else {
                Some(header_list("exposed_headers", &config.exposed_headers)?)
            },
            max_age: config
                .max_age
                .map(|age| HeaderValue::from(age.as_secs())),
            allow_credentials: config.allow_credentials,
        })
    }

    /// `Access-Control-Allow-Origin` for a request from `origin`
    fn allow_origin(&self, origin: Option<&HeaderValue>) -> Option<HeaderValue> {
        if self.any_origin && !self.allow_credentials {
            return Some(HeaderValue::from_static("*"));
        }

        let origin = origin?;
        let allowed = self.any_origin
            || origin
                .to_str()
                .is_ok_and(|value| self.origins.iter().any(|allowed| allowed == value));

        allowed.then(|| origin.clone())
    }

    /// Answer a preflight request
    pub fn preflight(&self) -> Response<Body> {
        let mut response = Response::new(empty());
        *response.status_mut() = StatusCode::OK;

        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        if let Some(max_age) = &self.max_age {
            headers.insert(ACCESS_CONTROL_MAX_AGE, max_age.clone());
        }

        response
    }

    /// Add the per-response CORS headers for a request from `origin`
    pub fn apply(&self, origin: Option<&HeaderValue>, response: &mut Response<Body>) {
        let headers = response.headers_mut();
        if headers.contains_key(ACCESS_CONTROL_ALLOW_ORIGIN) {
            return;
        }

        let Some(allow_origin) = self.allow_origin(origin) else {
            return;
        };
        if allow_origin != "*" {
            headers.append(VARY, HeaderValue::from_static("origin"));
        }
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);

        if let Some(expose) = &self.expose_headers {
            headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, expose.clone());
        }
        if self.allow_credentials {
            headers.insert(
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
    }
}

fn header_list(field: &str, values: &[String]) -> Result<HeaderValue> {
    HeaderValue::from_str(&values.join(", "))
        .map_err(|e| Error::Config(format!("cors: invalid {field}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn origin(value: &'static str) -> HeaderValue {
        HeaderValue::from_static(value)
    }

    fn enabled() -> CorsConfig {
        CorsConfig {
            enabled: true,
            ..CorsConfig::default()
        }
    }

    #[test]
    fn test_preflight_headers() {
        let cors = Cors::new(&CorsConfig {
            max_age: Some(Duration::from_secs(3600)),
            ..enabled()
        })
        .unwrap();

        let mut response = cors.preflight();
        cors.apply(Some(&origin("https://app.test")), &mut response);

        let headers = response.headers();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            headers[ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, PUT, DELETE, OPTIONS"
        );
        assert_eq!(
            headers[ACCESS_CONTROL_ALLOW_HEADERS],
            "Origin, X-Requested-With, Content-Type, Accept, Authorization"
        );
        assert_eq!(headers[ACCESS_CONTROL_MAX_AGE], "3600");
        assert!(!headers.contains_key(VARY));
    }

    #[test]
    fn test_specific_origins() {
        let cors = Cors::new(&CorsConfig {
            allowed_origins: vec!["https://app.test".to_string()],
            ..enabled()
        })
        .unwrap();

        let mut response = Response::new(empty());
        cors.apply(Some(&origin("https://app.test")), &mut response);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.test");
        assert_eq!(response.headers()[VARY], "origin");

        let mut response = Response::new(empty());
        cors.apply(Some(&origin("https://evil.test")), &mut response);
        assert!(!response.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN));

        let mut response = Response::new(empty());
        cors.apply(None, &mut response);
        assert!(!response.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[test]
    fn test_credentials_echo_origin() {
        let cors = Cors::new(&CorsConfig {
            allow_credentials: true,
            exposed_headers: vec!["X-Request-Id".to_string()],
            ..enabled()
        })
        .unwrap();

        let mut response = Response::new(empty());
        cors.apply(Some(&origin("https://app.test")), &mut response);

        let headers = response.headers();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.test");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[ACCESS_CONTROL_EXPOSE_HEADERS], "X-Request-Id");
    }

    #[test]
    fn test_upstream_headers_win() {
        let cors = Cors::new(&enabled()).unwrap();

        let mut response = Response::new(empty());
        response.headers_mut().insert(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            origin("https://upstream.test"),
        );
        cors.apply(Some(&origin("https://app.test")), &mut response);

        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://upstream.test"
        );
    }

    #[test]
    fn test_invalid_config() {
        let err = Cors::new(&CorsConfig {
            allowed_methods: vec!["GET POST".to_string()],
            ..enabled()
        })
        .unwrap_err();
        assert!(err.is_fatal());

        assert!(Cors::new(&CorsConfig {
            allowed_headers: vec!["bad\nheader".to_string()],
            ..enabled()
        })
        .is_err());
    }
}
