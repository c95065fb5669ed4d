//! OneMap search API client.
//!
//! OneMap requires a bearer token obtained by exchanging an account's
//! email and password. The token is fetched once per run and shared
//! read-only by every search.
//!
//! - Token: `POST /api/auth/post/getToken` with `{"email", "password"}`
//! - Search: `GET /api/common/elastic/search?searchVal=...&returnGeom=Y&getAddrDetails=Y&pageNum=1`
//!
//! Search returns a page of candidates; only the first is kept. OneMap
//! encodes every field as a string and uses `"NIL"` for absent values.
//!
//! See <https://www.onemap.gov.sg/apidocs/>

use async_trait::async_trait;
use serde::Serialize;

use crate::service::GeocodingService;
use crate::{GeocodeError, PlaceMatch, PlaceSearch};

/// Environment variable holding the OneMap account email.
pub const EMAIL_VAR: &str = "ONEMAP_EMAIL";

/// Environment variable holding the OneMap account password.
pub const PASSWORD_VAR: &str = "ONEMAP_PASSWORD";

/// OneMap account credentials.
#[derive(Clone, Serialize)]
pub struct Credentials {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Reads credentials from [`EMAIL_VAR`] and [`PASSWORD_VAR`].
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::MissingCredentials`] naming the first
    /// variable that is unset or empty.
    pub fn from_env() -> Result<Self, GeocodeError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads credentials through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::MissingCredentials`] naming the first
    /// variable that is absent or blank.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GeocodeError> {
        let read = |var: &'static str| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or(GeocodeError::MissingCredentials { var })
        };

        Ok(Self {
            email: read(EMAIL_VAR)?,
            password: read(PASSWORD_VAR)?,
        })
    }
}

/// An authenticated OneMap client.
#[derive(Clone)]
pub struct OneMapClient {
    client: reqwest::Client,
    search_url: String,
    token: String,
    timeout: std::time::Duration,
}

impl std::fmt::Debug for OneMapClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneMapClient")
            .field("search_url", &self.search_url)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl OneMapClient {
    /// Exchanges `credentials` for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request fails, the service rejects
    /// the credentials, or the response carries no token. Callers treat
    /// this as fatal.
    pub async fn authenticate(
        client: reqwest::Client,
        service: &GeocodingService,
        credentials: &Credentials,
    ) -> Result<Self, GeocodeError> {
        let resp = client
            .post(service.token_url())
            .json(credentials)
            .timeout(service.auth_timeout())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GeocodeError::Auth {
                message: format!("token endpoint returned status {status}"),
            });
        }

        let body: serde_json::Value = resp.json().await?;
        let token = parse_token_response(&body)?;

        log::info!("Authenticated with {}", service.name);

        Ok(Self::with_token(client, service, token))
    }

    /// Builds a client around an already-issued token.
    #[must_use]
    pub fn with_token(client: reqwest::Client, service: &GeocodingService, token: String) -> Self {
        Self {
            client,
            search_url: service.search_url(),
            token,
            timeout: service.request_timeout(),
        }
    }

    /// Overrides the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full search URL for `query`.
    ///
    /// The query is already `%20`-encoded, so it is spliced in verbatim
    /// rather than passed through a form encoder, which would escape the
    /// `%` signs a second time.
    #[must_use]
    pub fn search_url(&self, query: &str) -> String {
        format!(
            "{}?searchVal={query}&returnGeom=Y&getAddrDetails=Y&pageNum=1",
            self.search_url
        )
    }
}

#[async_trait]
impl PlaceSearch for OneMapClient {
    async fn search(&self, query: &str) -> Result<Option<PlaceMatch>, GeocodeError> {
        let resp = self
            .client
            .get(self.search_url(query))
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeocodeError::Timeout
                } else {
                    GeocodeError::Http(e)
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GeocodeError::Status { status });
        }

        let body: serde_json::Value = resp.json().await?;
        parse_search_response(&body)
    }
}

/// Extracts the access token from a token response.
fn parse_token_response(body: &serde_json::Value) -> Result<String, GeocodeError> {
    if let Some(error) = body.get("error").and_then(serde_json::Value::as_str) {
        return Err(GeocodeError::Auth {
            message: error.to_string(),
        });
    }

    body.get("access_token")
        .and_then(serde_json::Value::as_str)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .ok_or_else(|| GeocodeError::Auth {
            message: "response has no access_token".to_string(),
        })
}

/// Parses a search response, keeping only the top-ranked candidate.
fn parse_search_response(body: &serde_json::Value) -> Result<Option<PlaceMatch>, GeocodeError> {
    let results = body
        .get("results")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| GeocodeError::Parse {
            message: "OneMap response missing 'results' array".to_string(),
        })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let latitude = coordinate(first, &["LATITUDE"])?;
    // Older API versions misspell this key.
    let longitude = coordinate(first, &["LONGITUDE", "LONGTITUDE"])?;

    Ok(Some(PlaceMatch {
        building: text_field(first, "BUILDING"),
        address: text_field(first, "ADDRESS"),
        block: text_field(first, "BLK_NO"),
        road: text_field(first, "ROAD_NAME"),
        postal: text_field(first, "POSTAL"),
        latitude,
        longitude,
    }))
}

/// Reads a string field, mapping `"NIL"` and blanks to `None`.
fn text_field(result: &serde_json::Value, key: &str) -> Option<String> {
    result
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "NIL")
        .map(String::from)
}

/// Reads a coordinate that OneMap may send as a string or a number.
fn coordinate(result: &serde_json::Value, keys: &[&str]) -> Result<f64, GeocodeError> {
    keys.iter()
        .find_map(|key| {
            let value = result.get(*key)?;
            value
                .as_f64()
                .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        })
        .ok_or_else(|| GeocodeError::Parse {
            message: format!("missing or invalid {}", keys[0]),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_top_candidate() {
        let body = serde_json::json!({
            "found": 2,
            "totalNumPages": 1,
            "pageNum": 1,
            "results": [
                {
                    "SEARCHVAL": "ANCHORVALE VILLAGE",
                    "BLK_NO": "10",
                    "ROAD_NAME": "ANCHORVALE STREET",
                    "BUILDING": "ANCHORVALE VILLAGE",
                    "ADDRESS": "10 ANCHORVALE STREET ANCHORVALE VILLAGE SINGAPORE 540010",
                    "POSTAL": "540010",
                    "X": "35011.4",
                    "Y": "41512.9",
                    "LATITUDE": "1.39643",
                    "LONGITUDE": "103.88931"
                },
                {
                    "SEARCHVAL": "SOMETHING ELSE",
                    "BUILDING": "OTHER",
                    "LATITUDE": "1.0",
                    "LONGITUDE": "103.0"
                }
            ]
        });

        let place = parse_search_response(&body).unwrap().unwrap();
        assert_eq!(place.building.as_deref(), Some("ANCHORVALE VILLAGE"));
        assert_eq!(place.postal.as_deref(), Some("540010"));
        assert_eq!(place.block.as_deref(), Some("10"));
        assert!((place.latitude - 1.396_43).abs() < 1e-9);
        assert!((place.longitude - 103.889_31).abs() < 1e-9);
    }

    #[test]
    fn maps_nil_building_to_none() {
        let body = serde_json::json!({
            "results": [{
                "BUILDING": "NIL",
                "ADDRESS": "406 ANG MO KIO AVENUE 10 SINGAPORE 560406",
                "POSTAL": "560406",
                "LATITUDE": "1.36",
                "LONGTITUDE": "103.85"
            }]
        });

        let place = parse_search_response(&body).unwrap().unwrap();
        assert_eq!(place.building, None);
        assert!((place.longitude - 103.85).abs() < 1e-9);
    }

    #[test]
    fn parses_empty_results() {
        let body = serde_json::json!({ "found": 0, "results": [] });
        assert!(parse_search_response(&body).unwrap().is_none());
    }

    #[test]
    fn rejects_missing_results() {
        let body = serde_json::json!({ "error": "Invalid token" });
        assert!(matches!(
            parse_search_response(&body),
            Err(GeocodeError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_bad_coordinates() {
        let body = serde_json::json!({
            "results": [{ "BUILDING": "X", "LATITUDE": "abc", "LONGITUDE": "103.8" }]
        });
        assert!(parse_search_response(&body).is_err());
    }

    #[test]
    fn parses_token() {
        let body = serde_json::json!({
            "access_token": "eyJ0eXAi",
            "expiry_timestamp": "1767225600"
        });
        assert_eq!(parse_token_response(&body).unwrap(), "eyJ0eXAi");
    }

    #[test]
    fn rejects_token_error() {
        let body = serde_json::json!({ "error": "Invalid email or password" });
        let err = parse_token_response(&body).unwrap_err();
        assert!(err.to_string().contains("Invalid email"));
    }

    #[test]
    fn builds_search_url_without_reencoding() {
        let client = OneMapClient::with_token(
            reqwest::Client::new(),
            &crate::service::onemap(),
            "t".to_string(),
        );
        assert_eq!(
            client.search_url("10%20ANCHORVALE%20STREET"),
            "https://www.onemap.gov.sg/api/common/elastic/search\
             ?searchVal=10%20ANCHORVALE%20STREET&returnGeom=Y&getAddrDetails=Y&pageNum=1"
        );
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials {
            email: "a@b.c".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }

    #[test]
    fn client_debug_hides_token() {
        let client = OneMapClient::with_token(
            reqwest::Client::new(),
            &crate::service::onemap(),
            "secret-bearer-token".to_string(),
        );
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret-bearer-token"));
        assert!(debug.contains("<redacted>"));
    }

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v).to_string())
        }
    }

    #[test]
    fn reads_credentials() {
        let creds = Credentials::from_lookup(lookup(&[
            (EMAIL_VAR, "a@b.c"),
            (PASSWORD_VAR, "hunter2"),
        ]))
        .unwrap();
        assert_eq!(creds.email, "a@b.c");
        assert_eq!(creds.password, "hunter2");
    }

    #[test]
    fn missing_email_is_named() {
        let err = Credentials::from_lookup(lookup(&[(PASSWORD_VAR, "hunter2")])).unwrap_err();
        assert!(matches!(err, GeocodeError::MissingCredentials { var } if var == EMAIL_VAR));
    }

    #[test]
    fn empty_password_is_named() {
        let err = Credentials::from_lookup(lookup(&[(EMAIL_VAR, "a@b.c"), (PASSWORD_VAR, "  ")]))
            .unwrap_err();
        assert!(matches!(err, GeocodeError::MissingCredentials { var } if var == PASSWORD_VAR));
    }

    #[test]
    fn nothing_set_names_email_first() {
        let err = Credentials::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, GeocodeError::MissingCredentials { var } if var == EMAIL_VAR));
    }
}
