use std::sync::LazyLock;

use fancy_regex::Regex;
use reqwest::Client;
use reqwest::header::{CACHE_CONTROL, EXPIRES, PRAGMA};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::client::{ApiError, ApiResult, error_message, read_json};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});
static USERNAME_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9.]+$").expect("username pattern is a valid regex")
});

const MIN_PASSWORD_LEN: usize = 8;
const MIN_USERNAME_LEN: usize = 6;

fn pattern_matches(pattern: &Regex, text: &str) -> bool {
    pattern.is_match(text).unwrap_or(false)
}

pub fn validate_email(email: &str) -> bool {
    pattern_matches(&EMAIL_PATTERN, email)
}

pub fn validate_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

/// Letters, digits and at most one inner dot; six characters or more with at
/// least one letter.
pub fn validate_username(username: &str) -> bool {
    pattern_matches(&USERNAME_CHARS, username)
        && username.len() >= MIN_USERNAME_LEN
        && username.chars().any(|ch| ch.is_ascii_alphabetic())
        && username.matches('.').count() <= 1
        && !username.starts_with('.')
        && !username.ends_with('.')
}

/// Result of the account helpers that report failures as data.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthOutcome {
    pub success: bool,
    pub status: u16,
    pub data: Option<Value>,
    pub details: Option<String>,
}

impl AuthOutcome {
    const TRANSPORT_FAILURE_STATUS: u16 = 500;

    fn from_result(result: ApiResult<Value>, fallback: &str) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                status: 200,
                data: Some(data),
                details: None,
            },
            Err(ApiError::Status { status, message }) => Self {
                success: false,
                status,
                data: None,
                details: Some(message),
            },
            Err(error) => {
                warn!("auth request failed before a response: {error}");
                Self {
                    success: false,
                    status: Self::TRANSPORT_FAILURE_STATUS,
                    data: None,
                    details: Some(fallback.to_owned()),
                }
            }
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub organization: String,
    pub username: String,
    pub password: String,
    pub email: String,
}

/// Session-cookie client for the authentication service.
#[derive(Clone, Debug)]
pub struct AuthClient {
    base_url: String,
    client: Client,
}

impl AuthClient {
    pub fn new(base_url: &str) -> ApiResult<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(concat!("edgescope/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| ApiError::Client(error.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> ApiResult<Value> {
        debug!(path, "POST");
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        // Some endpoints answer with an empty body.
        let status = response.status();
        let text = response.text().await.map_err(ApiError::from_transport)?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if status.is_success() {
            Ok(body)
        } else {
            Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&body).unwrap_or_else(|| {
                    status.canonical_reason().unwrap_or("request failed").to_owned()
                }),
            })
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> ApiResult<Value> {
        self.post(
            "login",
            &json!({ "username": username, "password": password }),
        )
        .await
    }

    pub async fn logout(&self) -> ApiResult<()> {
        self.post("logout", &json!({})).await.map(|_| ())
    }

    /// Whether the stored session cookie is still accepted.
    pub async fn check(&self) -> ApiResult<bool> {
        let response = self
            .client
            .get(self.url("check"))
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .header(EXPIRES, "0")
            .header("X-Auth-Check", "true")
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        match read_json::<Value>(response).await {
            Ok(_) => Ok(true),
            Err(ApiError::Status { status: 401 | 403, .. }) => Ok(false),
            Err(ApiError::InvalidResponse(_)) => Ok(true),
            Err(error) => Err(error),
        }
    }

    pub async fn change_password(&self, old_password: &str, new_password: &str) -> ApiResult<()> {
        self.post(
            "change_password",
            &json!({ "oldPassword": old_password, "newPassword": new_password }),
        )
        .await
        .map(|_| ())
    }

    pub async fn register(&self, registration: &Registration) -> AuthOutcome {
        AuthOutcome::from_result(self.post("register", registration).await, "Failed to register")
    }

    pub async fn recover_password(&self, email: &str) -> AuthOutcome {
        AuthOutcome::from_result(
            self.post("recover-password", &json!({ "email": email })).await,
            "Failed to send recovery email",
        )
    }

    pub async fn resend_verification(&self, email: &str) -> AuthOutcome {
        AuthOutcome::from_result(
            self.post("resend-verification", &json!({ "email": email }))
                .await,
            "Failed to resend verification email",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_patterns_compile() {
        assert!(LazyLock::force(&EMAIL_PATTERN).is_match("ops@example.com").unwrap_or(false));
        assert!(LazyLock::force(&USERNAME_CHARS).is_match("ops.user1").unwrap_or(false));
    }

    #[test]
    fn email_needs_local_part_domain_and_suffix() {
        assert!(validate_email("ops@example.com"));
        assert!(validate_email("a.b+c@sub.example.io"));
        assert!(!validate_email("ops@example"));
        assert!(!validate_email("ops example@x.io"));
        assert!(!validate_email("@example.com"));
        assert!(!validate_email(""));
    }

    #[test]
    fn password_needs_eight_characters() {
        assert!(validate_password("12345678"));
        assert!(!validate_password("1234567"));
    }

    #[test]
    fn username_rules() {
        assert!(validate_username("operator"));
        assert!(validate_username("op.erator1"));
        assert!(!validate_username("short"));
        assert!(!validate_username("123456"));
        assert!(!validate_username("op.er.ator"));
        assert!(!validate_username(".operator"));
        assert!(!validate_username("operator."));
        assert!(!validate_username("oper_ator"));
        assert!(!validate_username("opérateur"));
    }

    #[test]
    fn outcome_keeps_server_status_and_details() {
        let outcome = AuthOutcome::from_result(
            Err(ApiError::Status {
                status: 409,
                message: "Username already taken".to_owned(),
            }),
            "Failed to register",
        );
        assert!(!outcome.success);
        assert_eq!(outcome.status, 409);
        assert_eq!(outcome.details.as_deref(), Some("Username already taken"));
    }

    #[test]
    fn outcome_defaults_to_500_without_a_response() {
        let outcome = AuthOutcome::from_result(
            Err(ApiError::Connection("dns".to_owned())),
            "Failed to send recovery email",
        );
        assert!(!outcome.success);
        assert_eq!(outcome.status, 500);
        assert_eq!(outcome.details.as_deref(), Some("Failed to send recovery email"));
        assert!(outcome.data.is_none());
    }

    #[test]
    fn registration_serializes_camel_case() {
        let body = serde_json::to_value(Registration {
            first_name: "Ada".to_owned(),
            last_name: "L".to_owned(),
            ..Registration::default()
        })
        .expect("serialize");
        assert_eq!(body["firstName"], "Ada");
        assert_eq!(body["lastName"], "L");
        assert!(body.get("organization").is_some());
    }
}
