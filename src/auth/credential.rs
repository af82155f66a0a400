use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Shortest sleep the renewal loop will schedule. A token already inside
/// its renewal window is renewed right away without spinning.
pub const MIN_RENEW_DELAY: Duration = Duration::from_millis(1);

/// A Vault token and its lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub accessor: Option<String>,
    pub policies: Vec<String>,
    /// Zero means the token does not expire.
    pub lease_duration: Duration,
    pub renewable: bool,
    pub obtained_at: Instant,
}

impl Credential {
    pub fn new(token: String, lease_duration: Duration, renewable: bool) -> Self {
        Self {
            token,
            accessor: None,
            policies: Vec::new(),
            lease_duration,
            renewable,
            obtained_at: Instant::now(),
        }
    }

    /// Static token (never expires)
    pub fn static_token(token: String) -> Self {
        Self::new(token, Duration::ZERO, false)
    }

    pub fn expires(&self) -> bool {
        !self.lease_duration.is_zero()
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires()
            .then(|| self.obtained_at + self.lease_duration)
    }

    /// Instant at which renewal should start: `renew_before` ahead of expiry.
    pub fn renew_at(&self, renew_before: Duration) -> Option<Instant> {
        self.expires_at().map(|expiry| {
            expiry
                .checked_sub(renew_before)
                .unwrap_or(self.obtained_at)
        })
    }

    /// How long to wait from `now` before renewing, never less than
    /// [`MIN_RENEW_DELAY`]. `None` for tokens that do not expire.
    pub fn renew_in(&self, now: Instant, renew_before: Duration) -> Option<Duration> {
        self.renew_at(renew_before)
            .map(|at| at.saturating_duration_since(now).max(MIN_RENEW_DELAY))
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at()
            .is_some_and(|expiry| Instant::now() >= expiry)
    }
}

/// `auth` block of a login or renew-self response.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthInfo {
    pub client_token: String,
    #[serde(default)]
    pub accessor: String,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub token_policies: Vec<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub entity_id: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub orphan: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub auth: AuthInfo,
}

impl From<AuthInfo> for Credential {
    fn from(auth: AuthInfo) -> Self {
        Self {
            accessor: (!auth.accessor.is_empty()).then_some(auth.accessor),
            policies: auth.policies,
            ..Credential::new(
                auth.client_token,
                Duration::from_secs(auth.lease_duration),
                auth.renewable,
            )
        }
    }
}

impl From<AuthResponse> for Credential {
    fn from(response: AuthResponse) -> Self {
        response.auth.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(lease_secs: u64, obtained_at: Instant) -> Credential {
        Credential {
            obtained_at,
            ..Credential::new("test".to_string(), Duration::from_secs(lease_secs), true)
        }
    }

    #[test]
    fn test_static_token_never_expires() {
        let token = Credential::static_token("test".to_string());
        assert!(!token.expires());
        assert!(!token.is_expired());
        assert_eq!(token.renew_in(Instant::now(), Duration::from_secs(10)), None);
    }

    #[test]
    fn test_renewal_scheduled_ten_seconds_before_expiry() {
        let now = Instant::now();
        let token = credential(100, now);
        assert_eq!(token.renew_at(Duration::from_secs(10)), Some(now + Duration::from_secs(90)));
        assert_eq!(
            token.renew_in(now, Duration::from_secs(10)),
            Some(Duration::from_secs(90))
        );
    }

    #[test]
    fn test_short_lease_clamped_to_minimal_delay() {
        let now = Instant::now();
        let token = credential(5, now);
        assert_eq!(token.renew_in(now, Duration::from_secs(10)), Some(MIN_RENEW_DELAY));
    }

    #[test]
    fn test_past_renewal_point_clamped_to_minimal_delay() {
        let now = Instant::now();
        let token = credential(100, now);
        let later = now + Duration::from_secs(95);
        assert_eq!(token.renew_in(later, Duration::from_secs(10)), Some(MIN_RENEW_DELAY));
    }

    #[test]
    fn test_auth_response_maps_to_credential() {
        let json = r#"{
            "auth": {
                "client_token": "s.abc",
                "accessor": "acc",
                "policies": ["default", "app"],
                "metadata": {"role": "app"},
                "lease_duration": 3600,
                "renewable": true
            }
        }"#;
        let response: AuthResponse = serde_json::from_str(json).unwrap();
        let credential = Credential::from(response);
        assert_eq!(credential.token, "s.abc");
        assert_eq!(credential.accessor.as_deref(), Some("acc"));
        assert_eq!(credential.policies, vec!["default", "app"]);
        assert_eq!(credential.lease_duration, Duration::from_secs(3600));
        assert!(credential.renewable);
    }
}
