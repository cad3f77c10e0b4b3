//! Passkey settings
//!
//! Relying party identity and ceremony parameters, independent of how the
//! surrounding application loads its configuration.

use anyhow::{bail, Context};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use url::Url;

const USER_VERIFICATION_VALUES: &[&str] = &["required", "preferred", "discouraged"];

/// Settings shared by the ceremonies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasskeySettings {
    /// Relying Party ID (usually the domain)
    pub rp_id: String,
    /// Relying Party name (displayed to user)
    pub rp_name: String,
    /// Origins allowed to appear in client data (e.g., <https://example.com>)
    pub rp_origins: Vec<String>,
    /// Client-side ceremony timeout in seconds
    pub timeout_seconds: u64,
    /// How long an issued challenge stays usable
    pub challenge_ttl_seconds: u64,
    /// User verification preference ("required", "preferred", "discouraged")
    pub user_verification: String,
    /// Resident key preference ("required", "preferred", "discouraged")
    pub resident_key: String,
    /// Optional authenticator attachment ("platform", "cross-platform")
    pub authenticator_attachment: Option<String>,
}

impl Default for PasskeySettings {
    fn default() -> Self {
        Self {
            rp_id: "localhost".to_string(),
            rp_name: "Example RP".to_string(),
            rp_origins: vec![
                "https://localhost".to_string(),
                "http://localhost:3000".to_string(),
                "http://localhost:8080".to_string(),
            ],
            timeout_seconds: 60,
            challenge_ttl_seconds: 300,
            user_verification: "preferred".to_string(),
            resident_key: "preferred".to_string(),
            authenticator_attachment: None,
        }
    }
}

impl PasskeySettings {
    /// Timeout advertised to the client, in milliseconds
    #[must_use]
    pub fn timeout_millis(&self) -> u32 {
        u32::try_from(self.timeout_seconds.saturating_mul(1000)).unwrap_or(u32::MAX)
    }

    /// Challenge time-to-live
    #[must_use]
    pub fn challenge_ttl(&self) -> Duration {
        let seconds = i64::try_from(self.challenge_ttl_seconds)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1000);
        Duration::seconds(seconds)
    }

    /// Whether the UV flag is mandatory
    #[must_use]
    pub fn requires_user_verification(&self) -> bool {
        self.user_verification == "required"
    }

    /// Check the settings for values that would make every ceremony fail
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the RP ID is empty or no origin is configured
    /// - an origin does not parse, is plain HTTP on a host other than
    ///   localhost, or is not on the RP ID or one of its subdomains
    /// - the user verification value is unknown
    /// - the challenge TTL is zero
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rp_id.trim().is_empty() {
            bail!("rp_id must not be empty");
        }
        if self.rp_origins.is_empty() {
            bail!("at least one origin must be configured");
        }
        for origin in &self.rp_origins {
            self.validate_origin(origin)?;
        }
        if !USER_VERIFICATION_VALUES.contains(&self.user_verification.as_str()) {
            bail!(
                "user_verification must be one of {USER_VERIFICATION_VALUES:?}, got {}",
                self.user_verification
            );
        }
        if self.challenge_ttl_seconds == 0 {
            bail!("challenge_ttl_seconds must be greater than zero");
        }
        Ok(())
    }

    fn validate_origin(&self, origin: &str) -> anyhow::Result<()> {
        let url = Url::parse(origin).with_context(|| format!("invalid origin {origin}"))?;
        let host = url
            .host_str()
            .with_context(|| format!("origin {origin} has no host"))?;

        match url.scheme() {
            "https" => {}
            "http" if host == "localhost" => {}
            scheme => bail!("origin {origin} uses {scheme}; only https is allowed off localhost"),
        }

        if host != self.rp_id && !host.ends_with(&format!(".{}", self.rp_id)) {
            bail!("origin {origin} is not on RP ID {}", self.rp_id);
        }
        Ok(())
    }
}
