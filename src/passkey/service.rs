//! Passkey service implementation
//!
//! Account-level flows on top of the verification core: creating users on
//! first sign-up, turning challenges into client options, storing verified
//! credentials and keeping signature counters current.

use std::sync::Arc;

use log::{info, warn};

use crate::webauthn::{
    base64url, AuthenticationOptions, AuthenticationResponse, AuthenticationResult,
    AuthenticationVerifier, AuthenticatorSelectionCriteria, CeremonyError, CeremonyKind,
    ChallengeLedger, ConfiguredRelyingParty, Credential, CryptoBackend, PasskeySettings,
    PublicKeyCredentialDescriptor, PublicKeyCredentialParameters, RegistrationOptions,
    RegistrationResponse, RegistrationVerifier, RelyingParty, RelyingPartyPolicy, User,
    UserEntity, UserStore,
};

/// Size of generated user handles in bytes
pub const USER_HANDLE_LEN: usize = 32;

const PUBLIC_KEY_TYPE: &str = "public-key";
const ES256: i64 = -7;

/// Registration and authentication flows for email-identified accounts
#[derive(Clone)]
pub struct PasskeyService {
    settings: PasskeySettings,
    store: Arc<dyn UserStore>,
    crypto: Arc<dyn CryptoBackend>,
    ledger: ChallengeLedger,
    registration: RegistrationVerifier,
    authentication: AuthenticationVerifier,
}

impl PasskeyService {
    /// Service enforcing the configured RP ID and origins
    #[must_use]
    pub fn new(
        settings: PasskeySettings,
        store: Arc<dyn UserStore>,
        crypto: Arc<dyn CryptoBackend>,
    ) -> Self {
        let policy = Arc::new(ConfiguredRelyingParty::new(
            &settings.rp_id,
            settings.rp_origins.clone(),
            crypto.as_ref(),
        ));
        Self::with_policy(settings, store, crypto, policy)
    }

    /// Service with a custom relying party policy
    #[must_use]
    pub fn with_policy(
        settings: PasskeySettings,
        store: Arc<dyn UserStore>,
        crypto: Arc<dyn CryptoBackend>,
        policy: Arc<dyn RelyingPartyPolicy>,
    ) -> Self {
        let ledger = ChallengeLedger::new(store.clone(), crypto.clone(), settings.challenge_ttl());
        let require_uv = settings.requires_user_verification();
        let registration = RegistrationVerifier::new(ledger.clone(), policy.clone(), require_uv);
        let authentication = AuthenticationVerifier::new(
            ledger.clone(),
            store.clone(),
            crypto.clone(),
            policy,
            require_uv,
        );
        Self {
            settings,
            store,
            crypto,
            ledger,
            registration,
            authentication,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &PasskeySettings {
        &self.settings
    }

    /// Begin registration, creating the user on first contact
    ///
    /// A returning user keeps their user handle and existing credentials.
    ///
    /// # Errors
    /// Returns `MalformedInput` for an empty email, `Crypto` if randomness
    /// fails, or `Store` on backend failure.
    pub fn start_registration(&self, email: &str) -> Result<RegistrationOptions, CeremonyError> {
        let email = normalize_email(email)?;
        let fresh = User::new(self.crypto.random_bytes(USER_HANDLE_LEN)?, &email);
        let (user, created) = self.store.get_or_insert(&email, fresh)?;
        if created {
            info!("Created user record for {email}");
        }

        let challenge = self.ledger.issue(&email, CeremonyKind::Registration)?;
        Ok(RegistrationOptions {
            rp: RelyingParty {
                id: self.settings.rp_id.clone(),
                name: self.settings.rp_name.clone(),
            },
            user: UserEntity {
                id: base64url::encode(&user.id),
                name: email.clone(),
                display_name: email,
            },
            challenge: base64url::encode(&challenge.value),
            public_key_params: vec![PublicKeyCredentialParameters {
                r#type: PUBLIC_KEY_TYPE.to_string(),
                alg: ES256,
            }],
            authenticator_selection: AuthenticatorSelectionCriteria {
                resident_key: self.settings.resident_key.clone(),
                user_verification: self.settings.user_verification.clone(),
                authenticator_attachment: self.settings.authenticator_attachment.clone(),
            },
            timeout: self.settings.timeout_millis(),
            attestation: "none".to_string(),
        })
    }

    /// Verify a registration response and store the new credential
    ///
    /// # Errors
    /// `UnknownUser` if registration was never started for this email,
    /// `DuplicateCredential` if the credential ID is already registered, or
    /// any verification error.
    pub fn finish_registration(
        &self,
        email: &str,
        response: &RegistrationResponse,
    ) -> Result<Credential, CeremonyError> {
        let email = normalize_email(email)?;
        if self.store.get(&email)?.is_none() {
            return Err(CeremonyError::UnknownUser);
        }

        let credential = self
            .registration
            .verify_registration(&email, response)
            .inspect_err(|e| warn!("Registration rejected for {email}: {e}"))?;

        self.store
            .update(&email, &mut |user: &mut User| {
                if user.credential(&credential.id).is_some() {
                    return Err(CeremonyError::DuplicateCredential);
                }
                user.credentials.push(credential.clone());
                Ok(())
            })
            .inspect_err(|e| warn!("Registration rejected for {email}: {e}"))?;

        info!(
            "Stored credential {} for {email} ({} total)",
            credential.id,
            self.credential_count(&email)
        );
        Ok(credential)
    }

    /// Begin authentication for a user with at least one credential
    ///
    /// # Errors
    /// `UnknownUser` if the user does not exist or has no credentials,
    /// `Crypto` / `Store` on internal failure.
    pub fn start_authentication(
        &self,
        email: &str,
    ) -> Result<AuthenticationOptions, CeremonyError> {
        let email = normalize_email(email)?;
        let user = self
            .store
            .get(&email)?
            .filter(|user| !user.credentials.is_empty())
            .ok_or(CeremonyError::UnknownUser)?;

        let challenge = self.ledger.issue(&email, CeremonyKind::Authentication)?;
        Ok(AuthenticationOptions {
            challenge: base64url::encode(&challenge.value),
            rp_id: self.settings.rp_id.clone(),
            allow_credentials: user
                .credentials
                .iter()
                .map(|credential| PublicKeyCredentialDescriptor {
                    r#type: PUBLIC_KEY_TYPE.to_string(),
                    id: credential.id.clone(),
                })
                .collect(),
            user_verification: self.settings.user_verification.clone(),
            timeout: self.settings.timeout_millis(),
        })
    }

    /// Verify an assertion and advance the credential's signature counter
    ///
    /// # Errors
    /// `CounterRegression` if the reported counter does not advance, or any
    /// verification error.
    pub fn finish_authentication(
        &self,
        email: &str,
        response: &AuthenticationResponse,
    ) -> Result<AuthenticationResult, CeremonyError> {
        let email = normalize_email(email)?;
        let result = self
            .authentication
            .verify_assertion(&email, response)
            .inspect_err(|e| warn!("Authentication rejected for {email}: {e}"))?;

        self.store
            .update(&email, &mut |user: &mut User| {
                let credential = user
                    .credential_mut(&result.credential_id)
                    .ok_or(CeremonyError::UnknownCredential)?;
                check_counter(credential.sign_count, result.sign_count)?;
                credential.sign_count = result.sign_count;
                credential.last_used = Some(result.authenticated_at);
                Ok(())
            })
            .inspect_err(|e| warn!("Authentication rejected for {email}: {e}"))?;

        info!("User {email} signed in with credential {}", result.credential_id);
        Ok(result)
    }

    fn credential_count(&self, email: &str) -> usize {
        self.store
            .get(email)
            .ok()
            .flatten()
            .map_or(0, |user| user.credentials.len())
    }
}

/// Signature counter rule
///
/// Authenticators without a counter always report zero. Once either side is
/// non-zero the reported value must be strictly greater than the stored one.
///
/// # Errors
/// Returns `CounterRegression` when the counter did not advance.
pub fn check_counter(stored: u32, received: u32) -> Result<(), CeremonyError> {
    if (stored != 0 || received != 0) && received <= stored {
        return Err(CeremonyError::CounterRegression);
    }
    Ok(())
}

fn normalize_email(email: &str) -> Result<String, CeremonyError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(CeremonyError::MalformedInput("email is empty".to_string()));
    }
    Ok(email.to_string())
}
