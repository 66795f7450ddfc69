//! Session lifecycle management.
//!
//! Owns the authentication token and validated user profile. The shell
//! observes state transitions through a watch channel and gates
//! navigation on the published snapshot; it never mutates the session
//! directly.
//!
//! ## Lifecycle
//!
//! ```text
//! Initializing ──no stored token──▶ Unauthenticated
//!       │
//!       └──token found──▶ validate ──ok──▶ Authenticated
//!                             │
//!                             └──rejected──▶ Unauthenticated (token purged)
//!
//! Unauthenticated ──sign_in──▶ Authenticating ──▶ Authenticated | Unauthenticated
//! Authenticated ──sign_out──▶ Invalidating ──▶ Unauthenticated (always)
//! ```
//!
//! A token rejected by the server (non-2xx) is purged from disk and
//! memory in the same step; a validation attempt that fails for
//! transport reasons leaves the stored token untouched so a transient
//! outage does not log the user out.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ApiError;
use crate::store::TokenStore;

/// Profile of the signed-in user, replaced wholesale on each
/// successful validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    #[serde(default)]
    pub receive_notifications: bool,
}

/// Observable session snapshot published to the shell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Bearer token, if any. Present does not imply valid.
    pub token: Option<String>,
    /// Profile fetched during the last successful validation.
    pub profile: Option<UserProfile>,
    /// True once the current token has been confirmed by a profile fetch.
    pub validated: bool,
    /// True while startup, sign-in, or sign-out is in flight.
    pub loading: bool,
}

impl SessionState {
    /// Returns true when the session holds a validated token.
    pub fn is_authenticated(&self) -> bool {
        self.validated && self.token.is_some() && self.profile.is_some()
    }
}

/// Shape of the credential exchange response.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// Session manager: token persistence, validation, and observable state.
pub struct Session {
    base_url: String,
    http: reqwest::Client,
    store: TokenStore,
    state: Mutex<SessionState>,
    tx: watch::Sender<SessionState>,
}

impl Session {
    /// Creates a session against the configured API with an explicit
    /// token store.
    pub fn new(config: &Config, store: TokenStore) -> anyhow::Result<Self> {
        let base_url = config.resolve_base_url()?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        let (tx, _rx) = watch::channel(SessionState::default());
        Ok(Self {
            base_url,
            http,
            store,
            state: Mutex::new(SessionState::default()),
            tx,
        })
    }

    /// Creates a session with the default token store location.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(config, TokenStore::at_default_path())
    }

    /// Subscribes to session state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.state.lock().expect("session state poisoned").clone()
    }

    /// Returns the current bearer token, if any.
    pub fn token(&self) -> Option<String> {
        self.state
            .lock()
            .expect("session state poisoned")
            .token
            .clone()
    }

    /// Mutates the state and publishes the new snapshot.
    fn update(&self, apply: impl FnOnce(&mut SessionState)) {
        let mut guard = self.state.lock().expect("session state poisoned");
        apply(&mut guard);
        let snapshot = guard.clone();
        drop(guard);
        self.tx.send_replace(snapshot);
    }

    /// Loads the persisted token and validates it.
    ///
    /// Never fails: startup problems resolve to the unauthenticated
    /// state instead of surfacing to the shell.
    pub async fn initialize(&self) {
        self.update(|s| s.loading = true);

        let stored = match self.store.load() {
            Ok(token) => token,
            Err(e) => {
                warn!("failed to load persisted token: {:#}", e);
                None
            }
        };

        if let Some(token) = stored {
            debug!("found persisted token {}", TokenStore::mask(&token));
            self.update(|s| s.token = Some(token));
            self.validate_token(None).await;
        }

        self.update(|s| s.loading = false);
    }

    /// Exchanges credentials for a token, persists it, and validates it.
    ///
    /// The token is persisted before this returns. Any failure after a
    /// successful exchange discards the partial token again.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), ApiError> {
        self.update(|s| s.loading = true);
        let result = self.sign_in_inner(email, password).await;
        self.update(|s| s.loading = false);
        result
    }

    async fn sign_in_inner(&self, email: &str, password: &str) -> Result<(), ApiError> {
        let url = format!("{}/auth/mobile/login", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ApiError::authentication(status.as_u16(), &body));
        }

        let token = serde_json::from_str::<LoginResponse>(&body)
            .map_err(|e| ApiError::parse(format!("Failed to decode login response: {}", e)))?
            .token;

        // Persist before exposing the token; a signed-in session must
        // always be recoverable after restart.
        if let Err(e) = self.store.save(&token) {
            warn!("failed to persist session token: {:#}", e);
            return Err(ApiError::validation("Could not persist the session token"));
        }
        self.update(|s| {
            s.token = Some(token.clone());
            s.profile = None;
            s.validated = false;
        });

        if self.validate_token(Some(&token)).await {
            Ok(())
        } else {
            // The exchange succeeded but the token never produced a
            // profile; treat as a failed login and discard it.
            self.force_invalidate();
            Err(ApiError::validation(
                "Login succeeded but the session could not be validated",
            ))
        }
    }

    /// Ends the session. Never fails from the caller's perspective.
    ///
    /// The remote logout notification is best-effort; the persisted
    /// token and in-memory state are cleared regardless.
    pub async fn sign_out(&self) {
        let token = self.token();
        self.update(|s| s.loading = true);

        if let Some(token) = token {
            let url = format!("{}/auth/logout", self.base_url);
            match self.http.post(&url).bearer_auth(&token).send().await {
                Ok(response) => debug!("logout notification returned {}", response.status()),
                Err(e) => warn!("logout notification failed: {}", e),
            }
        }

        self.force_invalidate();
    }

    /// Validates a token by fetching the profile it belongs to.
    ///
    /// Defaults to the current in-memory token; returns false with no
    /// request made when none is available. A non-2xx response purges
    /// the stored token and clears the session; a transport or decode
    /// failure only reports invalid, keeping storage untouched.
    pub async fn validate_token(&self, token_override: Option<&str>) -> bool {
        let token = token_override.map(str::to_owned).or_else(|| self.token());
        let Some(token) = token else {
            return false;
        };

        let url = format!("{}/auth/me", self.base_url);
        let response = match self.http.get(&url).bearer_auth(&token).send().await {
            Ok(response) => response,
            Err(e) => {
                // Could not confirm either way; the stored token stays.
                debug!("token validation request failed: {}", e);
                self.update(|s| s.validated = false);
                return false;
            }
        };

        if !response.status().is_success() {
            debug!("token rejected with HTTP {}", response.status());
            self.force_invalidate();
            return false;
        }

        match response.json::<UserProfile>().await {
            Ok(profile) => {
                self.update(|s| {
                    s.token = Some(token);
                    s.profile = Some(profile);
                    s.validated = true;
                });
                true
            }
            Err(e) => {
                warn!("failed to decode profile response: {}", e);
                self.update(|s| s.validated = false);
                false
            }
        }
    }

    /// The single definition of "session ended": purges the persisted
    /// token and clears in-memory state in one step.
    ///
    /// Invoked on confirmed-invalid validation, sign-out, and every 401
    /// observed by the request helper.
    pub fn force_invalidate(&self) {
        if let Err(e) = self.store.clear() {
            warn!("failed to clear persisted token: {:#}", e);
        }
        self.update(|s| *s = SessionState::default());
    }
}

/// Classifies a reqwest error into an ApiError.
pub(crate) fn classify_transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::timeout(format!("Request timed out: {}", e))
    } else if e.is_connect() {
        ApiError::network(format!("Connection failed: {}", e))
    } else {
        ApiError::network(format!("Network error: {}", e))
    }
}
