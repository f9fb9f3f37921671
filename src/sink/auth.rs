//! Hub credentials.
//!
//! Two credentials authorize every hub request:
//!
//! - An **API signature**: HMAC-SHA256 of an expiry timestamp under the API
//!   secret, sent with the API key. Recomputed per request, so it never
//!   expires during a long run.
//! - A **session token**: obtained once at startup by signing a hub-issued
//!   challenge with the user's Ed25519 identity key.
//!
//! The resulting [`HubAuth`] is built once and injected into the hub store as
//! an [`Authenticator`].

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, instrument};

type HmacSha256 = Hmac<Sha256>;

/// How long each API signature stays valid, in minutes.
const SIGNATURE_TTL_MINUTES: i64 = 30;

/// Errors from establishing hub credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The identity key is not a hex-encoded 32-byte Ed25519 seed.
    #[error("invalid identity key: {0}")]
    InvalidKey(String),

    /// The hub could not be reached.
    #[error("hub request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The hub answered with a non-success status.
    #[error("hub rejected {step} (HTTP {status}): {body}")]
    Rejected {
        step: &'static str,
        status: u16,
        body: String,
    },

    /// The hub's challenge was not valid hex.
    #[error("malformed challenge: {0}")]
    MalformedChallenge(String),
}

/// Adds hub credentials to outgoing requests.
pub trait Authenticator: Send + Sync {
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder;
}

/// A signed API message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSignature {
    /// The signed message: an RFC 3339 expiry timestamp.
    pub msg: String,
    /// Hex HMAC-SHA256 of `msg` under the API secret.
    pub sig: String,
}

/// The hub API key and secret.
#[derive(Clone)]
pub struct ApiCredentials {
    key: String,
    secret: String,
}

impl ApiCredentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// Signs an expiry timestamp.
    pub fn sign(&self, expires: DateTime<Utc>) -> ApiSignature {
        let msg = expires.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC can take key of any size");
        mac.update(msg.as_bytes());
        let sig = hex::encode(mac.finalize().into_bytes());
        ApiSignature { msg, sig }
    }

    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let signature = self.sign(Utc::now() + Duration::minutes(SIGNATURE_TTL_MINUTES));
        request
            .header("x-api-key", &self.key)
            .header("x-api-sig", signature.sig)
            .header("x-api-sig-msg", signature.msg)
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// The user's Ed25519 identity.
#[derive(Clone)]
pub struct Identity {
    signing_key: SigningKey,
}

impl Identity {
    /// Parses a hex-encoded 32-byte seed.
    pub fn from_hex(encoded: &str) -> Result<Self, AuthError> {
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| AuthError::InvalidKey(format!("not hex: {e}")))?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AuthError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())))?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// The public key, hex encoded. This is the user's identity on the hub.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key().as_bytes())
    }

    /// Signs a hub challenge.
    pub fn sign_challenge(&self, challenge: &[u8]) -> Vec<u8> {
        self.signing_key.sign(challenge).to_bytes().to_vec()
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct ChallengeRequest<'a> {
    public_key: &'a str,
}

#[derive(Deserialize)]
struct ChallengeResponse {
    challenge: String,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    public_key: &'a str,
    signature: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

/// Hub credentials for one user: API signature plus session token.
#[derive(Clone)]
pub struct HubAuth {
    api: ApiCredentials,
    token: String,
}

impl std::fmt::Debug for HubAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubAuth")
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}

impl HubAuth {
    /// Wraps an already-issued session token.
    pub fn with_token(api: ApiCredentials, token: impl Into<String>) -> Self {
        Self {
            api,
            token: token.into(),
        }
    }

    /// Obtains a session token by answering the hub's challenge with `identity`.
    #[instrument(skip(http, identity, api), fields(public_key = %identity.public_key_hex()))]
    pub async fn establish(
        http: &reqwest::Client,
        hub_url: &str,
        identity: &Identity,
        api: ApiCredentials,
    ) -> Result<Self, AuthError> {
        let base = hub_url.trim_end_matches('/');
        let public_key = identity.public_key_hex();

        let response = api
            .apply(http.post(format!("{base}/auth/challenge")))
            .json(&ChallengeRequest {
                public_key: &public_key,
            })
            .send()
            .await?;
        let challenge: ChallengeResponse = ensure_success("challenge", response).await?.json().await?;
        let challenge = hex::decode(&challenge.challenge)
            .map_err(|e| AuthError::MalformedChallenge(e.to_string()))?;

        let response = api
            .apply(http.post(format!("{base}/auth/token")))
            .json(&TokenRequest {
                public_key: &public_key,
                signature: hex::encode(identity.sign_challenge(&challenge)),
            })
            .send()
            .await?;
        let token: TokenResponse = ensure_success("token", response).await?.json().await?;

        debug!("Obtained hub session token");
        Ok(Self::with_token(api, token.token))
    }
}

impl Authenticator for HubAuth {
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        self.api.apply(request).bearer_auth(&self.token)
    }
}

async fn ensure_success(
    step: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AuthError::Rejected {
        step,
        status: status.as_u16(),
        body,
    })
}
