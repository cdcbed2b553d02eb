//! HS256 bearer tokens.
//!
//! Tokens use the compact JWT layout
//! `base64url(header).base64url(claims).base64url(signature)` with an
//! HMAC-SHA256 signature over the first two segments.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use super::AuthError;
use crate::data::{Role, User};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Claims carried by a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    /// Issued at (seconds since the Unix epoch)
    pub iat: i64,
    /// Expires at (seconds since the Unix epoch)
    pub exp: i64,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Issues and verifies bearer tokens with a shared secret
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `user` valid from now
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        self.issue_at(user, Utc::now())
    }

    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        self.encode(&claims)
    }

    /// Sign arbitrary claims
    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        let header = Header {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        };
        let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let signing_input = format!("{}.{}", header, payload);

        let mac = self.mac(signing_input.as_bytes())?;
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{}.{}", signing_input, signature))
    }

    /// Verify signature and expiry
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::Malformed);
        };

        let header: Header = decode_segment(header)?;
        if header.alg != "HS256" {
            return Err(AuthError::Malformed);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::Malformed)?;
        self.mac(token_prefix(token).as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| AuthError::InvalidSignature)?;

        let claims: Claims = decode_segment(payload)?;
        if now.timestamp() >= claims.exp {
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }

    fn mac(&self, input: &[u8]) -> Result<HmacSha256, AuthError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|e| AuthError::Key(e.to_string()))?;
        mac.update(input);
        Ok(mac)
    }
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// The `header.payload` part of a token
fn token_prefix(token: &str) -> &str {
    token.rsplit_once('.').map(|(prefix, _)| prefix).unwrap_or(token)
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new("test-secret", Duration::hours(1))
    }

    fn student() -> User {
        User::new("sid", "Sid", Role::Student, "pw")
    }

    #[test]
    fn test_issue_and_verify() {
        let signer = signer();
        let user = student();
        let token = signer.issue(&user).unwrap();

        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.username, "sid");
        assert_eq!(claims.role, Role::Student);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_expired_token() {
        let signer = signer();
        let issued = Utc::now() - Duration::hours(2);
        let token = signer.issue_at(&student(), issued).unwrap();

        assert!(matches!(signer.verify(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let token = signer().issue(&student()).unwrap();
        let other = TokenSigner::new("other-secret", Duration::hours(1));

        assert!(matches!(
            other.verify(&token),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_tampered_claims_are_rejected() {
        let signer = signer();
        let token = signer.issue(&student()).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let mut claims: Claims = decode_segment(parts[1]).unwrap();
        claims.role = Role::Teacher;
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert!(matches!(
            signer.verify(&forged),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_malformed_tokens() {
        let signer = signer();
        for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            assert!(
                matches!(signer.verify(token), Err(AuthError::Malformed)),
                "{} should be malformed",
                token
            );
        }
    }
}
