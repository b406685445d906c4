use axum::extract::FromRef;
use jsonwebtoken::{decode, DecodingKey, Validation};
use tracing::debug;

use super::claims::{Claims, TokenKind};
use crate::config::JwtConfig;
use crate::state::AppState;

/// Verification side of the identity service's tokens. Tokens are issued elsewhere.
#[derive(Clone)]
pub struct JwtKeys {
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_access(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Access {
            anyhow::bail!("not an access token");
        }
        Ok(claims)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use time::OffsetDateTime;
    use uuid::Uuid;

    pub(crate) fn sign(cfg: &JwtConfig, user_id: Uuid, kind: TokenKind) -> String {
        let now = OffsetDateTime::now_utc().unix_timestamp() as usize;
        let claims = Claims {
            sub: user_id,
            iat: now,
            exp: now + 300,
            iss: cfg.issuer.clone(),
            aud: cfg.audience.clone(),
            kind,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(cfg.secret.as_bytes()),
        )
        .expect("sign")
    }

    fn cfg(secret: &str, issuer: &str, audience: &str) -> JwtConfig {
        JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }

    #[test]
    fn verifies_access_token() {
        let cfg = cfg("dev-secret", "test-issuer", "test-aud");
        let user_id = Uuid::new_v4();
        let token = sign(&cfg, user_id, TokenKind::Access);
        let claims = JwtKeys::from(&cfg).verify_access(&token).expect("verify");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
    }

    #[test]
    fn rejects_refresh_token_as_access() {
        let cfg = cfg("dev-secret", "iss", "aud");
        let token = sign(&cfg, Uuid::new_v4(), TokenKind::Refresh);
        let err = JwtKeys::from(&cfg).verify_access(&token).unwrap_err();
        assert!(err.to_string().contains("not an access token"));
    }

    #[test]
    fn rejects_wrong_issuer_or_secret() {
        let good = cfg("same-secret", "good-iss", "good-aud");
        let token = sign(&good, Uuid::new_v4(), TokenKind::Access);
        assert!(JwtKeys::from(&cfg("same-secret", "bad-iss", "good-aud"))
            .verify(&token)
            .is_err());
        assert!(JwtKeys::from(&cfg("other-secret", "good-iss", "good-aud"))
            .verify(&token)
            .is_err());
    }
}
