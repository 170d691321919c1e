use crate::application_port::*;
use crate::domain_model::*;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::time::Duration;

/// Claims the codec owns. Custom claims using these names are dropped.
const RESERVED_CLAIMS: [&str; 7] = ["sub", "iss", "aud", "exp", "iat", "jti", "tokenType"];

#[derive(Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: Audience,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

struct KindKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl KindKeys {
    fn new(secret: &[u8], ttl: Duration) -> Self {
        KindKeys {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }
}

/// HS256 codec holding one independent secret per token kind.
pub struct JwtTokenCodec {
    issuer: String,
    audience: Audience,
    access: KindKeys,
    refresh: KindKeys,
    validation: Validation,
}

impl JwtTokenCodec {
    pub fn new(cfg: JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_audience(&cfg.audience.to_vec());
        validation.set_issuer(&[cfg.issuer.clone()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        JwtTokenCodec {
            access: KindKeys::new(&cfg.access_secret, cfg.access_ttl),
            refresh: KindKeys::new(&cfg.refresh_secret, cfg.refresh_ttl),
            issuer: cfg.issuer,
            audience: cfg.audience,
            validation,
        }
    }

    fn keys(&self, kind: TokenKind) -> &KindKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }
}

fn codec_error(error: jsonwebtoken::errors::Error) -> CodecError {
    match error.kind() {
        ErrorKind::ExpiredSignature => CodecError::Expired,
        ErrorKind::InvalidSignature => CodecError::InvalidSignature,
        ErrorKind::InvalidIssuer => CodecError::IssuerMismatch,
        ErrorKind::InvalidAudience => CodecError::AudienceMismatch,
        _ => CodecError::Malformed(error.to_string()),
    }
}

#[async_trait::async_trait]
impl TokenCodec for JwtTokenCodec {
    async fn sign(
        &self,
        kind: TokenKind,
        jti: &TokenId,
        sub: &str,
        extra: &ClaimsMap,
    ) -> Result<SignedToken, CodecError> {
        let keys = self.keys(kind);
        let iat_dt = Utc::now();
        let exp_dt = iat_dt + keys.ttl;

        let extra = extra
            .iter()
            .filter(|(name, _)| !RESERVED_CLAIMS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        let claims = TokenClaims {
            sub: sub.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: exp_dt.timestamp(),
            iat: iat_dt.timestamp(),
            jti: Some(jti.clone()),
            token_type: Some(kind),
            extra,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| CodecError::Signing(e.to_string()))?;
        Ok(SignedToken {
            token,
            expires_at: exp_dt,
        })
    }

    async fn verify(&self, kind: TokenKind, token: &str) -> Result<TokenClaims, CodecError> {
        let data = decode::<TokenClaims>(token, &self.keys(kind).decoding, &self.validation)
            .map_err(codec_error)?;
        Ok(data.claims)
    }

    fn lifetime(&self, kind: TokenKind) -> Duration {
        self.keys(kind).ttl
    }
}
