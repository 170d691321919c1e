use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// The token lifecycle engine.
///
/// Immutable once built. All shared state lives behind the token store, so
/// one instance serves every request concurrently.
pub struct RealAuthService {
    token_codec: Arc<dyn TokenCodec>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_store: Arc<dyn TokenStore>,
    identity_provider: Arc<dyn IdentityProvider>,
    store_timeout: Duration,
}

impl RealAuthService {
    pub fn new(
        token_codec: Arc<dyn TokenCodec>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_store: Arc<dyn TokenStore>,
        identity_provider: Arc<dyn IdentityProvider>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            token_codec,
            credential_hasher,
            token_store,
            identity_provider,
            store_timeout,
        }
    }

    /// Run one store call under the store deadline.
    async fn store<T, F>(&self, op: &'static str, call: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, TokenStoreError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!(op, error = %e, "token store call failed");
                Err(e.into())
            }
            Err(_) => {
                error!(op, timeout = ?self.store_timeout, "token store call timed out");
                Err(AuthError::DependencyUnavailable(format!("{} timed out", op)))
            }
        }
    }

    fn credential(credential: Option<&str>) -> Result<&str, AuthError> {
        match credential.map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(AuthError::MissingCredential),
        }
    }

    /// Signature and claims first; the store is only consulted afterwards.
    async fn verify(
        &self,
        kind: TokenKind,
        token: &str,
    ) -> Result<(TokenClaims, TokenId), AuthError> {
        let claims = self.token_codec.verify(kind, token).await.map_err(|e| {
            warn!(%kind, error = %e, "token failed verification");
            AuthError::InvalidToken
        })?;
        Self::check_kind(kind, claims)
    }

    /// Reject well-signed payloads that lack a `jti` or carry the other kind.
    fn check_kind(
        kind: TokenKind,
        claims: TokenClaims,
    ) -> Result<(TokenClaims, TokenId), AuthError> {
        if claims.token_type != Some(kind) {
            warn!(%kind, found = ?claims.token_type, "token kind mismatch");
            return Err(AuthError::InvalidToken);
        }
        match claims.jti.clone() {
            Some(jti) if !jti.as_str().is_empty() => Ok((claims, jti)),
            _ => {
                warn!(%kind, "token without jti");
                Err(AuthError::InvalidToken)
            }
        }
    }

    async fn resolve(&self, claims: &TokenClaims) -> Result<Identity, AuthError> {
        self.identity_provider
            .validate_claims(claims)
            .await
            .map_err(|rejection| {
                warn!(subject = %claims.sub, reason = %rejection, "claims rejected");
                AuthError::from(rejection)
            })
    }

    /// Time left until `expires_at`, rounded up to whole seconds.
    /// `None` once the instant has passed.
    fn remaining(expires_at: DateTime<Utc>) -> Option<Duration> {
        let millis = (expires_at - Utc::now()).num_milliseconds();
        if millis <= 0 {
            None
        } else {
            Some(Duration::from_secs((millis as u64).div_ceil(1000)))
        }
    }

    fn signing_failed(e: CodecError) -> AuthError {
        error!(error = %e, "token signing failed");
        AuthError::DependencyUnavailable("token signing failed".to_string())
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn issue(&self, identity: &Identity) -> Result<AuthTokens, AuthError> {
        let mut claims = self.identity_provider.map_to_claims(identity);
        let sub = match claims.remove("sub") {
            Some(serde_json::Value::String(sub)) if !sub.is_empty() => sub,
            // numeric ids are common; carry them as their decimal text
            Some(serde_json::Value::Number(sub)) => sub.to_string(),
            _ => {
                error!("claims mapper produced no `sub`");
                return Err(AuthError::Configuration(
                    "claims mapper must produce a string or numeric `sub`".to_string(),
                ));
            }
        };

        let access_jti = TokenId::generate();
        let refresh_jti = TokenId::generate();

        let access = self
            .token_codec
            .sign(TokenKind::Access, &access_jti, &sub, &claims)
            .await
            .map_err(Self::signing_failed)?;
        let refresh = self
            .token_codec
            .sign(TokenKind::Refresh, &refresh_jti, &sub, &claims)
            .await
            .map_err(Self::signing_failed)?;

        let record = TokenRecord {
            id: refresh_jti,
            subject: sub,
            hashed_secret: self.credential_hasher.hash(&refresh.token).await?,
            kind: TokenKind::Refresh,
            expires_at: refresh.expires_at,
        };
        let ttl = self.token_codec.lifetime(TokenKind::Refresh);
        self.store("save", self.token_store.save(&record, ttl)).await?;

        info!(
            subject = %record.subject,
            %access_jti,
            refresh_jti = %record.id,
            "issued token pair"
        );
        Ok(AuthTokens {
            access_token: AccessToken(access.token),
            refresh_token: RefreshToken(refresh.token),
            access_token_expires_at: access.expires_at,
            refresh_token_expires_at: refresh.expires_at,
        })
    }

    async fn authenticate(&self, credential: Option<&str>) -> Result<Identity, AuthError> {
        let token = Self::credential(credential)?;
        let (claims, jti) = self.verify(TokenKind::Access, token).await?;

        if self
            .store("exists", self.token_store.exists(TokenKind::Access, &jti))
            .await?
        {
            warn!(%jti, subject = %claims.sub, "revoked access token presented");
            return Err(AuthError::InvalidToken);
        }

        self.resolve(&claims).await
    }

    async fn rotate(&self, credential: Option<&str>) -> Result<AuthTokens, AuthError> {
        let token = Self::credential(credential)?;
        let (claims, jti) = self.verify(TokenKind::Refresh, token).await?;

        // Redeemed, expired and never-issued all look the same from here.
        if !self
            .store("exists", self.token_store.exists(TokenKind::Refresh, &jti))
            .await?
        {
            warn!(%jti, subject = %claims.sub, "refresh token not redeemable");
            return Err(AuthError::InvalidToken);
        }

        let record = self
            .store("get", self.token_store.get(TokenKind::Refresh, &jti))
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if record.subject != claims.sub {
            warn!(%jti, "refresh record subject mismatch");
            return Err(AuthError::InvalidToken);
        }

        if !self
            .credential_hasher
            .verify(&record.hashed_secret, token)
            .await?
        {
            warn!(%jti, subject = %claims.sub, "refresh token does not match stored hash");
            return Err(AuthError::InvalidToken);
        }

        // Single use: only the caller whose delete removed the record proceeds.
        if !self
            .store("delete", self.token_store.delete(TokenKind::Refresh, &jti))
            .await?
        {
            warn!(%jti, subject = %claims.sub, "lost refresh rotation race");
            return Err(AuthError::InvalidToken);
        }

        let identity = self.resolve(&claims).await?;
        let tokens = self.issue(&identity).await?;
        info!(%jti, subject = %claims.sub, "rotated refresh token");
        Ok(tokens)
    }

    async fn revoke(&self, credential: Option<&str>) -> Result<RevokeOutcome, AuthError> {
        let token = Self::credential(credential)?;
        let claims = match self.token_codec.verify(TokenKind::Access, token).await {
            Ok(claims) => claims,
            Err(CodecError::Expired) => {
                debug!("revoking an already expired access token");
                return Ok(RevokeOutcome::AlreadyExpired);
            }
            Err(e) => {
                warn!(error = %e, "revocation with unverifiable token");
                return Err(AuthError::InvalidToken);
            }
        };
        let (claims, jti) = Self::check_kind(TokenKind::Access, claims)?;

        if self
            .store("exists", self.token_store.exists(TokenKind::Access, &jti))
            .await?
        {
            debug!(%jti, "access token already revoked");
            return Ok(RevokeOutcome::AlreadyRevoked);
        }

        let expires_at = claims.expires_at().ok_or(AuthError::InvalidToken)?;
        // The denylist entry must not outlive the token it blocks.
        let Some(ttl) = Self::remaining(expires_at) else {
            return Ok(RevokeOutcome::AlreadyExpired);
        };

        let record = TokenRecord {
            id: jti,
            subject: claims.sub,
            hashed_secret: self.credential_hasher.hash(token).await?,
            kind: TokenKind::Access,
            expires_at,
        };
        self.store("save", self.token_store.save(&record, ttl)).await?;

        info!(
            jti = %record.id,
            subject = %record.subject,
            ttl_secs = ttl.as_secs(),
            "revoked access token"
        );
        Ok(RevokeOutcome::Revoked)
    }

    async fn login(&self, body: serde_json::Value) -> Result<LoginResult, AuthError> {
        let identity = self
            .identity_provider
            .validate_login(body)
            .await
            .map_err(|rejection| {
                warn!(reason = %rejection, "login rejected");
                AuthError::from(rejection)
            })?;
        let tokens = self.issue(&identity).await?;
        Ok(LoginResult { identity, tokens })
    }

    async fn register(&self, body: serde_json::Value) -> Result<LoginResult, AuthError> {
        let identity = self
            .identity_provider
            .validate_register(body)
            .await
            .map_err(|rejection| {
                warn!(reason = %rejection, "registration rejected");
                AuthError::from(rejection)
            })?;
        let tokens = self.issue(&identity).await?;
        Ok(LoginResult { identity, tokens })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::*;
    use crate::infra_memory::MemoryTokenStore;
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Barrier;

    const ACCESS_SECRET: &[u8] = b"access-secret";
    const ISSUER: &str = "api.authlane.test";

    /// Accepts `{"email", "password": "secret"}` and maps identities to
    /// `{sub: email}` unless told otherwise.
    struct StaticIdentityProvider {
        emit_sub: bool,
        reject_claims: bool,
    }

    #[async_trait::async_trait]
    impl IdentityProvider for StaticIdentityProvider {
        async fn validate_login(
            &self,
            body: serde_json::Value,
        ) -> Result<Identity, IdentityRejection> {
            if body["password"] == "secret" {
                Ok(Identity::new(json!({ "id": body["email"] })))
            } else {
                Err(IdentityRejection::new("Invalid Credentials"))
            }
        }

        async fn validate_register(
            &self,
            body: serde_json::Value,
        ) -> Result<Identity, IdentityRejection> {
            Ok(Identity::new(json!({ "id": body["email"] })))
        }

        async fn validate_claims(
            &self,
            claims: &TokenClaims,
        ) -> Result<Identity, IdentityRejection> {
            if self.reject_claims {
                return Err(IdentityRejection::new("Please Login"));
            }
            Ok(Identity::new(json!({ "id": claims.sub })))
        }

        fn map_to_claims(&self, identity: &Identity) -> ClaimsMap {
            let mut claims = ClaimsMap::new();
            if self.emit_sub {
                claims.insert("sub".to_string(), identity.0["id"].clone());
            }
            claims.insert("role".to_string(), json!("tester"));
            claims
        }
    }

    /// A store whose every call fails.
    struct DownStore;

    #[async_trait::async_trait]
    impl TokenStore for DownStore {
        async fn save(&self, _: &TokenRecord, _: Duration) -> Result<(), TokenStoreError> {
            Err(TokenStoreError::Unavailable("connection refused".to_string()))
        }
        async fn exists(&self, _: TokenKind, _: &TokenId) -> Result<bool, TokenStoreError> {
            Err(TokenStoreError::Unavailable("connection refused".to_string()))
        }
        async fn get(
            &self,
            _: TokenKind,
            _: &TokenId,
        ) -> Result<Option<TokenRecord>, TokenStoreError> {
            Err(TokenStoreError::Unavailable("connection refused".to_string()))
        }
        async fn delete(&self, _: TokenKind, _: &TokenId) -> Result<bool, TokenStoreError> {
            Err(TokenStoreError::Unavailable("connection refused".to_string()))
        }
        async fn ttl_remaining(
            &self,
            _: TokenKind,
            _: &TokenId,
        ) -> Result<Option<Duration>, TokenStoreError> {
            Err(TokenStoreError::Unavailable("connection refused".to_string()))
        }
    }

    /// Holds every fetched record until two callers have one, so concurrent
    /// rotations both reach the delete.
    struct GatedStore {
        inner: MemoryTokenStore,
        gate: Barrier,
    }

    #[async_trait::async_trait]
    impl TokenStore for GatedStore {
        async fn save(&self, record: &TokenRecord, ttl: Duration) -> Result<(), TokenStoreError> {
            self.inner.save(record, ttl).await
        }
        async fn exists(&self, kind: TokenKind, id: &TokenId) -> Result<bool, TokenStoreError> {
            self.inner.exists(kind, id).await
        }
        async fn get(
            &self,
            kind: TokenKind,
            id: &TokenId,
        ) -> Result<Option<TokenRecord>, TokenStoreError> {
            let record = self.inner.get(kind, id).await;
            self.gate.wait().await;
            record
        }
        async fn delete(&self, kind: TokenKind, id: &TokenId) -> Result<bool, TokenStoreError> {
            self.inner.delete(kind, id).await
        }
        async fn ttl_remaining(
            &self,
            kind: TokenKind,
            id: &TokenId,
        ) -> Result<Option<Duration>, TokenStoreError> {
            self.inner.ttl_remaining(kind, id).await
        }
    }

    /// Another caller always deletes first: the record vanishes but this
    /// caller's delete reports nothing removed.
    struct LostRaceStore {
        inner: MemoryTokenStore,
        saves: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TokenStore for LostRaceStore {
        async fn save(&self, record: &TokenRecord, ttl: Duration) -> Result<(), TokenStoreError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save(record, ttl).await
        }
        async fn exists(&self, kind: TokenKind, id: &TokenId) -> Result<bool, TokenStoreError> {
            self.inner.exists(kind, id).await
        }
        async fn get(
            &self,
            kind: TokenKind,
            id: &TokenId,
        ) -> Result<Option<TokenRecord>, TokenStoreError> {
            self.inner.get(kind, id).await
        }
        async fn delete(&self, kind: TokenKind, id: &TokenId) -> Result<bool, TokenStoreError> {
            self.inner.delete(kind, id).await?;
            Ok(false)
        }
        async fn ttl_remaining(
            &self,
            kind: TokenKind,
            id: &TokenId,
        ) -> Result<Option<Duration>, TokenStoreError> {
            self.inner.ttl_remaining(kind, id).await
        }
    }

    /// Saves succeed, lookups never return.
    struct StalledStore;

    #[async_trait::async_trait]
    impl TokenStore for StalledStore {
        async fn save(&self, _: &TokenRecord, _: Duration) -> Result<(), TokenStoreError> {
            Ok(())
        }
        async fn exists(&self, _: TokenKind, _: &TokenId) -> Result<bool, TokenStoreError> {
            std::future::pending().await
        }
        async fn get(
            &self,
            _: TokenKind,
            _: &TokenId,
        ) -> Result<Option<TokenRecord>, TokenStoreError> {
            std::future::pending().await
        }
        async fn delete(&self, _: TokenKind, _: &TokenId) -> Result<bool, TokenStoreError> {
            std::future::pending().await
        }
        async fn ttl_remaining(
            &self,
            _: TokenKind,
            _: &TokenId,
        ) -> Result<Option<Duration>, TokenStoreError> {
            std::future::pending().await
        }
    }

    fn codec() -> JwtTokenCodec {
        JwtTokenCodec::new(JwtConfig {
            issuer: ISSUER.to_string(),
            audience: Audience::One("web".to_string()),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            access_secret: ACCESS_SECRET.to_vec(),
            refresh_secret: b"refresh-secret".to_vec(),
        })
    }

    fn hasher() -> Argon2CredentialHasher {
        Argon2CredentialHasher::new(HasherParams {
            memory_kib: argon2::Params::MIN_M_COST,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    fn service_with(
        store: Arc<dyn TokenStore>,
        provider: StaticIdentityProvider,
    ) -> RealAuthService {
        RealAuthService::new(
            Arc::new(codec()),
            Arc::new(hasher()),
            store,
            Arc::new(provider),
            Duration::from_secs(1),
        )
    }

    fn service(store: Arc<MemoryTokenStore>) -> RealAuthService {
        service_with(
            store,
            StaticIdentityProvider {
                emit_sub: true,
                reject_claims: false,
            },
        )
    }

    fn ada() -> Identity {
        Identity::new(json!({ "id": "ada" }))
    }

    async fn claims_of(kind: TokenKind, token: &str) -> TokenClaims {
        codec().verify(kind, token).await.unwrap()
    }

    #[tokio::test]
    async fn issue_writes_one_refresh_record_with_the_refresh_lifetime() {
        let store = Arc::new(MemoryTokenStore::new());
        let tokens = service(store.clone()).issue(&ada()).await.unwrap();

        let access = claims_of(TokenKind::Access, &tokens.access_token.0).await;
        let refresh = claims_of(TokenKind::Refresh, &tokens.refresh_token.0).await;
        assert_ne!(access.jti, refresh.jti);
        assert_eq!(access.token_type, Some(TokenKind::Access));
        assert_eq!(refresh.token_type, Some(TokenKind::Refresh));
        assert_eq!(access.extra.get("role"), Some(&json!("tester")));

        let refresh_jti = refresh.jti.unwrap();
        let record = store
            .get(TokenKind::Refresh, &refresh_jti)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.subject, "ada");
        assert_eq!(record.kind, TokenKind::Refresh);
        assert_ne!(record.hashed_secret, tokens.refresh_token.0);
        assert_eq!(record.expires_at, tokens.refresh_token_expires_at);

        let ttl = store
            .ttl_remaining(TokenKind::Refresh, &refresh_jti)
            .await
            .unwrap()
            .unwrap();
        let lifetime = Duration::from_secs(7 * 24 * 60 * 60);
        assert!(ttl <= lifetime && lifetime - ttl < Duration::from_secs(2));

        // access tokens are stateless until revoked
        assert!(
            !store
                .exists(TokenKind::Access, &access.jti.unwrap())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn issue_without_subject_is_a_configuration_error() {
        let store = Arc::new(MemoryTokenStore::new());
        let auth = service_with(
            store,
            StaticIdentityProvider {
                emit_sub: false,
                reject_claims: false,
            },
        );
        let err = auth.issue(&ada()).await.unwrap_err();
        assert!(matches!(err, AuthError::Configuration(_)));
    }

    #[tokio::test]
    async fn numeric_subject_is_carried_as_text() {
        let store = Arc::new(MemoryTokenStore::new());
        let auth = service(store.clone());
        let tokens = auth
            .issue(&Identity::new(json!({ "id": 42 })))
            .await
            .unwrap();

        let claims = claims_of(TokenKind::Refresh, &tokens.refresh_token.0).await;
        assert_eq!(claims.sub, "42");
        let record = store
            .get(TokenKind::Refresh, &claims.jti.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.subject, "42");
    }

    #[tokio::test]
    async fn authenticate_resolves_identity_from_access_token() {
        let auth = service(Arc::new(MemoryTokenStore::new()));
        let tokens = auth.issue(&ada()).await.unwrap();

        let identity = auth
            .authenticate(Some(&tokens.access_token.0))
            .await
            .unwrap();
        assert_eq!(identity, ada());
    }

    #[tokio::test]
    async fn authenticate_rejects_missing_and_wrong_kind_credentials() {
        let auth = service(Arc::new(MemoryTokenStore::new()));
        let tokens = auth.issue(&ada()).await.unwrap();

        assert!(matches!(
            auth.authenticate(None).await.unwrap_err(),
            AuthError::MissingCredential
        ));
        assert!(matches!(
            auth.authenticate(Some("  ")).await.unwrap_err(),
            AuthError::MissingCredential
        ));
        assert!(matches!(
            auth.authenticate(Some(&tokens.refresh_token.0))
                .await
                .unwrap_err(),
            AuthError::InvalidToken
        ));
    }

    #[tokio::test]
    async fn authenticate_rejects_signed_token_without_jti() {
        let auth = service(Arc::new(MemoryTokenStore::new()));
        let now = Utc::now().timestamp();
        let legacy = encode(
            &Header::new(Algorithm::HS256),
            &json!({
                "sub": "ada",
                "iss": ISSUER,
                "aud": "web",
                "iat": now,
                "exp": now + 600,
                "tokenType": "access",
            }),
            &EncodingKey::from_secret(ACCESS_SECRET),
        )
        .unwrap();

        let err = auth.authenticate(Some(&legacy)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn authenticate_maps_claims_rejection_to_unauthorized() {
        let auth = service_with(
            Arc::new(MemoryTokenStore::new()),
            StaticIdentityProvider {
                emit_sub: true,
                reject_claims: true,
            },
        );
        let tokens = auth.issue(&ada()).await.unwrap();

        let err = auth
            .authenticate(Some(&tokens.access_token.0))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized(reason) if reason == "Please Login"));
    }

    #[tokio::test]
    async fn refresh_token_redeems_exactly_once() {
        let store = Arc::new(MemoryTokenStore::new());
        let auth = service(store.clone());
        let tokens = auth.issue(&ada()).await.unwrap();
        let old_jti = claims_of(TokenKind::Refresh, &tokens.refresh_token.0)
            .await
            .jti
            .unwrap();

        let rotated = auth
            .rotate(Some(&tokens.refresh_token.0))
            .await
            .unwrap();
        assert!(!store.exists(TokenKind::Refresh, &old_jti).await.unwrap());
        assert!(auth.authenticate(Some(&rotated.access_token.0)).await.is_ok());

        for _ in 0..2 {
            let err = auth
                .rotate(Some(&tokens.refresh_token.0))
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidToken));
        }

        // the successor is itself redeemable once
        assert!(auth.rotate(Some(&rotated.refresh_token.0)).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_rotations_of_one_token_yield_one_pair() {
        let store = Arc::new(GatedStore {
            inner: MemoryTokenStore::new(),
            gate: Barrier::new(2),
        });
        let auth = Arc::new(service_with(
            store.clone(),
            StaticIdentityProvider {
                emit_sub: true,
                reject_claims: false,
            },
        ));
        let tokens = auth.issue(&ada()).await.unwrap();
        let token = tokens.refresh_token.0.clone();

        let first = {
            let auth = auth.clone();
            let token = token.clone();
            tokio::spawn(async move { auth.rotate(Some(&token)).await })
        };
        let second = {
            let auth = auth.clone();
            tokio::spawn(async move { auth.rotate(Some(&token)).await })
        };
        let results = [first.await.unwrap(), second.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(AuthError::InvalidToken)))
        );
    }

    #[tokio::test]
    async fn rotation_that_removes_nothing_issues_nothing() {
        let store = Arc::new(LostRaceStore {
            inner: MemoryTokenStore::new(),
            saves: AtomicUsize::new(0),
        });
        let auth = service_with(
            store.clone(),
            StaticIdentityProvider {
                emit_sub: true,
                reject_claims: false,
            },
        );
        let tokens = auth.issue(&ada()).await.unwrap();
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);

        let err = auth
            .rotate(Some(&tokens.refresh_token.0))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rotate_rejects_access_token_and_tampered_record() {
        let store = Arc::new(MemoryTokenStore::new());
        let auth = service(store.clone());
        let tokens = auth.issue(&ada()).await.unwrap();

        assert!(matches!(
            auth.rotate(Some(&tokens.access_token.0)).await.unwrap_err(),
            AuthError::InvalidToken
        ));

        // overwrite the stored hash with one for a different token
        let jti = claims_of(TokenKind::Refresh, &tokens.refresh_token.0)
            .await
            .jti
            .unwrap();
        let mut record = store.get(TokenKind::Refresh, &jti).await.unwrap().unwrap();
        record.hashed_secret = hasher().hash("some-other-token").await.unwrap();
        store.save(&record, Duration::from_secs(60)).await.unwrap();

        assert!(matches!(
            auth.rotate(Some(&tokens.refresh_token.0)).await.unwrap_err(),
            AuthError::InvalidToken
        ));
        // a refused rotation leaves the record in place
        assert!(store.exists(TokenKind::Refresh, &jti).await.unwrap());
    }

    #[tokio::test]
    async fn rotate_consumes_token_even_when_claims_are_rejected() {
        let store = Arc::new(MemoryTokenStore::new());
        let auth = service_with(
            store.clone(),
            StaticIdentityProvider {
                emit_sub: true,
                reject_claims: true,
            },
        );
        let tokens = auth.issue(&ada()).await.unwrap();

        let err = auth
            .rotate(Some(&tokens.refresh_token.0))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized(_)));
        let jti = claims_of(TokenKind::Refresh, &tokens.refresh_token.0)
            .await
            .jti
            .unwrap();
        assert!(!store.exists(TokenKind::Refresh, &jti).await.unwrap());
    }

    #[tokio::test]
    async fn revoked_access_token_is_refused_immediately() {
        let auth = service(Arc::new(MemoryTokenStore::new()));
        let tokens = auth.issue(&ada()).await.unwrap();
        let token = Some(tokens.access_token.0.as_str());

        assert!(auth.authenticate(token).await.is_ok());
        assert_eq!(auth.revoke(token).await.unwrap(), RevokeOutcome::Revoked);
        assert!(matches!(
            auth.authenticate(token).await.unwrap_err(),
            AuthError::InvalidToken
        ));
    }

    #[tokio::test]
    async fn denylist_entry_expires_with_the_token() {
        let store = Arc::new(MemoryTokenStore::new());
        let auth = service(store.clone());
        let tokens = auth.issue(&ada()).await.unwrap();
        auth.revoke(Some(&tokens.access_token.0)).await.unwrap();

        let claims = claims_of(TokenKind::Access, &tokens.access_token.0).await;
        let jti = claims.jti.clone().unwrap();
        let record = store.get(TokenKind::Access, &jti).await.unwrap().unwrap();
        assert_eq!(record.kind, TokenKind::Access);
        assert_eq!(record.subject, "ada");
        assert_eq!(record.expires_at.timestamp(), claims.exp);

        let ttl = store
            .ttl_remaining(TokenKind::Access, &jti)
            .await
            .unwrap()
            .unwrap();
        let until_exp = (claims.expires_at().unwrap() - Utc::now())
            .to_std()
            .unwrap();
        assert!(ttl >= until_exp);
        assert!(ttl - until_exp <= Duration::from_secs(2));
        assert!(ttl < Duration::from_secs(7 * 24 * 60 * 60));
    }

    #[tokio::test]
    async fn revoking_twice_is_idempotent() {
        let auth = service(Arc::new(MemoryTokenStore::new()));
        let tokens = auth.issue(&ada()).await.unwrap();
        let token = Some(tokens.access_token.0.as_str());

        assert_eq!(auth.revoke(token).await.unwrap(), RevokeOutcome::Revoked);
        assert_eq!(
            auth.revoke(token).await.unwrap(),
            RevokeOutcome::AlreadyRevoked
        );
    }

    #[tokio::test]
    async fn revoking_an_expired_token_is_a_no_op() {
        let store = Arc::new(MemoryTokenStore::new());
        let auth = service(store.clone());
        let now = Utc::now().timestamp();
        let expired = encode(
            &Header::new(Algorithm::HS256),
            &json!({
                "sub": "ada",
                "iss": ISSUER,
                "aud": "web",
                "iat": now - 600,
                "exp": now - 5,
                "jti": "stale",
                "tokenType": "access",
            }),
            &EncodingKey::from_secret(ACCESS_SECRET),
        )
        .unwrap();

        assert_eq!(
            auth.revoke(Some(&expired)).await.unwrap(),
            RevokeOutcome::AlreadyExpired
        );
        assert!(
            !store
                .exists(TokenKind::Access, &TokenId("stale".to_string()))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn revoke_rejects_refresh_tokens_and_garbage() {
        let auth = service(Arc::new(MemoryTokenStore::new()));
        let tokens = auth.issue(&ada()).await.unwrap();

        assert!(matches!(
            auth.revoke(Some(&tokens.refresh_token.0)).await.unwrap_err(),
            AuthError::InvalidToken
        ));
        assert!(matches!(
            auth.revoke(Some("garbage")).await.unwrap_err(),
            AuthError::InvalidToken
        ));
        assert!(matches!(
            auth.revoke(None).await.unwrap_err(),
            AuthError::MissingCredential
        ));
    }

    #[tokio::test]
    async fn login_issues_tokens_or_reports_the_rejection() {
        let auth = service(Arc::new(MemoryTokenStore::new()));

        let result = auth
            .login(json!({ "email": "ada", "password": "secret" }))
            .await
            .unwrap();
        assert_eq!(result.identity, ada());
        assert!(
            auth.authenticate(Some(&result.tokens.access_token.0))
                .await
                .is_ok()
        );

        let err = auth
            .login(json!({ "email": "ada", "password": "wrong" }))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized(reason) if reason == "Invalid Credentials"));
    }

    #[tokio::test]
    async fn register_issues_tokens() {
        let auth = service(Arc::new(MemoryTokenStore::new()));
        let result = auth.register(json!({ "email": "grace" })).await.unwrap();
        assert_eq!(result.identity, Identity::new(json!({ "id": "grace" })));
    }

    #[tokio::test]
    async fn store_outage_is_a_dependency_failure_not_an_invalid_token() {
        let store = Arc::new(MemoryTokenStore::new());
        let tokens = service(store).issue(&ada()).await.unwrap();

        let auth = service_with(
            Arc::new(DownStore),
            StaticIdentityProvider {
                emit_sub: true,
                reject_claims: false,
            },
        );
        assert!(matches!(
            auth.authenticate(Some(&tokens.access_token.0))
                .await
                .unwrap_err(),
            AuthError::DependencyUnavailable(_)
        ));
        assert!(matches!(
            auth.rotate(Some(&tokens.refresh_token.0)).await.unwrap_err(),
            AuthError::DependencyUnavailable(_)
        ));
        assert!(matches!(
            auth.issue(&ada()).await.unwrap_err(),
            AuthError::DependencyUnavailable(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_store_times_out() {
        let auth = service_with(
            Arc::new(StalledStore),
            StaticIdentityProvider {
                emit_sub: true,
                reject_claims: false,
            },
        );
        let tokens = auth.issue(&ada()).await.unwrap();

        let err = auth
            .authenticate(Some(&tokens.access_token.0))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DependencyUnavailable(_)));
    }
}
