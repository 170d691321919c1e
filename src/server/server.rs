use crate::api::v1::Extractor;
use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use std::sync::Arc;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub base_path: String,
    pub access_extractor: Extractor,
    pub refresh_extractor: Extractor,
}

impl Server {
    pub fn new(
        auth_service: Arc<dyn AuthService>,
        base_path: String,
        access_extractor: Extractor,
        refresh_extractor: Extractor,
    ) -> Self {
        Self {
            auth_service,
            base_path,
            access_extractor,
            refresh_extractor,
        }
    }

    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        settings.validate()?;

        let credential_hasher: Arc<dyn CredentialHasher> =
            Arc::new(Argon2CredentialHasher::new(HasherParams::from(
                &settings.hasher,
            ))?);

        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtTokenCodec::new(JwtConfig {
            issuer: settings.jwt.issuer.clone(),
            audience: settings.jwt.audience.clone(),
            access_ttl: settings.jwt.access_ttl,
            refresh_ttl: settings.jwt.refresh_ttl,
            access_secret: settings.jwt.access_secret.clone().into_bytes(),
            refresh_secret: settings.jwt.refresh_secret.clone().into_bytes(),
        }));

        let token_store: Arc<dyn TokenStore> = match settings.store.backend.as_str() {
            "memory" => {
                warn!("memory token store in use; tokens do not survive a restart");
                Arc::new(MemoryTokenStore::new())
            }
            "redis" => {
                let redis_client = redis::Client::open(settings.store.url.as_str())?;
                let redis_manager = redis_client.get_connection_manager().await?;
                Arc::new(RedisTokenStore::new(
                    redis_manager,
                    settings.store.prefix.clone(),
                ))
            }
            other => return Err(anyhow::anyhow!("Unknown store backend: {}", other)),
        };

        let identity_provider: Arc<dyn IdentityProvider> =
            Arc::new(MemoryIdentityDirectory::new(credential_hasher.clone()));

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            token_codec,
            credential_hasher,
            token_store,
            identity_provider,
            settings.store.timeout,
        ));

        info!(
            backend = %settings.store.backend,
            base_path = %settings.http.base_path,
            "server ready"
        );

        Ok(Self::new(
            auth_service,
            settings.http.base_path.clone(),
            settings.extractor.access.clone(),
            settings.extractor.refresh.clone(),
        ))
    }
}
