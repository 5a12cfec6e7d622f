use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use anyhow::anyhow;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use std::time::Duration;

/// Long-lived services shared by every route.
pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub authorization: Arc<AuthorizationChain>,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let mut pool = None;
        let user_repo: Arc<dyn UserRepo> = match settings.user.backend.as_str() {
            "memory" => Arc::new(MemoryUserRepo::new()),
            "mysql" => {
                let dsn = settings
                    .user
                    .dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("user.dsn is required for the mysql backend"))?;
                let mysql = Pool::<MySql>::connect(dsn).await?;
                pool = Some(mysql.clone());
                Arc::new(MySqlUserRepo::new(mysql))
            }
            other => return Err(anyhow!("Unknown user backend: {}", other)),
        };

        let store: Arc<dyn KeyValueStore> = match settings.revocation.backend.as_str() {
            "memory" => Arc::new(MemoryKeyValueStore::new()),
            "redis" => {
                let dsn = settings
                    .revocation
                    .dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("revocation.dsn is required for the redis backend"))?;
                let redis_client = redis::Client::open(dsn)?;
                let redis_manager = redis_client.get_connection_manager().await?;
                Arc::new(RedisKeyValueStore::new(
                    redis_manager,
                    settings.revocation.prefix.clone(),
                ))
            }
            other => return Err(anyhow!("Unknown revocation backend: {}", other)),
        };

        let hashing = &settings.hashing;
        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(
            Argon2PasswordHasher::with_cost(
                hashing.memory_kib,
                hashing.iterations,
                hashing.parallelism,
            )
            .map_err(|e| anyhow!(e))?,
        );

        let jwt = &settings.jwt;
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtCodec::new(JwtConfig {
            issuer: jwt.issuer.clone(),
            audience: jwt.audience.clone(),
            access_secret: jwt.secret.clone().into_bytes(),
            refresh_secret: jwt.refresh_secret.clone().into_bytes(),
        }));

        let session_config = SessionConfig {
            access_token_ttl: Duration::from_secs(jwt.access_token_ttl),
            refresh_token_ttl: Duration::from_secs(jwt.refresh_token_ttl),
            rotation: settings.auth.rotation,
            invalidate_on_reuse: settings.auth.invalidate_on_reuse,
            allow_self_assigned_roles: settings.auth.allow_self_assigned_roles,
            min_password_len: settings.auth.min_password_len,
        };
        debug!(?session_config);

        let mut real_auth_service = RealAuthService::new(
            user_repo,
            credential_hasher,
            token_codec,
            Arc::new(RefreshTokenIdsStore::new(store)),
            session_config,
        );
        if let Some(google) = &settings.google {
            // TODO: refetch the key set from Google's certs endpoint when keys rotate.
            let jwks = std::fs::read_to_string(&google.jwks_path)
                .map_err(|e| anyhow!("reading {}: {}", google.jwks_path, e))?;
            let verifier = JwksIdTokenVerifier::from_jwks_json(
                IdTokenConfig::google(google.client_id.clone()),
                &jwks,
            )?;
            real_auth_service = real_auth_service.with_id_token_verifier(Arc::new(verifier));
            info!("google sign-in enabled");
        }
        let auth_service: Arc<dyn AuthService> = Arc::new(real_auth_service);

        let policy_handlers: Vec<Arc<dyn PolicyHandler>> = vec![Arc::new(EmailDomainPolicyHandler)];
        let registry = Arc::new(PolicyHandlerRegistry::new(policy_handlers));
        let authorization = Arc::new(AuthorizationChain::standard(
            auth_service.clone(),
            registry,
        ));

        info!(
            user_backend = %settings.user.backend,
            revocation_backend = %settings.revocation.backend,
            "server started"
        );

        Ok(Self {
            auth_service,
            authorization,
            pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
