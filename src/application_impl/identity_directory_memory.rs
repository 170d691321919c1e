use crate::application_port::*;
use crate::domain_model::*;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

struct UserEntry {
    id: String,
    email: String,
    password_hash: String,
}

impl UserEntry {
    fn identity(&self) -> Identity {
        Identity::new(json!({ "id": self.id, "email": self.email }))
    }
}

/// Demo user table for running the server standalone.
///
/// Identities look like `{"id", "email"}` and map to `{sub: id, email}`.
pub struct MemoryIdentityDirectory {
    users: DashMap<String, UserEntry>,
    ids_by_email: DashMap<String, String>,
    credential_hasher: Arc<dyn CredentialHasher>,
}

impl MemoryIdentityDirectory {
    pub fn new(credential_hasher: Arc<dyn CredentialHasher>) -> Self {
        Self {
            users: DashMap::new(),
            ids_by_email: DashMap::new(),
            credential_hasher,
        }
    }

    fn credentials(body: serde_json::Value) -> Result<Credentials, IdentityRejection> {
        let creds: Credentials = serde_json::from_value(body)
            .map_err(|_| IdentityRejection::new("email and password are required"))?;
        if creds.email.is_empty() || creds.password.is_empty() {
            return Err(IdentityRejection::new("email and password are required"));
        }
        Ok(creds)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MemoryIdentityDirectory {
    async fn validate_login(&self, body: serde_json::Value) -> Result<Identity, IdentityRejection> {
        let creds = Self::credentials(body)?;
        let mismatch = || IdentityRejection::new("Password/Email Mismatch");

        let id = self
            .ids_by_email
            .get(&creds.email)
            .map(|id| id.value().clone())
            .ok_or_else(mismatch)?;
        let (password_hash, identity) = self
            .users
            .get(&id)
            .map(|user| (user.password_hash.clone(), user.identity()))
            .ok_or_else(mismatch)?;

        match self
            .credential_hasher
            .verify(&password_hash, &creds.password)
            .await
        {
            Ok(true) => Ok(identity),
            Ok(false) => Err(IdentityRejection::new("Invalid Credentials")),
            Err(_) => Err(IdentityRejection::new("Login Failed")),
        }
    }

    async fn validate_register(
        &self,
        body: serde_json::Value,
    ) -> Result<Identity, IdentityRejection> {
        let creds = Self::credentials(body)?;
        if self.ids_by_email.contains_key(&creds.email) {
            return Err(IdentityRejection::new("User Already Exists"));
        }

        let password_hash = self
            .credential_hasher
            .hash(&creds.password)
            .await
            .map_err(|_| IdentityRejection::new("Registration Failed"))?;

        let id = uuid::Uuid::new_v4().to_string();
        match self.ids_by_email.entry(creds.email.clone()) {
            Entry::Occupied(_) => return Err(IdentityRejection::new("User Already Exists")),
            Entry::Vacant(slot) => {
                slot.insert(id.clone());
            }
        }

        let user = UserEntry {
            id: id.clone(),
            email: creds.email,
            password_hash,
        };
        let identity = user.identity();
        self.users.insert(id, user);
        Ok(identity)
    }

    async fn validate_claims(&self, claims: &TokenClaims) -> Result<Identity, IdentityRejection> {
        self.users
            .get(&claims.sub)
            .map(|user| user.identity())
            .ok_or_else(|| IdentityRejection::new("Please Login"))
    }

    fn map_to_claims(&self, identity: &Identity) -> ClaimsMap {
        let mut claims = ClaimsMap::new();
        if let Some(id) = identity.0.get("id") {
            claims.insert("sub".to_string(), id.clone());
        }
        if let Some(email) = identity.0.get("email") {
            claims.insert("email".to_string(), email.clone());
        }
        claims
    }
}
