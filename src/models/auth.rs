// src/models/auth.rs

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{onboarding::PlanTier, store::IdentityAttributes};

// Claims do token de identidade. Os atributos custom do provedor de
// identidade vêm achatados ao lado das claims registradas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,  // Subject (id do usuário)
    pub exp: usize, // Expiração
    pub iat: usize, // Emitido em
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(flatten)]
    pub attributes: IdentityAttributes,
}

impl Claims {
    /// Valida a assinatura HS256 e a expiração do token.
    pub fn decode(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &DecodingKey::from_secret(secret.as_ref()), &Validation::default())
            .map(|data| data.claims)
    }
}

/// Identidade da requisição entregue ao fan-out das stores.
/// Imutável depois de extraída.
#[derive(Debug, Clone)]
pub struct SessionContext {
    user_id: Uuid,
    email: Option<String>,
    credential: String,
    plan_tier_hint: Option<PlanTier>,
    request_id: Uuid,
}

impl SessionContext {
    pub fn new(claims: Claims, credential: String, request_id: Uuid) -> Self {
        let plan_tier_hint = claims.plan.as_deref().and_then(PlanTier::parse);
        Self {
            user_id: claims.sub,
            email: claims.email,
            credential,
            plan_tier_hint,
            request_id,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    // O token cru; as stores que falam com o provedor de identidade leem dele.
    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn plan_tier_hint(&self) -> Option<PlanTier> {
        self.plan_tier_hint
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }
}
