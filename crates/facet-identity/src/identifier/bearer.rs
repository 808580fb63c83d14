//  Copyright (c) 2026 Metaform Systems, Inc
//
//  This program and the accompanying materials are made available under the
//  terms of the Apache License, Version 2.0 which is available at
//  https://www.apache.org/licenses/LICENSE-2.0
//
//  SPDX-License-Identifier: Apache-2.0
//
//  Contributors:
//       Metaform Systems, Inc. - initial API and implementation
//

use crate::identifier::{Identifier, IdentifierError};
use crate::identity::IdentityData;
use async_trait::async_trait;
use bon::Builder;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use log::debug;
use serde_json::{Map, Value};

/// Claim that binds a token to a realm. Tokens without it are accepted in any realm.
pub const REALM_CLAIM: &str = "realm";

const DEFAULT_LEEWAY_SECONDS: u64 = 60;

// Registered claims describe the token, not the user, and are not imported.
const REGISTERED_CLAIMS: [&str; 6] = ["exp", "iat", "nbf", "aud", "iss", "jti"];

/// Identifier backed by an HS256 bearer token taken from an `Authorization` header value.
///
/// The client holds the token, so signing in is not supported and signing out is a no-op. A missing or invalid token
/// reads as not signed in.
#[derive(Builder, Clone)]
pub struct BearerTokenIdentifier {
    /// Raw `Authorization` header value, e.g. `Bearer eyJ...`
    #[builder(into)]
    authorization: Option<String>,
    /// Shared secret the token is signed with
    #[builder(into)]
    secret: Vec<u8>,
    /// Expected `aud` claim; the audience is not validated when unset
    #[builder(into)]
    audience: Option<String>,
    #[builder(default = DEFAULT_LEEWAY_SECONDS)]
    leeway_seconds: u64,
}

impl std::fmt::Debug for BearerTokenIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerTokenIdentifier")
            .field("authorization", &self.authorization.as_ref().map(|_| "***"))
            .field("secret", &"***")
            .field("audience", &self.audience)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

impl BearerTokenIdentifier {
    /// Extracts the token from a `Bearer` authorization value. The scheme is matched case-insensitively.
    pub fn bearer_token(&self) -> Option<&str> {
        let (scheme, token) = self.authorization.as_deref()?.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        if token.is_empty() { None } else { Some(token) }
    }

    fn verify(&self, token: &str, realm: &str) -> Result<Map<String, Value>, IdentifierError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway_seconds;
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let key = DecodingKey::from_secret(&self.secret);
        let claims = decode::<Map<String, Value>>(token, &key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => IdentifierError::invalid_token("Token has expired"),
                ErrorKind::InvalidSignature => IdentifierError::invalid_token("Invalid token signature"),
                ErrorKind::InvalidAudience => IdentifierError::invalid_token("Token audience mismatch"),
                _ => IdentifierError::invalid_token(format!("Token verification failed: {}", e)),
            })?
            .claims;

        if let Some(token_realm) = claims.get(REALM_CLAIM) {
            if token_realm.as_str() != Some(realm) {
                return Err(IdentifierError::invalid_token(format!(
                    "Token realm {} does not match realm '{}'",
                    token_realm, realm
                )));
            }
        }

        Ok(claims)
    }

    fn verified_claims(&self, realm: &str) -> Result<Option<Map<String, Value>>, IdentifierError> {
        match self.bearer_token() {
            Some(token) => self.verify(token, realm).map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Identifier for BearerTokenIdentifier {
    async fn is_signed_in(&self, realm: &str) -> Result<bool, IdentifierError> {
        match self.verified_claims(realm) {
            Ok(claims) => Ok(claims.is_some()),
            Err(e) => {
                debug!("Rejecting bearer token in realm '{}': {}", realm, e);
                Ok(false)
            }
        }
    }

    async fn retrieve_signed_identity(&self, realm: &str) -> Result<Option<IdentityData>, IdentifierError> {
        let Some(mut claims) = self.verified_claims(realm)? else {
            return Ok(None);
        };

        for claim in REGISTERED_CLAIMS.iter().chain([&REALM_CLAIM]) {
            claims.remove(*claim);
        }
        Ok(Some(IdentityData::from(claims)))
    }

    async fn sign_in(&self, _realm: &str, _data: IdentityData) -> Result<(), IdentifierError> {
        Err(IdentifierError::unsupported(
            "Bearer tokens are issued to the client and cannot be signed in by the identifier",
        ))
    }

    async fn sign_out(&self, _realm: &str) -> Result<(), IdentifierError> {
        Ok(())
    }
}
