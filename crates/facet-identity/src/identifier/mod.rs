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

#[cfg(test)]
mod tests;

pub mod bearer;
pub mod session;

pub use bearer::BearerTokenIdentifier;
pub use session::{MemorySessionStore, SessionIdentifier, SessionStore};

use crate::identity::{IdentityData, IdentityError, SharedIdentity};
use async_trait::async_trait;
use bon::Builder;
use log::{debug, warn};
use std::sync::Arc;
use thiserror::Error;

/// Realm used when none is configured.
pub const DEFAULT_REALM: &str = "Default_Auth";

/// Key under which storage-backed identifiers keep the signed identity within a realm.
pub const STORAGE_IDENTITY_KEY: &str = "identity";

/// Signs an identity into and out of an ambient mechanism (session, header, token) and retrieves it again.
///
/// Every method receives the realm it operates in. Realms namespace the underlying storage so several independent
/// authentication domains can coexist.
#[async_trait]
pub trait Identifier: Send + Sync {
    /// Returns true when the ambient mechanism currently recognizes a signed-in subject for the realm.
    async fn is_signed_in(&self, realm: &str) -> Result<bool, IdentifierError>;

    /// Retrieves identity data for a signed-in subject.
    ///
    /// Only called after [`Identifier::is_signed_in`] reported true. Returns `None` when no update is needed.
    async fn retrieve_signed_identity(&self, realm: &str) -> Result<Option<IdentityData>, IdentifierError>;

    /// Persists identity data so later requests in the realm are recognized.
    async fn sign_in(&self, realm: &str, data: IdentityData) -> Result<(), IdentifierError>;

    /// Removes the signed identity from the realm. Returns normally if nothing was signed in.
    async fn sign_out(&self, realm: &str) -> Result<(), IdentifierError>;
}

#[derive(Debug, Error)]
pub enum IdentifierError {
    #[error("Identity is not authenticated in realm: {realm}")]
    NotAuthenticated { realm: String },

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Identity error: {0}")]
    IdentityError(#[from] IdentityError),
}

impl IdentifierError {
    pub fn not_authenticated(realm: impl Into<String>) -> Self {
        IdentifierError::NotAuthenticated { realm: realm.into() }
    }

    pub fn store_error(message: impl Into<String>) -> Self {
        IdentifierError::StoreError(message.into())
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        IdentifierError::InvalidToken(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        IdentifierError::Unsupported(message.into())
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        IdentifierError::InternalError(message.into())
    }
}

/// Construction-time options for an [`IdentifierApi`].
#[derive(Builder, Debug, Clone)]
pub struct IdentifierConfig {
    /// Storage namespace for the identifier (defaults to [`DEFAULT_REALM`])
    #[builder(into, default = DEFAULT_REALM)]
    pub realm: String,
    /// Identity that signed data is loaded into when none was attached (defaults to an empty open identity)
    pub default_identity: Option<SharedIdentity>,
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Resolves the current identity of a realm.
///
/// An attached identity that is already fulfilled is authoritative. Otherwise, when the subject is signed in, data
/// retrieved by the [`Identifier`] is imported into the attached identity in place. Resolution never fails because a
/// subject is not authenticated; callers that need a fulfilled identity use [`IdentifierApi::require_identity`].
///
/// An instance belongs to a single request or task.
///
/// # Example
///
/// ```
/// # use std::sync::Arc;
/// # use dsdk_facet_identity::identifier::{IdentifierApi, IdentifierConfig, MemorySessionStore, SessionIdentifier};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(MemorySessionStore::new());
/// let session_id = store.create_session().await;
/// let identifier = SessionIdentifier::builder().store(store).session_id(session_id).build();
///
/// let mut api = IdentifierApi::new(Arc::new(identifier), IdentifierConfig::builder().realm("admin").build());
/// let identity = api.identity().await?;
/// assert!(!identity.is_fulfilled()?);
/// # Ok(())
/// # }
/// ```
pub struct IdentifierApi {
    identifier: Arc<dyn Identifier>,
    realm: String,
    identity: Option<SharedIdentity>,
    default_identity: Option<SharedIdentity>,
}

impl IdentifierApi {
    pub fn new(identifier: Arc<dyn Identifier>, config: IdentifierConfig) -> Self {
        let mut api = Self {
            identifier,
            realm: String::new(),
            identity: None,
            default_identity: config.default_identity,
        };
        api.set_realm(config.realm);
        api
    }

    pub fn with_defaults(identifier: Arc<dyn Identifier>) -> Self {
        Self::new(identifier, IdentifierConfig::default())
    }

    /// Attaches an identity, replacing any previously attached one. The identity is not validated.
    pub fn set_identity(&mut self, identity: SharedIdentity) -> &mut Self {
        self.identity = Some(identity);
        self
    }

    /// Returns the current identity of the realm, fulfilled or not.
    pub async fn identity(&mut self) -> Result<SharedIdentity, IdentifierError> {
        let identity = match self.identity.clone() {
            Some(identity) => identity,
            None => {
                let identity = self.default_identity();
                self.identity = Some(identity.clone());
                identity
            }
        };

        if identity.is_fulfilled()? {
            return Ok(identity);
        }

        if self.identifier.is_signed_in(&self.realm).await? {
            match self.identifier.retrieve_signed_identity(&self.realm).await? {
                Some(data) => {
                    debug!("Importing {} signed identity field(s) in realm '{}'", data.len(), self.realm);
                    identity.import(data)?;
                }
                None => {
                    debug!("Signed identity in realm '{}' needs no update", self.realm);
                }
            }
        }

        Ok(identity)
    }

    /// Resolves the current identity and fails with [`IdentifierError::NotAuthenticated`] if it is not fulfilled.
    pub async fn require_identity(&mut self) -> Result<SharedIdentity, IdentifierError> {
        let identity = self.identity().await?;
        if !identity.is_fulfilled()? {
            return Err(IdentifierError::not_authenticated(&self.realm));
        }
        Ok(identity)
    }

    pub async fn is_signed_in(&self) -> Result<bool, IdentifierError> {
        self.identifier.is_signed_in(&self.realm).await
    }

    /// Signs a fulfilled identity into the realm and attaches it.
    ///
    /// # Errors
    /// Returns NotAuthenticated if the identity is not fulfilled.
    pub async fn sign_in(&mut self, identity: SharedIdentity) -> Result<(), IdentifierError> {
        if !identity.is_fulfilled()? {
            return Err(IdentifierError::not_authenticated(&self.realm));
        }

        self.identifier.sign_in(&self.realm, identity.data()?).await?;
        debug!("Signed in identity in realm '{}'", self.realm);
        self.identity = Some(identity);
        Ok(())
    }

    /// Signs the realm out, clears the attached identity in place and detaches it.
    pub async fn sign_out(&mut self) -> Result<(), IdentifierError> {
        if let Err(e) = self.identifier.sign_out(&self.realm).await {
            warn!("Failed to sign out of realm '{}': {}", self.realm, e);
            return Err(e);
        }

        if let Some(identity) = self.identity.take() {
            identity.clear()?;
        }
        debug!("Signed out of realm '{}'", self.realm);
        Ok(())
    }

    /// Sets the realm. An empty realm falls back to [`DEFAULT_REALM`].
    pub fn set_realm(&mut self, realm: impl Into<String>) -> &mut Self {
        let realm = realm.into();
        self.realm = if realm.is_empty() {
            DEFAULT_REALM.to_string()
        } else {
            realm
        };
        self
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Sets the identity that signed data is loaded into when no identity is attached.
    pub fn set_default_identity(&mut self, identity: SharedIdentity) -> &mut Self {
        self.default_identity = Some(identity);
        self
    }

    pub(crate) fn default_identity(&mut self) -> SharedIdentity {
        self.default_identity.get_or_insert_with(SharedIdentity::open).clone()
    }
}
