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

use crate::identifier::{Identifier, IdentifierError, STORAGE_IDENTITY_KEY};
use crate::identity::IdentityData;
use crate::util::clock::{Clock, default_clock};
use async_trait::async_trait;
use bon::Builder;
use chrono::{DateTime, TimeDelta, Utc};
use log::debug;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

const DEFAULT_IDLE_TIMEOUT_MINUTES: i64 = 30;

/// Session-scoped key/value storage, namespaced per realm.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str, namespace: &str, key: &str) -> Result<Option<Value>, IdentifierError>;
    async fn set(&self, session_id: &str, namespace: &str, key: &str, value: Value) -> Result<(), IdentifierError>;
    async fn remove(&self, session_id: &str, namespace: &str, key: &str) -> Result<(), IdentifierError>;
    async fn destroy(&self, session_id: &str) -> Result<(), IdentifierError>;
}

struct SessionRecord {
    values: HashMap<String, HashMap<String, Value>>,
    last_accessed: DateTime<Utc>,
}

impl SessionRecord {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            values: HashMap::new(),
            last_accessed: now,
        }
    }
}

/// In-memory session store for testing and single-instance deployments.
///
/// Sessions left idle for longer than the idle timeout read as empty and are dropped on next access.
///
/// # Example
///
/// ```
/// # use dsdk_facet_identity::identifier::{MemorySessionStore, SessionStore};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemorySessionStore::new();
/// let session_id = store.create_session().await;
/// store.set(&session_id, "admin", "identity", serde_json::json!({"name": "alice"})).await?;
/// # Ok(())
/// # }
/// ```
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
    idle_timeout: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::with_idle_timeout(TimeDelta::minutes(DEFAULT_IDLE_TIMEOUT_MINUTES))
    }

    pub fn with_idle_timeout(idle_timeout: TimeDelta) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
            clock: default_clock(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_idle_timeout_and_clock(idle_timeout: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
            clock,
        }
    }

    /// Starts an empty session and returns its id.
    pub async fn create_session(&self) -> String {
        let session_id = Uuid::new_v4().to_string();
        let now = self.clock.now();
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), SessionRecord::new(now));
        session_id
    }

    /// Removes all sessions last accessed before `cutoff` and returns how many were removed.
    pub async fn remove_sessions_accessed_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let initial_count = sessions.len();
        sessions.retain(|_, record| record.last_accessed >= cutoff);
        initial_count - sessions.len()
    }

    fn evict_if_expired(&self, sessions: &mut HashMap<String, SessionRecord>, session_id: &str, now: DateTime<Utc>) {
        if let Some(record) = sessions.get(session_id) {
            if now.signed_duration_since(record.last_accessed) > self.idle_timeout {
                debug!("Session '{}' expired after {} of inactivity", session_id, self.idle_timeout);
                sessions.remove(session_id);
            }
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str, namespace: &str, key: &str) -> Result<Option<Value>, IdentifierError> {
        let mut sessions = self.sessions.write().await;
        let now = self.clock.now();
        self.evict_if_expired(&mut sessions, session_id, now);

        let Some(record) = sessions.get_mut(session_id) else {
            return Ok(None);
        };
        record.last_accessed = now;

        Ok(record
            .values
            .get(namespace)
            .and_then(|values| values.get(key))
            .cloned())
    }

    async fn set(&self, session_id: &str, namespace: &str, key: &str, value: Value) -> Result<(), IdentifierError> {
        let mut sessions = self.sessions.write().await;
        let now = self.clock.now();
        self.evict_if_expired(&mut sessions, session_id, now);

        let record = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionRecord::new(now));
        record.last_accessed = now;
        record
            .values
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, session_id: &str, namespace: &str, key: &str) -> Result<(), IdentifierError> {
        let mut sessions = self.sessions.write().await;
        let now = self.clock.now();
        self.evict_if_expired(&mut sessions, session_id, now);

        let Some(record) = sessions.get_mut(session_id) else {
            return Ok(());
        };
        record.last_accessed = now;

        let Some(values) = record.values.get_mut(namespace) else {
            return Ok(());
        };
        values.remove(key);

        if values.is_empty() {
            record.values.remove(namespace);
        }
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> Result<(), IdentifierError> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
impl MemorySessionStore {
    pub(crate) async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub(crate) async fn has_namespace(&self, session_id: &str, namespace: &str) -> bool {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|record| record.values.contains_key(namespace))
            .unwrap_or(false)
    }
}

/// Identifier that keeps the signed identity in a session, under [`STORAGE_IDENTITY_KEY`] of the realm namespace.
#[derive(Builder, Clone)]
pub struct SessionIdentifier {
    store: Arc<dyn SessionStore>,
    #[builder(into)]
    session_id: String,
}

impl SessionIdentifier {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[async_trait]
impl Identifier for SessionIdentifier {
    async fn is_signed_in(&self, realm: &str) -> Result<bool, IdentifierError> {
        let value = self.store.get(&self.session_id, realm, STORAGE_IDENTITY_KEY).await?;
        Ok(value.is_some())
    }

    async fn retrieve_signed_identity(&self, realm: &str) -> Result<Option<IdentityData>, IdentifierError> {
        match self.store.get(&self.session_id, realm, STORAGE_IDENTITY_KEY).await? {
            None => Ok(None),
            Some(Value::Object(fields)) => Ok(Some(IdentityData::from(fields))),
            Some(other) => Err(IdentifierError::store_error(format!(
                "Expected identity object in realm '{}', found: {}",
                realm, other
            ))),
        }
    }

    async fn sign_in(&self, realm: &str, data: IdentityData) -> Result<(), IdentifierError> {
        self.store
            .set(&self.session_id, realm, STORAGE_IDENTITY_KEY, Value::Object(data.into_map()))
            .await
    }

    async fn sign_out(&self, realm: &str) -> Result<(), IdentifierError> {
        self.store.remove(&self.session_id, realm, STORAGE_IDENTITY_KEY).await
    }
}
