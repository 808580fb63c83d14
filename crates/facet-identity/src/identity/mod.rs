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

use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// A bag of authenticated user fields, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityData(Map<String, Value>);

impl IdentityData {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Folds `other` into this bag. Fields present in both take the value from `other`.
    pub fn merge(&mut self, other: IdentityData) {
        for (field, value) in other.0 {
            self.0.insert(field, value);
        }
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for IdentityData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K, V> FromIterator<(K, V)> for IdentityData
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Authenticated user data that can report whether it is complete.
///
/// Implementations decide their own fulfillment rule. Imports always mutate the instance in place so that every
/// holder of a [`SharedIdentity`] observes the update.
pub trait Identity: Debug + Send + Sync {
    /// Returns true when the identity holds enough data to recognize the user.
    fn is_fulfilled(&self) -> bool;

    /// Merges `data` into the identity.
    fn import(&mut self, data: IdentityData);

    /// Snapshot of the fields currently held.
    fn data(&self) -> IdentityData;

    /// Drops every held field.
    fn clear(&mut self);
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Cloneable handle to a single identity instance.
#[derive(Debug, Clone)]
pub struct SharedIdentity(Arc<RwLock<dyn Identity>>);

impl SharedIdentity {
    pub fn new<I: Identity + 'static>(identity: I) -> Self {
        Self(Arc::new(RwLock::new(identity)))
    }

    /// Creates a handle to an empty [`OpenIdentity`].
    pub fn open() -> Self {
        Self::new(OpenIdentity::new())
    }

    pub fn is_fulfilled(&self) -> Result<bool, IdentityError> {
        let identity = self.0.read().map_err(|e| IdentityError::LockPoisoned(e.to_string()))?;
        Ok(identity.is_fulfilled())
    }

    pub fn import(&self, data: IdentityData) -> Result<(), IdentityError> {
        let mut identity = self.0.write().map_err(|e| IdentityError::LockPoisoned(e.to_string()))?;
        identity.import(data);
        Ok(())
    }

    pub fn data(&self) -> Result<IdentityData, IdentityError> {
        let identity = self.0.read().map_err(|e| IdentityError::LockPoisoned(e.to_string()))?;
        Ok(identity.data())
    }

    pub fn clear(&self) -> Result<(), IdentityError> {
        let mut identity = self.0.write().map_err(|e| IdentityError::LockPoisoned(e.to_string()))?;
        identity.clear();
        Ok(())
    }

    /// Returns true if both handles point at the same identity instance.
    pub fn ptr_eq(&self, other: &SharedIdentity) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// The default identity: an open bag of fields.
///
/// Without required fields the identity is fulfilled as soon as it holds any field. With required fields, every one of
/// them must be present and non-null.
#[derive(Builder, Debug, Clone, Default)]
pub struct OpenIdentity {
    #[builder(default)]
    data: IdentityData,
    #[builder(default)]
    required: BTreeSet<String>,
}

impl OpenIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty identity that is fulfilled only once all of `fields` are present.
    pub fn requiring<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data: IdentityData::new(),
            required: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn required(&self) -> &BTreeSet<String> {
        &self.required
    }
}

impl Identity for OpenIdentity {
    fn is_fulfilled(&self) -> bool {
        if self.required.is_empty() {
            return !self.data.is_empty();
        }
        self.required
            .iter()
            .all(|field| self.data.get(field).is_some_and(|value| !value.is_null()))
    }

    fn import(&mut self, data: IdentityData) {
        self.data.merge(data);
    }

    fn data(&self) -> IdentityData {
        self.data.clone()
    }

    fn clear(&mut self) {
        self.data = IdentityData::new();
    }
}
