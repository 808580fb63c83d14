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

use crate::identifier::tests::mocks::MockIdentifier;
use crate::identifier::{IdentifierApi, IdentifierConfig, IdentifierError};
use crate::identity::{IdentityData, SharedIdentity};
use std::sync::Arc;

fn fulfilled_identity() -> SharedIdentity {
    let identity = SharedIdentity::open();
    identity
        .import(IdentityData::from_iter([("name", "alice"), ("role", "admin")]))
        .unwrap();
    identity
}

#[tokio::test]
async fn test_sign_in_rejects_unfulfilled_identity() {
    let mut mock = MockIdentifier::new();
    mock.expect_sign_in().never();

    let mut api = IdentifierApi::with_defaults(Arc::new(mock));
    let result = api.sign_in(SharedIdentity::open()).await;

    assert!(matches!(result, Err(IdentifierError::NotAuthenticated { .. })));
}

#[tokio::test]
async fn test_sign_in_persists_and_attaches_identity() {
    let mut mock = MockIdentifier::new();
    mock.expect_sign_in().times(1).returning(|realm, data| {
        assert_eq!(realm, "admin");
        assert_eq!(data.get_str("name"), Some("alice"));
        assert_eq!(data.get_str("role"), Some("admin"));
        Ok(())
    });
    mock.expect_is_signed_in().never();

    let config = IdentifierConfig::builder().realm("admin").build();
    let mut api = IdentifierApi::new(Arc::new(mock), config);
    let identity = fulfilled_identity();

    api.sign_in(identity.clone()).await.expect("Sign in failed");

    let resolved = api.identity().await.unwrap();
    assert!(resolved.ptr_eq(&identity));
}

#[tokio::test]
async fn test_sign_in_store_failure_does_not_attach() {
    let mut mock = MockIdentifier::new();
    mock.expect_sign_in()
        .returning(|_, _| Err(IdentifierError::store_error("write failed")));
    mock.expect_is_signed_in().returning(|_| Ok(false));

    let mut api = IdentifierApi::with_defaults(Arc::new(mock));
    let identity = fulfilled_identity();

    let result = api.sign_in(identity.clone()).await;
    assert!(matches!(result, Err(IdentifierError::StoreError(_))));

    let resolved = api.identity().await.unwrap();
    assert!(!resolved.ptr_eq(&identity));
}

#[tokio::test]
async fn test_sign_out_clears_and_detaches_identity() {
    let mut mock = MockIdentifier::new();
    mock.expect_sign_in().returning(|_, _| Ok(()));
    mock.expect_sign_out().times(1).returning(|_| Ok(()));
    mock.expect_is_signed_in().returning(|_| Ok(false));

    let mut api = IdentifierApi::with_defaults(Arc::new(mock));
    let identity = fulfilled_identity();
    api.sign_in(identity.clone()).await.unwrap();

    api.sign_out().await.expect("Sign out failed");

    assert!(identity.data().unwrap().is_empty(), "Held identity should be cleared in place");
    let resolved = api.identity().await.unwrap();
    assert!(!resolved.ptr_eq(&identity), "Identity should be detached after sign out");
    assert!(!resolved.is_fulfilled().unwrap());
}

#[tokio::test]
async fn test_sign_out_failure_keeps_identity() {
    let mut mock = MockIdentifier::new();
    mock.expect_sign_out()
        .returning(|_| Err(IdentifierError::store_error("session backend unavailable")));
    mock.expect_is_signed_in().never();

    let mut api = IdentifierApi::with_defaults(Arc::new(mock));
    let identity = fulfilled_identity();
    api.set_identity(identity.clone());

    let result = api.sign_out().await;
    assert!(result.is_err());

    let resolved = api.identity().await.unwrap();
    assert!(resolved.ptr_eq(&identity));
    assert!(resolved.is_fulfilled().unwrap());
}

#[tokio::test]
async fn test_is_signed_in_delegates_with_realm() {
    let mut mock = MockIdentifier::new();
    mock.expect_is_signed_in().times(1).returning(|realm| Ok(realm == "api"));

    let config = IdentifierConfig::builder().realm("api").build();
    let api = IdentifierApi::new(Arc::new(mock), config);

    assert!(api.is_signed_in().await.unwrap());
}
