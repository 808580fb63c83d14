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

pub mod identifier;
pub mod identity;
pub mod util;

pub use identifier::{
    DEFAULT_REALM, Identifier, IdentifierApi, IdentifierConfig, IdentifierError, STORAGE_IDENTITY_KEY,
};
pub use identity::{Identity, IdentityData, IdentityError, OpenIdentity, SharedIdentity};
