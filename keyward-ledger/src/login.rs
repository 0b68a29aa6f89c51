// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

use keyward_core::provider::CryptoProvider;
use tracing::{debug, instrument};

use crate::client::{AccountKeyPayload, AccountRegistry, DeviceInfo, LoginRequest, RegisterKeyRequest};
use crate::error::{LedgerError, Result};

impl AccountKeyPayload {
    pub fn from_provider(provider: &CryptoProvider) -> Self {
        Self {
            public_key: provider.public_key_hex(),
            sign_algo: provider.signature_algorithm(),
            hash_algo: provider.hash_algorithm(),
            weight: provider.key_weight(),
        }
    }
}

/// Signs `challenge` with the user domain tag and exchanges it for a
/// registry token.
#[instrument(skip_all, fields(kind = %provider.kind()))]
pub async fn login(
    registry: &dyn AccountRegistry,
    provider: &CryptoProvider,
    challenge: &str,
    device: DeviceInfo,
) -> Result<String> {
    let signature = provider.user_signature(challenge).await?;
    let request = LoginRequest {
        signature,
        account_key: AccountKeyPayload::from_provider(provider),
        device_info: device,
    };
    let token = registry
        .login(request)
        .await
        .map_err(|e| LedgerError::Registry(e.to_string()))?;
    debug!("registry login succeeded");
    Ok(token)
}

/// Registers the provider's key with the registry. Returns the address.
pub async fn register_key(
    registry: &dyn AccountRegistry,
    provider: &CryptoProvider,
    device: DeviceInfo,
) -> Result<String> {
    registry
        .register_key(RegisterKeyRequest {
            account_key: AccountKeyPayload::from_provider(provider),
            device_info: device,
        })
        .await
        .map_err(|e| LedgerError::Registry(e.to_string()))
}
