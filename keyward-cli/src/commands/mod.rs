// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

pub mod backup;
pub mod key;
pub mod mnemonic;

use dialoguer::{theme::ColorfulTheme, Confirm, Password};
use secrecy::SecretString;
use tracing::debug;

use keyward_core::error::{KeywardError, Result};

fn secret_from_env(var_name: &str) -> Option<SecretString> {
    std::env::var(var_name).ok().map(|value| {
        debug!("using secret from {} env var", var_name);
        tracing::warn!(
            "Using secret from {} environment variable. \
             Environment variables may be visible to other processes via /proc on Linux.",
            var_name
        );
        SecretString::from(value)
    })
}

fn read_secret(prompt: &str) -> Result<SecretString> {
    Password::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .interact()
        .map(SecretString::from)
        .map_err(|e| KeywardError::Other(format!("Failed to read input: {}", e)))
}

pub fn get_pin(prompt: &str) -> Result<SecretString> {
    if let Some(pin) = secret_from_env("KEYWARD_PIN") {
        return Ok(pin);
    }
    read_secret(prompt)
}

pub fn get_pin_with_confirm(prompt: &str, confirm: &str) -> Result<SecretString> {
    if let Some(pin) = secret_from_env("KEYWARD_PIN") {
        return Ok(pin);
    }
    Password::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .with_confirmation(confirm, "PINs don't match")
        .interact()
        .map(SecretString::from)
        .map_err(|e| KeywardError::Other(format!("Failed to read PIN: {}", e)))
}

pub fn get_private_key(prompt: &str) -> Result<SecretString> {
    if let Some(key) = secret_from_env("KEYWARD_PRIVATE_KEY") {
        return Ok(key);
    }
    read_secret(prompt)
}

pub fn get_mnemonic(prompt: &str) -> Result<SecretString> {
    if let Some(phrase) = secret_from_env("KEYWARD_MNEMONIC") {
        return Ok(phrase);
    }
    read_secret(prompt)
}

pub fn get_confirm(prompt: &str) -> Result<bool> {
    if std::env::var("KEYWARD_YES").is_ok() {
        return Ok(true);
    }
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| KeywardError::Other(format!("Failed to read confirmation: {}", e)))
}
