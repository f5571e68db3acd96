use crate::config::settings::Settings;
use crate::error::{CredentialError, Result};
use alloy::signers::local::PrivateKeySigner;
use std::path::Path;
use std::str::FromStr;

/// Produce the run's signing credential. An explicit private key wins;
/// otherwise a keystore file is decrypted with the password file contents.
/// There is no retry: a decryption failure ends the run before any network
/// call is made.
pub fn resolve_signer(settings: &Settings) -> Result<PrivateKeySigner> {
    if let Some(raw) = settings.private_key.as_deref() {
        let signer = PrivateKeySigner::from_str(raw.trim())
            .map_err(|e| CredentialError::InvalidKey(e.to_string()))?;
        return Ok(signer);
    }

    match (
        settings.keystore_path.as_deref(),
        settings.keystore_password_path.as_deref(),
    ) {
        (Some(keystore), Some(password_path)) => decrypt_keystore(keystore, password_path),
        _ => Err(CredentialError::NoCredential(
            "set KEEPER_PRIVATE_KEY, or both KEEPER_KEYSTORE_PATH and \
             KEEPER_KEYSTORE_PASSWORD_PATH"
                .to_string(),
        )
        .into()),
    }
}

fn decrypt_keystore(keystore: &Path, password_path: &Path) -> Result<PrivateKeySigner> {
    let password = std::fs::read_to_string(password_path).map_err(|e| CredentialError::Keystore {
        path: keystore.display().to_string(),
        reason: format!("password file `{}` unreadable: {e}", password_path.display()),
    })?;
    // Password files routinely end in a newline the password does not contain.
    let password = password.trim_end_matches(['\r', '\n']);

    PrivateKeySigner::decrypt_keystore(keystore, password).map_err(|e| {
        CredentialError::Keystore {
            path: keystore.display().to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}
