use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand_core::{OsRng, RngCore};

const KEY_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
#[error("random source unavailable: {0}")]
pub struct KeyError(#[from] rand_core::Error);

/// 32 random bytes from the OS, URL-safe base64 without padding.
pub fn random_key() -> Result<String, KeyError> {
    let mut bytes = [0u8; KEY_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
