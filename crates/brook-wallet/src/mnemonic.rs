//! BIP-39 mnemonic seed backup and restoration.

use bip39::{Language, Mnemonic};

use crate::error::WalletError;
use crate::keys::Seed;

/// Encode a 32-byte seed as a 24-word BIP-39 phrase.
pub fn seed_to_mnemonic(seed: &Seed) -> String {
    let m = Mnemonic::from_entropy_in(Language::English, seed.as_bytes())
        .expect("32 bytes always produces valid mnemonic");
    m.to_string()
}

/// Parse a BIP-39 phrase back into the 32-byte seed.
///
/// Whitespace is normalized and the phrase lowercased before parsing.
pub fn mnemonic_to_seed(phrase: &str) -> Result<Seed, WalletError> {
    let normalized = phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let m = Mnemonic::parse_in(Language::English, &normalized)
        .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
    let entropy = m.to_entropy();
    if entropy.len() != 32 {
        return Err(WalletError::InvalidMnemonic(format!(
            "expected 32 bytes of entropy, got {}",
            entropy.len()
        )));
    }
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&entropy);
    Ok(Seed::from_bytes(bytes))
}
