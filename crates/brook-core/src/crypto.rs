//! secp256k1 cryptographic operations for the Brook protocol.
//!
//! Provides key generation, transaction signing, and signature
//! verification. Public keys are 33-byte compressed points; signatures are
//! 64-byte compact ECDSA, carried in fixed-size witness slots so signed and
//! templated transactions serialize to the same length.
//!
//! # Signing scheme
//!
//! Transaction inputs are signed over a **sighash** that commits to:
//! - Transaction version and lock_time
//! - All input outpoints (txid + index)
//! - All outputs (value + locking script)
//! - The index of the input being signed
//!
//! Input scripts and witnesses are excluded from the sighash to avoid
//! circularity and allow inputs to be signed independently in any order.

use secp256k1::ecdsa::Signature;
use secp256k1::{Message, Scalar, SECP256K1, SecretKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::CryptoError;
use crate::script::{self, PUBKEY_LEN, ScriptKind};
use crate::types::{Hash160, Hash256, Transaction, WITNESS_SIG_LEN};

/// secp256k1 keypair for signing transaction inputs.
///
/// Use [`KeyPair::generate`] for random keys or
/// [`KeyPair::from_secret_bytes`] for deterministic derivation from a seed.
pub struct KeyPair {
    secret: SecretKey,
    public: secp256k1::PublicKey,
}

impl KeyPair {
    /// Generate a random keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        let secret = SecretKey::new(&mut rand::thread_rng());
        let public = secret.public_key(SECP256K1);
        Self { secret, public }
    }

    /// Create a keypair from 32-byte secret key material.
    ///
    /// Fails for the zero scalar and values at or above the curve order,
    /// which KDF output hits with negligible probability.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let secret =
            SecretKey::from_slice(&bytes).map_err(|_| CryptoError::InvalidSecretKey)?;
        let public = secret.public_key(SECP256K1);
        Ok(Self { secret, public })
    }

    /// Derive the public key for this keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.public)
    }

    /// Get the raw secret key bytes (32 bytes). Handle with care.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.secret_bytes()
    }

    /// Sign a 32-byte digest, returning the compact 64-byte signature.
    pub fn sign(&self, digest: &Hash256) -> [u8; WITNESS_SIG_LEN] {
        let msg = Message::from_digest(*digest.as_bytes());
        SECP256K1.sign_ecdsa(&msg, &self.secret).serialize_compact()
    }

    /// Additively tweak the keypair: `child = parent + t·G`.
    ///
    /// The matching public child is obtained with [`PublicKey::add_tweak`]
    /// on the parent public key, which is what lets cosigners derive each
    /// other's child keys from registered account keys alone.
    pub fn add_tweak(&self, tweak: &[u8; 32]) -> Result<Self, CryptoError> {
        let scalar = Scalar::from_be_bytes(*tweak).map_err(|_| CryptoError::InvalidTweak)?;
        let secret = self
            .secret
            .add_tweak(&scalar)
            .map_err(|_| CryptoError::InvalidTweak)?;
        let public = secret.public_key(SECP256K1);
        Ok(Self { secret, public })
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self {
            secret: self.secret,
            public: self.public,
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Compressed secp256k1 public key for verification and address derivation.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(secp256k1::PublicKey);

impl PublicKey {
    /// Parse a compressed 33-byte public key.
    pub fn from_bytes(bytes: &[u8; PUBKEY_LEN]) -> Result<Self, CryptoError> {
        Self::from_slice(bytes)
    }

    /// Parse a public key from a byte slice (compressed form expected).
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != PUBKEY_LEN {
            return Err(CryptoError::InvalidPublicKey);
        }
        let pk = secp256k1::PublicKey::from_slice(bytes)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(pk))
    }

    /// The compressed 33-byte encoding.
    pub fn serialize(&self) -> [u8; PUBKEY_LEN] {
        self.0.serialize()
    }

    /// The 20-byte key hash used in pay-to-key-hash outputs.
    pub fn key_hash(&self) -> Hash160 {
        script::hash160(&self.serialize())
    }

    /// Verify a compact ECDSA signature over a 32-byte digest.
    pub fn verify(
        &self,
        digest: &Hash256,
        signature: &[u8; WITNESS_SIG_LEN],
    ) -> Result<(), CryptoError> {
        let sig =
            Signature::from_compact(signature).map_err(|_| CryptoError::InvalidSignature)?;
        let msg = Message::from_digest(*digest.as_bytes());
        SECP256K1
            .verify_ecdsa(&msg, &sig, &self.0)
            .map_err(|_| CryptoError::VerificationFailed)
    }

    /// Additively tweak the key: `child = parent + t·G`.
    pub fn add_tweak(&self, tweak: &[u8; 32]) -> Result<Self, CryptoError> {
        let scalar = Scalar::from_be_bytes(*tweak).map_err(|_| CryptoError::InvalidTweak)?;
        let public = self
            .0
            .add_exp_tweak(SECP256K1, &scalar)
            .map_err(|_| CryptoError::InvalidTweak)?;
        Ok(Self(public))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.serialize()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.serialize()))
    }
}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.serialize().hash(state);
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.serialize()))
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        Self::from_slice(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Compute the signing hash (sighash) for a transaction input.
pub fn signing_hash(tx: &Transaction, input_index: usize) -> Result<Hash256, CryptoError> {
    if input_index >= tx.inputs.len() {
        return Err(CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        });
    }

    let mut data = Vec::new();
    data.extend_from_slice(&tx.version.to_le_bytes());

    data.extend_from_slice(&(tx.inputs.len() as u64).to_le_bytes());
    for input in &tx.inputs {
        data.extend_from_slice(input.previous_output.txid.as_bytes());
        data.extend_from_slice(&input.previous_output.index.to_le_bytes());
    }

    data.extend_from_slice(&(tx.outputs.len() as u64).to_le_bytes());
    for output in &tx.outputs {
        data.extend_from_slice(&output.value.to_le_bytes());
        data.extend_from_slice(&(output.script.len() as u64).to_le_bytes());
        data.extend_from_slice(&output.script);
    }

    data.extend_from_slice(&tx.lock_time.to_le_bytes());
    data.extend_from_slice(&(input_index as u64).to_le_bytes());

    Ok(Hash256(blake3::hash(&data).into()))
}

/// Produce the witness signature for one input.
///
/// Placement into the right witness slot is the builder's job; this only
/// computes the sighash and signs it.
pub fn sign_input(
    tx: &Transaction,
    input_index: usize,
    keypair: &KeyPair,
) -> Result<[u8; WITNESS_SIG_LEN], CryptoError> {
    let sighash = signing_hash(tx, input_index)?;
    Ok(keypair.sign(&sighash))
}

/// Verify a transaction input against the owner commitment of the UTXO it
/// spends.
///
/// For key-hash owners the input script must be the 35-byte single-sig
/// form whose key hashes to the commitment, with one valid witness
/// signature. For script-hash owners the redeem structure must hash to the
/// commitment and the witness must carry m signatures matching distinct
/// redeem keys in order.
pub fn verify_input(
    tx: &Transaction,
    input_index: usize,
    owner: &ScriptKind,
) -> Result<(), CryptoError> {
    if input_index >= tx.inputs.len() {
        return Err(CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        });
    }
    let input = &tx.inputs[input_index];
    let sighash = signing_hash(tx, input_index)?;

    match owner {
        ScriptKind::KeyHash(expected) => {
            if input.script.len() != script::SINGLE_SIG_INPUT_LEN
                || input.script[0] != script::OP_0
                || input.script[1] != script::PUSH_PUBKEY
            {
                return Err(CryptoError::MalformedInputScript);
            }
            let key = PublicKey::from_slice(&input.script[2..])?;
            if key.key_hash() != *expected {
                return Err(CryptoError::KeyHashMismatch);
            }
            if input.witness.len() != 1 {
                return Err(CryptoError::WitnessMismatch);
            }
            let sig: [u8; WITNESS_SIG_LEN] = input.witness[0]
                .as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidSignature)?;
            key.verify(&sighash, &sig)
        }
        ScriptKind::ScriptHash(expected) => {
            let (m, keys, redeem) = script::parse_multisig_input(&input.script)
                .map_err(|_| CryptoError::MalformedInputScript)?;
            if script::hash160(redeem) != *expected {
                return Err(CryptoError::RedeemHashMismatch);
            }
            if input.witness.len() != m as usize {
                return Err(CryptoError::WitnessMismatch);
            }
            // Each signature must match a redeem key, consuming keys in
            // order (CHECKMULTISIG-style subset matching).
            let mut key_iter = keys.iter();
            'sigs: for item in &input.witness {
                let sig: [u8; WITNESS_SIG_LEN] = item
                    .as_slice()
                    .try_into()
                    .map_err(|_| CryptoError::InvalidSignature)?;
                for key_bytes in key_iter.by_ref() {
                    let key = PublicKey::from_bytes(key_bytes)?;
                    if key.verify(&sighash, &sig).is_ok() {
                        continue 'sigs;
                    }
                }
                return Err(CryptoError::WitnessMismatch);
            }
            Ok(())
        }
    }
}
