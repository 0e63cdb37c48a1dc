//! Script construction and classification.
//!
//! Only the serialization shape of scripts matters to the wallet: locking
//! scripts identify owners during UTXO scanning, and input scripts must
//! have a byte length that is known before any signature exists so fee
//! estimation on a template carries over to the signed transaction.
//!
//! Signatures never live in the script itself; they occupy fixed 64-byte
//! witness slots on the input ([`crate::types::TxInput::witness`]). The
//! `OP_0` bytes at the front of an input script mark those slots, one per
//! required signature, which is what makes templated and signed encodings
//! the same length.

use crate::error::ScriptError;
use crate::types::Hash160;

/// Placeholder opcode: marks a witness signature slot in an input script.
pub const OP_0: u8 = 0x00;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKMULTISIG: u8 = 0xae;

/// Compressed secp256k1 public key length.
pub const PUBKEY_LEN: usize = 33;

/// Push opcode for a compressed public key (the length byte is the opcode).
pub const PUSH_PUBKEY: u8 = PUBKEY_LEN as u8;

/// Push opcode for a 20-byte hash.
const PUSH_HASH160: u8 = 20;

/// Serialized length of a pay-to-key-hash locking script.
pub const P2KH_SCRIPT_LEN: usize = 25;

/// Serialized length of a pay-to-script-hash locking script.
pub const P2SH_SCRIPT_LEN: usize = 23;

/// Serialized length of a single-sig input script:
/// `OP_0` + key push (1 + 33).
pub const SINGLE_SIG_INPUT_LEN: usize = 35;

/// Largest multisig quorum size the script encoding supports.
pub const MAX_MULTISIG_KEYS: u8 = 16;

/// `OP_1`..`OP_16` small-integer opcode for `n` in 1..=16.
pub fn op_n(n: u8) -> u8 {
    debug_assert!((1..=MAX_MULTISIG_KEYS).contains(&n));
    0x50 + n
}

/// First 20 bytes of BLAKE3 over `data`.
///
/// Used for both public-key hashes and redeem-script hashes.
pub fn hash160(data: &[u8]) -> Hash160 {
    let full: [u8; 32] = blake3::hash(data).into();
    let mut out = [0u8; 20];
    out.copy_from_slice(&full[..20]);
    Hash160(out)
}

/// Locking script paying to a public-key hash.
///
/// `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`, 25 bytes.
pub fn pay_to_key_hash(hash: &Hash160) -> Vec<u8> {
    let mut script = Vec::with_capacity(P2KH_SCRIPT_LEN);
    script.push(OP_DUP);
    script.push(OP_HASH160);
    script.push(PUSH_HASH160);
    script.extend_from_slice(hash.as_bytes());
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// Locking script paying to a redeem-script hash.
///
/// `OP_HASH160 <20> OP_EQUAL`, 23 bytes.
pub fn pay_to_script_hash(hash: &Hash160) -> Vec<u8> {
    let mut script = Vec::with_capacity(P2SH_SCRIPT_LEN);
    script.push(OP_HASH160);
    script.push(PUSH_HASH160);
    script.extend_from_slice(hash.as_bytes());
    script.push(OP_EQUAL);
    script
}

/// Input script spending a key-hash output: one signature slot followed by
/// the full-length public key push. Always exactly 35 bytes.
pub fn single_sig_input(pubkey: &[u8; PUBKEY_LEN]) -> Vec<u8> {
    let mut script = Vec::with_capacity(SINGLE_SIG_INPUT_LEN);
    script.push(OP_0);
    script.push(PUSH_PUBKEY);
    script.extend_from_slice(pubkey);
    script
}

/// The m-of-n redeem structure:
/// `OP_m (<33-byte key>)* OP_n OP_CHECKMULTISIG`, 34n + 3 bytes.
///
/// Key order is significant; cosigners must agree on it.
pub fn multisig_redeem(m: u8, keys: &[[u8; PUBKEY_LEN]]) -> Result<Vec<u8>, ScriptError> {
    let n = keys.len() as u8;
    if m < 1 || n < 1 || m > n || n > MAX_MULTISIG_KEYS {
        return Err(ScriptError::InvalidQuorum { m, n });
    }
    let mut script = Vec::with_capacity(multisig_redeem_len(n as usize));
    script.push(op_n(m));
    for key in keys {
        script.push(PUSH_PUBKEY);
        script.extend_from_slice(key);
    }
    script.push(op_n(n));
    script.push(OP_CHECKMULTISIG);
    Ok(script)
}

/// Input script spending a script-hash output: m signature slots followed
/// by the redeem structure. m + 34n + 3 bytes.
pub fn multisig_input(m: u8, keys: &[[u8; PUBKEY_LEN]]) -> Result<Vec<u8>, ScriptError> {
    let redeem = multisig_redeem(m, keys)?;
    let mut script = Vec::with_capacity(m as usize + redeem.len());
    script.resize(m as usize, OP_0);
    script.extend_from_slice(&redeem);
    Ok(script)
}

/// Redeem structure length for `n` keys.
pub fn multisig_redeem_len(n: usize) -> usize {
    34 * n + 3
}

/// Input script length for an m-of-n spend.
pub fn multisig_input_len(m: usize, n: usize) -> usize {
    m + multisig_redeem_len(n)
}

/// Owner commitment a locking script pays to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    /// Pay-to-key-hash: single-sig ownership.
    KeyHash(Hash160),
    /// Pay-to-script-hash: multisig redeem ownership.
    ScriptHash(Hash160),
}

impl ScriptKind {
    /// The committed 20-byte hash, whichever kind it is.
    pub fn hash(&self) -> Hash160 {
        match self {
            ScriptKind::KeyHash(h) | ScriptKind::ScriptHash(h) => *h,
        }
    }
}

/// Classify a locking script. Returns `None` for non-standard patterns,
/// which the wallet simply does not track.
pub fn classify_output(script: &[u8]) -> Option<ScriptKind> {
    match script {
        [OP_DUP, OP_HASH160, PUSH_HASH160, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG]
            if hash.len() == 20 =>
        {
            let mut h = [0u8; 20];
            h.copy_from_slice(hash);
            Some(ScriptKind::KeyHash(Hash160(h)))
        }
        [OP_HASH160, PUSH_HASH160, hash @ .., OP_EQUAL] if hash.len() == 20 => {
            let mut h = [0u8; 20];
            h.copy_from_slice(hash);
            Some(ScriptKind::ScriptHash(Hash160(h)))
        }
        _ => None,
    }
}

/// Split a multisig input script into its signature-slot count and redeem
/// structure, extracting the pushed keys.
pub fn parse_multisig_input(
    script: &[u8],
) -> Result<(u8, Vec<[u8; PUBKEY_LEN]>, &[u8]), ScriptError> {
    let slots = script.iter().take_while(|&&b| b == OP_0).count();
    let redeem = &script[slots..];
    if redeem.len() < 3 || redeem[redeem.len() - 1] != OP_CHECKMULTISIG {
        return Err(ScriptError::UnknownPattern);
    }
    let m = redeem[0].wrapping_sub(0x50);
    let n = redeem[redeem.len() - 2].wrapping_sub(0x50);
    if !(1..=MAX_MULTISIG_KEYS).contains(&m) || m > n || n > MAX_MULTISIG_KEYS {
        return Err(ScriptError::InvalidQuorum { m, n });
    }
    if redeem.len() != multisig_redeem_len(n as usize) || slots != m as usize {
        return Err(ScriptError::UnknownPattern);
    }
    let mut keys = Vec::with_capacity(n as usize);
    let mut pos = 1;
    for _ in 0..n {
        if redeem[pos] != PUSH_PUBKEY {
            return Err(ScriptError::UnknownPattern);
        }
        let mut key = [0u8; PUBKEY_LEN];
        key.copy_from_slice(&redeem[pos + 1..pos + 1 + PUBKEY_LEN]);
        keys.push(key);
        pos += 1 + PUBKEY_LEN;
    }
    Ok((m, keys, redeem))
}
