//! Address encoding for the Brook network.
//!
//! Addresses use Bech32m encoding ([BIP-350]) with human-readable prefixes:
//! - Mainnet: `brk1...`
//! - Testnet: `tbrk1...`
//!
//! Each address encodes a version byte and a 20-byte BLAKE3 hash. Version 0
//! commits to a public key (single-sig); version 1 commits to a redeem
//! script (multisig). The Bech32m checksum guarantees detection of up to 4
//! character errors.
//!
//! [BIP-350]: https://github.com/bitcoin/bips/blob/master/bip-0350.mediawiki

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::crypto::PublicKey;
use crate::error::AddressError;
use crate::script::{self, ScriptKind};
use crate::types::Hash160;

/// Bech32m checksum constant (BIP-350).
const BECH32M_CONST: u32 = 0x2bc830a3;

/// Bech32 character set for encoding 5-bit values.
const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Address version for key-hash programs.
pub const VERSION_KEY_HASH: u8 = 0;

/// Address version for script-hash programs.
pub const VERSION_SCRIPT_HASH: u8 = 1;

/// Network identifier determining the address prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    /// Mainnet (HRP: "brk", addresses start with `brk1`).
    Mainnet,
    /// Testnet (HRP: "tbrk", addresses start with `tbrk1`).
    Testnet,
}

impl Network {
    /// Human-readable prefix for this network.
    pub fn hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "brk",
            Network::Testnet => "tbrk",
        }
    }

    /// Look up network from a human-readable prefix.
    pub fn from_hrp(hrp: &str) -> Result<Self, AddressError> {
        match hrp {
            "brk" => Ok(Network::Mainnet),
            "tbrk" => Ok(Network::Testnet),
            _ => Err(AddressError::UnknownNetwork(hrp.to_string())),
        }
    }
}

/// Kind of program an address pays to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressKind {
    /// Pay-to-key-hash (single-sig).
    KeyHash,
    /// Pay-to-script-hash (multisig redeem).
    ScriptHash,
}

impl AddressKind {
    fn version(&self) -> u8 {
        match self {
            AddressKind::KeyHash => VERSION_KEY_HASH,
            AddressKind::ScriptHash => VERSION_SCRIPT_HASH,
        }
    }

    fn from_version(version: u8) -> Result<Self, AddressError> {
        match version {
            VERSION_KEY_HASH => Ok(AddressKind::KeyHash),
            VERSION_SCRIPT_HASH => Ok(AddressKind::ScriptHash),
            v => Err(AddressError::InvalidVersion(v)),
        }
    }
}

/// A Brook network address: network, program kind, and 20-byte hash.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    kind: AddressKind,
    hash: Hash160,
}

impl Address {
    /// Create a key-hash address.
    pub fn from_key_hash(hash: Hash160, network: Network) -> Self {
        Self {
            network,
            kind: AddressKind::KeyHash,
            hash,
        }
    }

    /// Create a script-hash address committing to a redeem script.
    pub fn from_script_hash(hash: Hash160, network: Network) -> Self {
        Self {
            network,
            kind: AddressKind::ScriptHash,
            hash,
        }
    }

    /// Create a key-hash address for a public key.
    pub fn from_public_key(public_key: &PublicKey, network: Network) -> Self {
        Self::from_key_hash(public_key.key_hash(), network)
    }

    /// Create a script-hash address for a redeem script.
    pub fn from_redeem_script(redeem: &[u8], network: Network) -> Self {
        Self::from_script_hash(script::hash160(redeem), network)
    }

    /// The 20-byte hash this address commits to.
    pub fn hash(&self) -> Hash160 {
        self.hash
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// The locking script paying to this address.
    pub fn script_pubkey(&self) -> Vec<u8> {
        match self.kind {
            AddressKind::KeyHash => script::pay_to_key_hash(&self.hash),
            AddressKind::ScriptHash => script::pay_to_script_hash(&self.hash),
        }
    }

    /// The owner commitment this address corresponds to.
    pub fn script_kind(&self) -> ScriptKind {
        match self.kind {
            AddressKind::KeyHash => ScriptKind::KeyHash(self.hash),
            AddressKind::ScriptHash => ScriptKind::ScriptHash(self.hash),
        }
    }

    /// Encode this address as a Bech32m string.
    pub fn encode(&self) -> String {
        let hrp = self.network.hrp();
        let data_5bit = convert_bits(self.hash.as_bytes(), 8, 5, true)
            .expect("20-byte hash always converts to 5-bit");

        let mut payload = Vec::with_capacity(1 + data_5bit.len());
        payload.push(self.kind.version());
        payload.extend_from_slice(&data_5bit);

        let checksum = bech32m_checksum(hrp, &payload);

        let mut result = String::with_capacity(hrp.len() + 1 + payload.len() + 6);
        result.push_str(hrp);
        result.push('1');
        for &d in payload.iter().chain(checksum.iter()) {
            result.push(CHARSET[d as usize] as char);
        }
        result
    }

    /// Decode a Bech32m address string.
    pub fn decode(s: &str) -> Result<Self, AddressError> {
        let has_lower = s.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = s.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper {
            return Err(AddressError::MixedCase);
        }
        let s = s.to_ascii_lowercase();

        let sep = s.rfind('1').ok_or(AddressError::MissingSeparator)?;
        if sep == 0 {
            return Err(AddressError::InvalidHrp);
        }
        // Version char + 6 checksum chars minimum after the separator.
        if sep + 8 > s.len() {
            return Err(AddressError::InvalidLength);
        }

        let hrp = &s[..sep];
        let mut data = Vec::with_capacity(s.len() - sep - 1);
        for c in s[sep + 1..].chars() {
            let pos = CHARSET
                .iter()
                .position(|&ch| ch as char == c)
                .ok_or(AddressError::InvalidCharacter(c))?;
            data.push(pos as u8);
        }

        if !bech32m_verify(hrp, &data) {
            return Err(AddressError::InvalidChecksum);
        }

        let payload = &data[..data.len() - 6];
        if payload.is_empty() {
            return Err(AddressError::InvalidLength);
        }

        let kind = AddressKind::from_version(payload[0])?;
        let hash_bytes =
            convert_bits(&payload[1..], 5, 8, false).ok_or(AddressError::InvalidPadding)?;
        if hash_bytes.len() != 20 {
            return Err(AddressError::InvalidLength);
        }

        let network = Network::from_hrp(hrp)?;
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&hash_bytes);

        Ok(Self {
            network,
            kind,
            hash: Hash160(hash),
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}

// --- Bech32m internals ---

fn bech32m_polymod(values: impl IntoIterator<Item = u8>) -> u32 {
    const GEN: [u32; 5] = [0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3];
    let mut chk: u32 = 1;
    for v in values {
        let b = chk >> 25;
        chk = ((chk & 0x1ffffff) << 5) ^ (v as u32);
        for (i, &g) in GEN.iter().enumerate() {
            if (b >> i) & 1 != 0 {
                chk ^= g;
            }
        }
    }
    chk
}

fn hrp_expand(hrp: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(hrp.len() * 2 + 1);
    out.extend(hrp.bytes().map(|c| c >> 5));
    out.push(0);
    out.extend(hrp.bytes().map(|c| c & 31));
    out
}

fn bech32m_checksum(hrp: &str, data: &[u8]) -> [u8; 6] {
    let mut values = hrp_expand(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0; 6]);
    let polymod = bech32m_polymod(values) ^ BECH32M_CONST;
    let mut out = [0u8; 6];
    for (i, item) in out.iter_mut().enumerate() {
        *item = ((polymod >> (5 * (5 - i))) & 31) as u8;
    }
    out
}

fn bech32m_verify(hrp: &str, data: &[u8]) -> bool {
    let mut values = hrp_expand(hrp);
    values.extend_from_slice(data);
    bech32m_polymod(values) == BECH32M_CONST
}

/// Convert between bit widths (e.g. 8-bit bytes to 5-bit Bech32 groups).
fn convert_bits(data: &[u8], from_bits: u32, to_bits: u32, pad: bool) -> Option<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = Vec::new();
    let maxv = (1u32 << to_bits) - 1;
    for &value in data {
        let v = value as u32;
        if v >> from_bits != 0 {
            return None;
        }
        acc = (acc << from_bits) | v;
        bits += from_bits;
        while bits >= to_bits {
            bits -= to_bits;
            out.push(((acc >> bits) & maxv) as u8);
        }
    }
    if pad {
        if bits > 0 {
            out.push(((acc << (to_bits - bits)) & maxv) as u8);
        }
    } else if bits >= from_bits || ((acc << (to_bits - bits)) & maxv) != 0 {
        return None;
    }
    Some(out)
}
