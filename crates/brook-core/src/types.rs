//! Core protocol types: hashes, outpoints, transactions.
//!
//! All monetary values are in drips (1 BROOK = 10^8 drips). All numeric
//! fields use u64 per protocol convention and serialize little-endian.
//!
//! # Consensus encoding
//!
//! The wallet predicts transaction byte sizes before signatures exist, so
//! the wire layout is fixed here rather than delegated to a generic codec:
//!
//! ```text
//! transaction := version(8) || varint(#in) || input* || varint(#out) || output* || lock_time(8)
//! input       := txid(32) || vout(8) || varint(len) || script || varint(#wit) || sig(64)*
//! output      := value(8) || varint(len) || script
//! ```
//!
//! Witness items are raw 64-byte signatures with no per-item length prefix.
//! The transaction id is BLAKE3 over the encoding with every witness count
//! pinned to zero, so filling in signatures never changes the id.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TransactionError;

/// Length of a raw witness signature in bytes.
pub const WITNESS_SIG_LEN: usize = 64;

/// A 32-byte hash value (transaction ids, sighashes).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash. Used for coinbase previous outpoints.
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 20-byte hash committing to a public key or redeem script.
///
/// Computed as the first 20 bytes of BLAKE3; see [`crate::script::hash160`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash160(pub [u8; 20]);

impl Hash160 {
    pub const ZERO: Self = Self([0u8; 20]);

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl AsRef<[u8]> for Hash160 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Reference to a specific output of a previous transaction.
///
/// `Ord` follows (txid, index) so outpoints give a stable tie-break order
/// during coin selection.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    /// Transaction ID containing the referenced output.
    pub txid: Hash256,
    /// Index of the output within the transaction.
    pub index: u64,
}

impl OutPoint {
    /// The null outpoint, used for coinbase transaction inputs.
    pub fn null() -> Self {
        Self {
            txid: Hash256::ZERO,
            index: u64::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.index == u64::MAX
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// A transaction input, spending a previous output.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxInput {
    /// The outpoint being spent. Null outpoint for coinbase.
    pub previous_output: OutPoint,
    /// Input script: key material pushes. Empty for raw-mode and coinbase.
    pub script: Vec<u8>,
    /// Witness signatures, each exactly 64 bytes. Zero-filled in templates.
    pub witness: Vec<Vec<u8>>,
}

impl TxInput {
    /// An input with no script or witness, referencing the given outpoint.
    pub fn bare(previous_output: OutPoint) -> Self {
        Self {
            previous_output,
            script: Vec::new(),
            witness: Vec::new(),
        }
    }
}

/// A transaction output, creating a new UTXO.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    /// Value in drips.
    pub value: u64,
    /// Locking script (see [`crate::script`]).
    pub script: Vec<u8>,
}

/// A transaction transferring value between addresses.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Protocol version.
    pub version: u64,
    /// Inputs consuming previous outputs.
    pub inputs: Vec<TxInput>,
    /// New outputs created by this transaction.
    pub outputs: Vec<TxOutput>,
    /// Block height before which this tx is invalid.
    pub lock_time: u64,
}

impl Transaction {
    /// Compute the transaction ID.
    ///
    /// BLAKE3 over the witness-stripped encoding, so signing a template
    /// leaves the id unchanged.
    pub fn txid(&self) -> Result<Hash256, TransactionError> {
        let encoded = self.encode(false)?;
        Ok(Hash256(blake3::hash(&encoded).into()))
    }

    /// Check if this is a coinbase transaction (single input, null outpoint).
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    /// Sum of all output values. Returns None on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }

    /// Serialized length in bytes, witness included.
    ///
    /// This is the length fee estimation must predict; a templated build
    /// reports the same value as the signed broadcast form.
    pub fn serialized_size(&self) -> Result<usize, TransactionError> {
        let mut size = 8 + varint_len(self.inputs.len() as u64);
        for input in &self.inputs {
            for (i, item) in input.witness.iter().enumerate() {
                if item.len() != WITNESS_SIG_LEN {
                    return Err(TransactionError::BadWitnessLength {
                        index: i,
                        len: item.len(),
                    });
                }
            }
            size += 32
                + 8
                + varint_len(input.script.len() as u64)
                + input.script.len()
                + varint_len(input.witness.len() as u64)
                + input.witness.len() * WITNESS_SIG_LEN;
        }
        size += varint_len(self.outputs.len() as u64);
        for output in &self.outputs {
            size += 8 + varint_len(output.script.len() as u64) + output.script.len();
        }
        size += 8;
        Ok(size)
    }

    /// Consensus-encode the transaction.
    ///
    /// With `include_witness` false, every witness count is written as zero
    /// and no signatures are emitted (the txid preimage).
    pub fn encode(&self, include_witness: bool) -> Result<Vec<u8>, TransactionError> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.version.to_le_bytes());

        write_varint(&mut buf, self.inputs.len() as u64);
        for input in &self.inputs {
            buf.extend_from_slice(input.previous_output.txid.as_bytes());
            buf.extend_from_slice(&input.previous_output.index.to_le_bytes());
            write_varint(&mut buf, input.script.len() as u64);
            buf.extend_from_slice(&input.script);
            if include_witness {
                write_varint(&mut buf, input.witness.len() as u64);
                for (i, item) in input.witness.iter().enumerate() {
                    if item.len() != WITNESS_SIG_LEN {
                        return Err(TransactionError::BadWitnessLength {
                            index: i,
                            len: item.len(),
                        });
                    }
                    buf.extend_from_slice(item);
                }
            } else {
                write_varint(&mut buf, 0);
            }
        }

        write_varint(&mut buf, self.outputs.len() as u64);
        for output in &self.outputs {
            buf.extend_from_slice(&output.value.to_le_bytes());
            write_varint(&mut buf, output.script.len() as u64);
            buf.extend_from_slice(&output.script);
        }

        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        Ok(buf)
    }

    /// Decode a transaction from its full (witness-bearing) encoding.
    ///
    /// Rejects trailing bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, TransactionError> {
        let mut cur = Cursor::new(bytes);

        let version = cur.read_u64()?;

        let n_inputs = cur.read_varint()? as usize;
        let mut inputs = Vec::with_capacity(n_inputs.min(crate::constants::MAX_INPUTS));
        for _ in 0..n_inputs {
            let txid = Hash256(cur.read_array::<32>()?);
            let index = cur.read_u64()?;
            let script_len = cur.read_varint()? as usize;
            let script = cur.read_bytes(script_len)?.to_vec();
            let n_witness = cur.read_varint()? as usize;
            let mut witness = Vec::with_capacity(n_witness.min(16));
            for _ in 0..n_witness {
                witness.push(cur.read_bytes(WITNESS_SIG_LEN)?.to_vec());
            }
            inputs.push(TxInput {
                previous_output: OutPoint { txid, index },
                script,
                witness,
            });
        }

        let n_outputs = cur.read_varint()? as usize;
        let mut outputs = Vec::with_capacity(n_outputs.min(crate::constants::MAX_OUTPUTS));
        for _ in 0..n_outputs {
            let value = cur.read_u64()?;
            let script_len = cur.read_varint()? as usize;
            let script = cur.read_bytes(script_len)?.to_vec();
            outputs.push(TxOutput { value, script });
        }

        let lock_time = cur.read_u64()?;

        let remaining = cur.remaining();
        if remaining > 0 {
            return Err(TransactionError::TrailingBytes(remaining));
        }

        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }
}

/// Number of bytes a compact-size varint occupies for `value`.
pub fn varint_len(value: u64) -> usize {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Append a Bitcoin-style compact-size varint.
pub fn write_varint(buf: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xfc => buf.push(value as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Byte-slice cursor for consensus decoding.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], TransactionError> {
        if self.remaining() < len {
            return Err(TransactionError::Truncated);
        }
        let out = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], TransactionError> {
        let slice = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn read_u64(&mut self) -> Result<u64, TransactionError> {
        Ok(u64::from_le_bytes(self.read_array::<8>()?))
    }

    fn read_varint(&mut self) -> Result<u64, TransactionError> {
        let tag = self.read_bytes(1)?[0];
        let value = match tag {
            0xfd => u64::from(u16::from_le_bytes(self.read_array::<2>()?)),
            0xfe => u64::from(u32::from_le_bytes(self.read_array::<4>()?)),
            0xff => u64::from_le_bytes(self.read_array::<8>()?),
            b => u64::from(b),
        };
        // Reject encodings that should have used a shorter form.
        if varint_len(value) != 1 + tag_extra(tag) {
            return Err(TransactionError::NonCanonicalVarint);
        }
        Ok(value)
    }
}

fn tag_extra(tag: u8) -> usize {
    match tag {
        0xfd => 2,
        0xfe => 4,
        0xff => 8,
        _ => 0,
    }
}
