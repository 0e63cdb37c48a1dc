//! Error types for the Brook protocol.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("empty inputs or outputs")] EmptyInputsOrOutputs,
    #[error("value overflow")] ValueOverflow,
    #[error("oversized: {size} > {max}")] OversizedTransaction { size: usize, max: usize },
    #[error("witness item {index} has length {len}, expected 64")] BadWitnessLength { index: usize, len: usize },
    #[error("truncated encoding")] Truncated,
    #[error("trailing bytes: {0}")] TrailingBytes(usize),
    #[error("non-canonical varint")] NonCanonicalVarint,
    #[error("serialization: {0}")] Serialization(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("invalid multisig quorum: {m} of {n}")] InvalidQuorum { m: u8, n: u8 },
    #[error("invalid public key length: {0}")] InvalidKeyLength(usize),
    #[error("unrecognized script pattern")] UnknownPattern,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid secret key bytes")] InvalidSecretKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
    #[error("key hash does not match expected")] KeyHashMismatch,
    #[error("redeem script does not match expected hash")] RedeemHashMismatch,
    #[error("input index out of bounds: {index} >= {len}")] InputIndexOutOfBounds { index: usize, len: usize },
    #[error("invalid derivation tweak")] InvalidTweak,
    #[error("malformed input script")] MalformedInputScript,
    #[error("witness does not satisfy script")] WitnessMismatch,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid HRP")] InvalidHrp,
    #[error("invalid length")] InvalidLength,
    #[error("invalid checksum")] InvalidChecksum,
    #[error("invalid character: {0}")] InvalidCharacter(char),
    #[error("invalid version: {0}")] InvalidVersion(u8),
    #[error("invalid padding bits")] InvalidPadding,
    #[error("unknown network: {0}")] UnknownNetwork(String),
    #[error("missing separator")] MissingSeparator,
    #[error("mixed case")] MixedCase,
}
