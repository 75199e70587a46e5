use std::fmt;
use std::str::FromStr;

use alloy_primitives::{eip191_hash_message, hex, keccak256, Address, Signature, B256, U256};
use subtle::ConstantTimeEq;

use crate::ApplicationPublicKey;

/// `r || s || v`
pub const SIGNATURE_LEN: usize = 65;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Valid,
    Invalid,
}

impl SignatureCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, SignatureCheck::Valid)
    }
}

/// How the signed payload is turned into the 32 byte message digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestScheme {
    /// `keccak256(payload)`
    #[default]
    Keccak256,
    /// `keccak256("\x19Ethereum Signed Message:\n" || len || payload)`
    Eip191,
}

/// Which values of the trailing `v` byte are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryIdForm {
    /// `v` is 27 or 28, as `ecrecover` expects.
    #[default]
    Electrum,
    /// `v` is the bare parity bit, 0 or 1.
    Raw,
}

impl RecoveryIdForm {
    fn parity(&self, v: u8) -> Option<bool> {
        match (self, v) {
            (RecoveryIdForm::Electrum, 27) | (RecoveryIdForm::Raw, 0) => Some(false),
            (RecoveryIdForm::Electrum, 28) | (RecoveryIdForm::Raw, 1) => Some(true),
            _ => None,
        }
    }
}

/// Recovers the signer of a payload and checks it against the trusted key.
///
/// Exactly one byte encoding is accepted per signature: `v` must use the
/// configured form and `s` must be in the lower half of the curve order, so
/// no two distinct byte strings verify as the same signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignatureVerifier {
    pub digest: DigestScheme,
    pub recovery_id: RecoveryIdForm,
}

impl SignatureVerifier {
    pub fn new(digest: DigestScheme, recovery_id: RecoveryIdForm) -> Self {
        Self {
            digest,
            recovery_id,
        }
    }

    pub fn message_digest(&self, payload: &[u8]) -> B256 {
        match self.digest {
            DigestScheme::Keccak256 => keccak256(payload),
            DigestScheme::Eip191 => eip191_hash_message(payload),
        }
    }

    pub fn parse_signature(&self, signature: &[u8]) -> Result<Signature, String> {
        if signature.len() != SIGNATURE_LEN {
            return Err(format!(
                "signature must be {SIGNATURE_LEN} bytes, got {}",
                signature.len()
            ));
        }
        let r = U256::from_be_slice(&signature[..32]);
        let s = U256::from_be_slice(&signature[32..64]);
        let v = signature[64];
        if r.is_zero() || s.is_zero() {
            return Err("zero r or s".into());
        }
        if s > secp256k1n_half() {
            return Err("s is in the upper half of the curve order".into());
        }
        let parity = self
            .recovery_id
            .parity(v)
            .ok_or_else(|| format!("v={v} is not a {:?} recovery id", self.recovery_id))?;
        Ok(Signature::new(r, s, parity))
    }

    /// Recovers the Ethereum address that signed `payload`.
    pub fn recover(&self, payload: &[u8], signature: &[u8]) -> Result<Address, String> {
        if payload.is_empty() {
            return Err("empty payload".into());
        }
        let sig = self.parse_signature(signature)?;
        sig.recover_address_from_prehash(&self.message_digest(payload))
            .map_err(|err| format!("recovery failed: {err}"))
    }

    pub fn check(
        &self,
        trusted_key: &ApplicationPublicKey,
        payload: &[u8],
        signature: &[u8],
    ) -> SignatureCheck {
        let signer = match self.recover(payload, signature) {
            Ok(signer) => signer,
            Err(reason) => {
                tracing::debug!("signature rejected: {reason}");
                return SignatureCheck::Invalid;
            }
        };
        let trusted = trusted_key.address();
        if bool::from(signer.as_slice().ct_eq(trusted.as_slice())) {
            SignatureCheck::Valid
        } else {
            tracing::debug!("signature recovered {signer}, trusted key is {trusted}");
            SignatureCheck::Invalid
        }
    }
}

fn secp256k1n_half() -> U256 {
    U256::from_be_bytes(hex!(
        "7fffffffffffffffffffffffffffffff5d576e7357a4501ddfe92f46681b20a0"
    ))
}

impl fmt::Display for DigestScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DigestScheme::Keccak256 => "keccak256",
            DigestScheme::Eip191 => "eip191",
        })
    }
}

impl FromStr for DigestScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keccak256" | "keccak" => Ok(DigestScheme::Keccak256),
            "eip191" | "eip-191" => Ok(DigestScheme::Eip191),
            other => Err(format!("unknown digest scheme: {other}")),
        }
    }
}

impl fmt::Display for RecoveryIdForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecoveryIdForm::Electrum => "electrum",
            RecoveryIdForm::Raw => "raw",
        })
    }
}

impl FromStr for RecoveryIdForm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "electrum" | "27" => Ok(RecoveryIdForm::Electrum),
            "raw" | "0" => Ok(RecoveryIdForm::Raw),
            other => Err(format!("unknown recovery id form: {other}")),
        }
    }
}
