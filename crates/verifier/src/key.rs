use std::fmt;
use std::str::FromStr;

use alloy_primitives::{hex, Address, Bytes};
use k256::ecdsa::VerifyingKey;

use crate::VerifyError;

/// The application key an enclave attested and now signs function calls with.
///
/// Accepted forms are an uncompressed (65 byte) or compressed (33 byte) SEC1
/// secp256k1 point, a raw 64 byte `X || Y` point, or the 20 byte Ethereum
/// address derived from one. Every form is normalised to that address, which
/// is what signature recovery produces and what equality compares.
#[derive(Clone, Debug)]
pub struct ApplicationPublicKey {
    raw: Bytes,
    address: Address,
}

impl ApplicationPublicKey {
    pub fn from_bytes(raw: &[u8]) -> Result<Self, VerifyError> {
        let address = match raw.len() {
            0 => return Err(VerifyError::InvalidKey("empty key".into())),
            20 => Address::from_slice(raw),
            33 | 65 => Address::from_public_key(&sec1_point(raw)?),
            64 => {
                let mut sec1 = Vec::with_capacity(65);
                sec1.push(0x04);
                sec1.extend_from_slice(raw);
                Address::from_public_key(&sec1_point(&sec1)?)
            }
            len => {
                return Err(VerifyError::InvalidKey(format!(
                    "unsupported key length {len}, want 20, 33, 64 or 65 bytes"
                )))
            }
        };
        Ok(Self {
            raw: Bytes::copy_from_slice(raw),
            address,
        })
    }

    /// Parses the hex text form, with or without the `0x` prefix.
    pub fn from_hex(text: &str) -> Result<Self, VerifyError> {
        let raw = hex::decode(text.trim())
            .map_err(|err| VerifyError::InvalidKey(format!("bad hex: {err}")))?;
        Self::from_bytes(&raw)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

fn sec1_point(bytes: &[u8]) -> Result<VerifyingKey, VerifyError> {
    VerifyingKey::from_sec1_bytes(bytes)
        .map_err(|_| VerifyError::InvalidKey("not a secp256k1 point".into()))
}

impl PartialEq for ApplicationPublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for ApplicationPublicKey {}

impl fmt::Display for ApplicationPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for ApplicationPublicKey {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}
