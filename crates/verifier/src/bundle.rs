use std::fmt;
use std::str::FromStr;

use alloy_primitives::hex;
use base64::{prelude::BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ApplicationPublicKey, TransitiveAttestation, VerifyError};

const CURVE_TYPES: [&str; 2] = ["p256k1", "secp256k1"];

// Address, compressed, raw and uncompressed keys.
const HEX_KEY_LENGTHS: [usize; 4] = [40, 66, 128, 130];

// Current producers first, then the older `function_calls` list.
const ATTESTATION_PATHS: [&str; 2] = [
    "/transitive_attested_function_call/transitive_attestation",
    "/function_calls/0/transitive_attestation",
];

/// Where a bundle keeps its application public key claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVariant {
    /// `enclave_attested_application_public_key.claims.public_key.data`
    ClaimsNested,
    /// `enclave_attested_application_public_key.public_key.data`
    Flat,
}

impl SchemaVariant {
    /// Detection order when no variant is configured.
    pub const ALL: [SchemaVariant; 2] = [SchemaVariant::ClaimsNested, SchemaVariant::Flat];

    fn key_claims_path(&self) -> &'static str {
        match self {
            SchemaVariant::ClaimsNested => "/enclave_attested_application_public_key/claims",
            SchemaVariant::Flat => "/enclave_attested_application_public_key",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnclaveMeasurement {
    pub platform: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyInfo {
    #[serde(default)]
    pub curve_type: String,
    /// Base64 encoded key.
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyClaims {
    #[serde(default)]
    pub enclave_measurement: Option<EnclaveMeasurement>,
    pub public_key: PublicKeyInfo,
}

/// The raw JSON artifact an enclave hands out after attesting a function call.
#[derive(Debug, Clone, PartialEq)]
pub struct EnclaveAttestationBundle(Value);

impl EnclaveAttestationBundle {
    pub fn from_json(json: &[u8]) -> Result<Self, VerifyError> {
        let doc = serde_json::from_slice(json).map_err(|err| VerifyError::decode("bundle", err))?;
        Ok(Self(doc))
    }

    pub fn from_value(doc: Value) -> Self {
        Self(doc)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Extracts the application key and the transitive attestation.
    ///
    /// With `variant` set only that key path is accepted; otherwise every
    /// known variant is tried and the first one present wins.
    pub fn decode(&self, variant: Option<SchemaVariant>) -> Result<DecodedBundle, VerifyError> {
        let (variant, claims) = self.key_claims(variant)?;

        if !claims.public_key.curve_type.is_empty()
            && !CURVE_TYPES.contains(&claims.public_key.curve_type.as_str())
        {
            return Err(VerifyError::decode(
                "public_key.curve_type",
                format!("unsupported curve {}", claims.public_key.curve_type),
            ));
        }
        let key_bytes = decode_key_data(&claims.public_key.data)?;
        let public_key = ApplicationPublicKey::from_bytes(&key_bytes)?;

        let attestation = self.attestation()?;

        tracing::debug!(
            "decoded {variant} bundle: key {}, attestation {} bytes",
            public_key.address(),
            attestation.as_bytes().len()
        );

        Ok(DecodedBundle {
            variant,
            public_key,
            curve_type: claims.public_key.curve_type,
            measurement: claims.enclave_measurement,
            attestation,
        })
    }

    fn key_claims(
        &self,
        variant: Option<SchemaVariant>,
    ) -> Result<(SchemaVariant, KeyClaims), VerifyError> {
        let candidates = match variant {
            Some(variant) => vec![variant],
            None => SchemaVariant::ALL.to_vec(),
        };
        for candidate in &candidates {
            let Some(node) = self.0.pointer(candidate.key_claims_path()) else {
                continue;
            };
            if node.get("public_key").is_none() {
                continue;
            }
            let claims: KeyClaims = serde_json::from_value(node.clone())
                .map_err(|err| VerifyError::decode("public_key", err))?;
            return Ok((*candidate, claims));
        }
        Err(VerifyError::decode(
            "public_key",
            format!(
                "no public key claim for schema variant(s) {}",
                candidates
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ))
    }

    fn attestation(&self) -> Result<TransitiveAttestation, VerifyError> {
        let encoded = ATTESTATION_PATHS
            .iter()
            .find_map(|path| self.0.pointer(path))
            .ok_or_else(|| {
                VerifyError::decode("transitive_attestation", "missing from bundle")
            })?
            .as_str()
            .ok_or_else(|| VerifyError::decode("transitive_attestation", "not a string"))?;
        let bytes = BASE64_STANDARD
            .decode(encoded.trim())
            .map_err(|err| VerifyError::decode("transitive_attestation", err))?;
        Ok(TransitiveAttestation::new(unwrap_hex_text(bytes)?))
    }
}

/// Older flat bundles carry the key as bare hex text instead of base64.
/// Hex lengths of the accepted key sizes never match a base64 length of them.
fn decode_key_data(data: &str) -> Result<Vec<u8>, VerifyError> {
    let data = data.trim();
    let digits = data.strip_prefix("0x").unwrap_or(data);
    if HEX_KEY_LENGTHS.contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return hex::decode(digits).map_err(|err| VerifyError::decode("public_key.data", err));
    }
    BASE64_STANDARD
        .decode(data)
        .map_err(|err| VerifyError::decode("public_key.data", err))
}

/// Some producers base64 the `0x` hex text of the attestation instead of
/// the attestation itself. ABI records never start with the bytes `0x`.
fn unwrap_hex_text(bytes: Vec<u8>) -> Result<Vec<u8>, VerifyError> {
    match bytes.strip_prefix(b"0x") {
        Some(digits) if digits.iter().all(u8::is_ascii_hexdigit) => {
            hex::decode(digits).map_err(|err| VerifyError::decode("transitive_attestation", err))
        }
        _ => Ok(bytes),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBundle {
    pub variant: SchemaVariant,
    pub public_key: ApplicationPublicKey,
    pub curve_type: String,
    /// Reported by the enclave; not verified here.
    pub measurement: Option<EnclaveMeasurement>,
    pub attestation: TransitiveAttestation,
}

impl DecodedBundle {
    pub fn into_parts(self) -> (ApplicationPublicKey, TransitiveAttestation) {
        (self.public_key, self.attestation)
    }
}

pub fn decode_bundle(
    json: &[u8],
    variant: Option<SchemaVariant>,
) -> Result<DecodedBundle, VerifyError> {
    EnclaveAttestationBundle::from_json(json)?.decode(variant)
}

impl fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SchemaVariant::ClaimsNested => "claims-nested",
            SchemaVariant::Flat => "flat",
        })
    }
}

impl FromStr for SchemaVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "claims-nested" | "claims_nested" | "nested" => Ok(SchemaVariant::ClaimsNested),
            "flat" => Ok(SchemaVariant::Flat),
            other => Err(format!("unknown schema variant: {other}")),
        }
    }
}
