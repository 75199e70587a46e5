#![allow(dead_code)]

use alloy_primitives::Bytes;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use base64::{prelude::BASE64_STANDARD, Engine};
use serde_json::{json, Value};
use transitive_attestation_verifier::{
    ApplicationPublicKey, FnCallClaims, RecoveryIdForm, SchemaVariant, SignatureVerifier,
    SignedEnvelope, TransitiveAttestation,
};

// Well known development keys, never used for anything real.
pub const ENCLAVE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const ROTATED_ENCLAVE_KEY: &str =
    "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

/// Plays the enclave side: signs function call claims and renders bundles.
pub struct Enclave {
    signer: PrivateKeySigner,
    scheme: SignatureVerifier,
}

impl Enclave {
    pub fn new(private_key: &str) -> Self {
        Self::with_scheme(private_key, SignatureVerifier::default())
    }

    pub fn with_scheme(private_key: &str, scheme: SignatureVerifier) -> Self {
        Self {
            signer: private_key.parse().unwrap(),
            scheme,
        }
    }

    /// Uncompressed SEC1 point, the form enclaves publish.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.signer
            .credential()
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    pub fn public_key(&self) -> ApplicationPublicKey {
        ApplicationPublicKey::from_bytes(&self.public_key_bytes()).unwrap()
    }

    pub fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let sig = self
            .signer
            .sign_hash_sync(&self.scheme.message_digest(payload))
            .unwrap();
        let v = match self.scheme.recovery_id {
            RecoveryIdForm::Electrum => 27 + sig.v() as u8,
            RecoveryIdForm::Raw => sig.v() as u8,
        };
        let mut out = Vec::with_capacity(65);
        out.extend_from_slice(&sig.r().to_be_bytes::<32>());
        out.extend_from_slice(&sig.s().to_be_bytes::<32>());
        out.push(v);
        out
    }

    pub fn claims(&self, function: &str, output: &str) -> FnCallClaims {
        FnCallClaims {
            hash_of_code: Bytes::from(vec![0xba; 64]),
            function: function.to_string(),
            hash_of_input: Bytes::from(vec![0x11; 64]),
            hash_of_secrets: Bytes::from(vec![0x22; 64]),
            output: Bytes::copy_from_slice(output.as_bytes()),
        }
    }

    pub fn attest(&self, function: &str, output: &str) -> TransitiveAttestation {
        let payload = self.claims(function, output).encode();
        let signature = self.sign(&payload);
        TransitiveAttestation::from(SignedEnvelope {
            payload: payload.into(),
            signature: signature.into(),
        })
    }

    pub fn bundle(&self, variant: SchemaVariant, attestation: &TransitiveAttestation) -> Vec<u8> {
        let public_key = json!({
            "curve_type": "p256k1",
            "data": BASE64_STANDARD.encode(self.public_key_bytes()),
        });
        let key_claim = match variant {
            SchemaVariant::ClaimsNested => json!({
                "claims": {
                    "enclave_measurement": { "platform": "nitro", "code": "plain" },
                    "public_key": public_key,
                }
            }),
            SchemaVariant::Flat => json!({ "public_key": public_key }),
        };
        serde_json::to_vec_pretty(&json!({
            "enclave_attested_application_public_key": key_claim,
            "transitive_attested_function_call": {
                "transitive_attestation": BASE64_STANDARD.encode(attestation.as_bytes()),
            },
        }))
        .unwrap()
    }
}

pub fn output_ok(value: Value) -> String {
    json!({ "Success": true, "Error": "", "Value": value }).to_string()
}

pub fn output_err(reason: &str) -> String {
    json!({ "Success": false, "Error": reason, "Value": null }).to_string()
}
