use clap::Args;
use transitive_attestation_verifier::{
    DigestScheme, KeyPolicy, RecoveryIdForm, SchemaVariant, SignatureVerifier, VerifierConfig,
};

#[derive(Args, Clone)]
pub struct VerifierArgs {
    /// Only accept attestations of this exported function
    #[arg(long, env = "TA_EXPECTED_FUNCTION")]
    pub expected_function: Option<String>,

    /// Bundle layout: claims-nested or flat (detected when unset)
    #[arg(long, env = "TA_SCHEMA_VARIANT")]
    pub schema_variant: Option<SchemaVariant>,

    /// Digest the enclave signs: keccak256 or eip191
    #[arg(long, env = "TA_DIGEST_SCHEME", default_value = "keccak256")]
    pub digest: DigestScheme,

    /// Signature v encoding: electrum (27/28) or raw (0/1)
    #[arg(long, env = "TA_RECOVERY_ID", default_value = "electrum")]
    pub recovery_id: RecoveryIdForm,

    #[arg(long, env = "TA_KEY_POLICY", default_value = "last-write-wins")]
    pub key_policy: KeyPolicy,
}

impl VerifierArgs {
    pub fn config(&self) -> VerifierConfig {
        VerifierConfig {
            expected_function: self.expected_function.clone(),
            schema_variant: self.schema_variant,
            signature: SignatureVerifier::new(self.digest, self.recovery_id),
            key_policy: self.key_policy,
        }
    }
}
