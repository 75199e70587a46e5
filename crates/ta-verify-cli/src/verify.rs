use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Args;
use transitive_attestation_verifier::{
    ApplicationPublicKey, EnclaveAttestationBundle, ResultEncoding, TransitiveAttestation,
    TransitiveAttestationVerifier, VerificationOutcome,
};

use crate::utils::VerifierArgs;

#[derive(Args)]
pub struct VerifyCli {
    /// Enclave attestation bundle (JSON)
    #[arg(long)]
    bundle: Option<PathBuf>,

    /// Application public key in hex, overrides the bundle's key
    #[arg(long)]
    key: Option<ApplicationPublicKey>,

    /// Transitive attestation in hex, overrides the bundle's attestation
    #[arg(long)]
    ta: Option<String>,

    #[arg(long, default_value = "text")]
    encoding: ResultEncoding,

    #[command(flatten)]
    verifier: VerifierArgs,
}

impl VerifyCli {
    pub fn run(&self) -> anyhow::Result<()> {
        let config = self.verifier.config();
        let from_bundle = match &self.bundle {
            Some(path) => {
                let bundle = EnclaveAttestationBundle::from_json(
                    &std::fs::read(path)
                        .with_context(|| format!("reading bundle {}", path.display()))?,
                )?;
                Some(bundle.decode(config.schema_variant)?.into_parts())
            }
            None => None,
        };

        let key = match (&self.key, &from_bundle) {
            (Some(key), _) => key.clone(),
            (None, Some((key, _))) => key.clone(),
            (None, None) => return Err(anyhow!("either --bundle or --key is required")),
        };
        let attestation = match (&self.ta, &from_bundle) {
            (Some(ta), _) => TransitiveAttestation::from_hex(ta)?,
            (None, Some((_, ta))) => ta.clone(),
            (None, None) => return Err(anyhow!("either --bundle or --ta is required")),
        };

        let mut verifier = TransitiveAttestationVerifier::new(config);
        match verifier.register_and_verify(key, &attestation)? {
            VerificationOutcome::Succeeded(call) => {
                let result = call.interpret(self.encoding)?;
                tracing::info!("Function: {}", call.claims.function);
                if let Some(key) = verifier.signing_key() {
                    tracing::info!("Signer: {}", key.address());
                }
                println!("{result}");
                Ok(())
            }
            VerificationOutcome::Rejected(rejection) => Err(anyhow!("rejected: {rejection}")),
        }
    }
}
