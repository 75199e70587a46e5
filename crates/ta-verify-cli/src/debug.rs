use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Subcommand};
use transitive_attestation_verifier::{decode_bundle, FnCallClaims};

use crate::utils::VerifierArgs;

#[derive(Subcommand)]
pub enum DebugCli {
    Bundle(DebugBundleCli),
}

impl DebugCli {
    pub fn run(&self) -> anyhow::Result<()> {
        match self {
            DebugCli::Bundle(cli) => cli.run(),
        }
    }
}

/// Prints what a bundle carries without trusting any of it.
#[derive(Args)]
pub struct DebugBundleCli {
    #[clap(long)]
    bundle: PathBuf,

    #[command(flatten)]
    verifier: VerifierArgs,
}

impl DebugBundleCli {
    pub fn run(&self) -> anyhow::Result<()> {
        let json = std::fs::read(&self.bundle)
            .with_context(|| format!("reading bundle {}", self.bundle.display()))?;
        let config = self.verifier.config();
        let decoded = decode_bundle(&json, config.schema_variant)?;
        tracing::info!("Bundle ({}):", decoded.variant);
        tracing::info!("\tCurve: {}", decoded.curve_type);
        tracing::info!("\tPublicKey: {}", decoded.public_key);
        tracing::info!("\tAddress: {}", decoded.public_key.address());
        if let Some(measurement) = &decoded.measurement {
            tracing::info!("\tPlatform: {}", measurement.platform);
            tracing::info!("\tCode: {}", measurement.code);
        }

        let envelope = decoded.attestation.envelope()?;
        tracing::info!("Transitive Attestation:");
        tracing::info!("\tSignature: {}", envelope.signature);
        match config.signature.recover(&envelope.payload, &envelope.signature) {
            Ok(signer) => tracing::info!("\tRecovered Signer: {signer}"),
            Err(reason) => tracing::info!("\tRecovered Signer: none ({reason})"),
        }

        let claims = FnCallClaims::decode(&envelope.payload)?;
        tracing::info!("Claims:");
        tracing::info!("\tFunction: {}", claims.function);
        tracing::info!("\tHashOfCode: {}", claims.hash_of_code);
        tracing::info!("\tHashOfInput: {}", claims.hash_of_input);
        tracing::info!("\tHashOfSecrets: {}", claims.hash_of_secrets);
        match serde_json::from_slice::<serde_json::Value>(&claims.output) {
            Ok(output) => tracing::info!("\tOutput: {output}"),
            Err(_) => tracing::info!("\tOutput: {}", claims.output),
        }
        Ok(())
    }
}
