use std::fmt;

use alloy_primitives::Bytes;

use crate::{
    interpret, parse_fn_call, ApplicationPublicKey, CallResult, EnclaveAttestationBundle,
    FnCallClaims, InterpretedResult, KeyPolicy, ResultEncoding, TransitiveAttestation,
    VerifierConfig, VerifyError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierState {
    /// No signing key registered yet.
    Uninitialized,
    Configured,
}

/// The one piece of state that survives between calls: the trusted key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedKeySlot {
    key: Option<ApplicationPublicKey>,
}

impl TrustedKeySlot {
    pub fn get(&self) -> Option<&ApplicationPublicKey> {
        self.key.as_ref()
    }

    fn admits(&self, key: &ApplicationPublicKey, policy: KeyPolicy) -> Result<(), VerifyError> {
        match (&self.key, policy) {
            (Some(current), KeyPolicy::SetOnce) if current != key => {
                Err(VerifyError::KeyAlreadyRegistered)
            }
            _ => Ok(()),
        }
    }

    fn store(&mut self, key: ApplicationPublicKey, policy: KeyPolicy) -> Result<(), VerifyError> {
        self.admits(&key, policy)?;
        self.key = Some(key);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    SignatureInvalid,
    /// The enclave's own function call failed; the reason is passed on verbatim.
    ApplicationError(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::SignatureInvalid => write!(f, "{}", VerifyError::SignatureInvalid),
            Rejection::ApplicationError(reason) => f.write_str(reason),
        }
    }
}

impl From<Rejection> for VerifyError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::SignatureInvalid => VerifyError::SignatureInvalid,
            Rejection::ApplicationError(reason) => VerifyError::ApplicationError(reason),
        }
    }
}

/// A function call whose claims were signed by the trusted key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedFunctionCall {
    pub claims: FnCallClaims,
    /// Raw JSON bytes of the value the function returned.
    pub result: Bytes,
}

impl AttestedFunctionCall {
    pub fn interpret(&self, encoding: ResultEncoding) -> Result<InterpretedResult, VerifyError> {
        interpret(&self.result, encoding)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Succeeded(AttestedFunctionCall),
    Rejected(Rejection),
}

impl VerificationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, VerificationOutcome::Succeeded(_))
    }

    /// Treats a rejection as an error, the way a reverting contract call would.
    pub fn into_result(self) -> Result<AttestedFunctionCall, VerifyError> {
        match self {
            VerificationOutcome::Succeeded(call) => Ok(call),
            VerificationOutcome::Rejected(rejection) => Err(rejection.into()),
        }
    }
}

/// Verifies transitive attestations against a registered application key.
///
/// Each instance owns its own trust slot, so independent verifiers never
/// share a key. Registration needs `&mut self`; verification only reads.
#[derive(Debug, Clone, Default)]
pub struct TransitiveAttestationVerifier {
    config: VerifierConfig,
    slot: TrustedKeySlot,
}

impl TransitiveAttestationVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            config,
            slot: TrustedKeySlot::default(),
        }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn state(&self) -> VerifierState {
        match self.slot.get() {
            Some(_) => VerifierState::Configured,
            None => VerifierState::Uninitialized,
        }
    }

    pub fn signing_key(&self) -> Option<&ApplicationPublicKey> {
        self.slot.get()
    }

    /// Trusts `key` for every following verification.
    ///
    /// Re-registering the current key is always accepted. A different key
    /// replaces it under `KeyPolicy::LastWriteWins` and is refused under
    /// `KeyPolicy::SetOnce`.
    pub fn register_signing_key(&mut self, key: ApplicationPublicKey) -> Result<(), VerifyError> {
        let address = key.address();
        self.slot.store(key, self.config.key_policy)?;
        tracing::info!("registered signing key {address}");
        Ok(())
    }

    /// Checks the attestation's signature against the registered key and,
    /// only if it holds, extracts the attested function call result.
    pub fn verify(
        &self,
        attestation: &TransitiveAttestation,
    ) -> Result<VerificationOutcome, VerifyError> {
        let key = self.slot.get().ok_or(VerifyError::NotConfigured)?;
        self.verify_with(key, attestation)
    }

    /// Registers `key` and verifies `attestation` against it in one call.
    ///
    /// The key is committed only once verification reached an outcome; on
    /// any error the registered key is left as it was.
    pub fn register_and_verify(
        &mut self,
        key: ApplicationPublicKey,
        attestation: &TransitiveAttestation,
    ) -> Result<VerificationOutcome, VerifyError> {
        self.slot.admits(&key, self.config.key_policy)?;
        let outcome = self.verify_with(&key, attestation)?;
        self.register_signing_key(key)?;
        Ok(outcome)
    }

    /// Verifies a bundle against the key it carries.
    ///
    /// The embedded key is used for this call only and never becomes the
    /// registered signing key.
    pub fn verify_bundle(
        &self,
        bundle: &EnclaveAttestationBundle,
    ) -> Result<VerificationOutcome, VerifyError> {
        let (key, attestation) = bundle.decode(self.config.schema_variant)?.into_parts();
        self.verify_with(&key, &attestation)
    }

    fn verify_with(
        &self,
        key: &ApplicationPublicKey,
        attestation: &TransitiveAttestation,
    ) -> Result<VerificationOutcome, VerifyError> {
        let envelope = attestation.envelope()?;

        let check = self
            .config
            .signature
            .check(key, &envelope.payload, &envelope.signature);
        if !check.is_valid() {
            tracing::warn!(
                "rejected transitive attestation: signature does not match {}",
                key.address()
            );
            return Ok(VerificationOutcome::Rejected(Rejection::SignatureInvalid));
        }

        let parsed = parse_fn_call(&envelope.payload, self.config.expected_function.as_deref())?;
        match parsed.result {
            CallResult::Error(reason) => {
                tracing::info!(
                    "attested call `{}` reported an error: {reason}",
                    parsed.claims.function
                );
                Ok(VerificationOutcome::Rejected(Rejection::ApplicationError(reason)))
            }
            CallResult::Value(result) => {
                tracing::debug!(
                    "verified attested call `{}`, {} result bytes",
                    parsed.claims.function,
                    result.len()
                );
                Ok(VerificationOutcome::Succeeded(AttestedFunctionCall {
                    claims: parsed.claims,
                    result,
                }))
            }
        }
    }
}
