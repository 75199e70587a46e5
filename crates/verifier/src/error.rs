use thiserror::Error;

use crate::ResultEncoding;

/// Every way a transitive attestation can fail to produce a trusted result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// The input artifact is malformed: a required JSON path is missing or a
    /// base64/hex/ABI payload does not decode.
    #[error("failed to decode {field}: {cause}")]
    Decode { field: &'static str, cause: String },

    #[error("no signing key registered, register the enclave attested application key first")]
    NotConfigured,

    #[error("a signing key is already registered and the key policy is set-once")]
    KeyAlreadyRegistered,

    #[error("invalid application public key: {0}")]
    InvalidKey(String),

    #[error("transitive attestation signature does not match the registered signing key")]
    SignatureInvalid,

    /// Well signed, but not the function call or shape this verifier accepts.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The enclave reported that the attested function call itself failed.
    #[error("{0}")]
    ApplicationError(String),

    #[error("failed to interpret result as {encoding}: {cause}")]
    Interpretation {
        encoding: ResultEncoding,
        cause: String,
    },
}

impl VerifyError {
    pub(crate) fn decode(field: &'static str, cause: impl ToString) -> Self {
        VerifyError::Decode {
            field,
            cause: cause.to_string(),
        }
    }

    pub(crate) fn schema(cause: impl Into<String>) -> Self {
        VerifyError::SchemaMismatch(cause.into())
    }
}
