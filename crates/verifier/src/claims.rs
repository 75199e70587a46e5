use std::fmt;

use alloy_primitives::{hex, Bytes};
use alloy_sol_types::SolValue;
use serde::Deserialize;
use serde_json::value::RawValue;

use crate::VerifyError;

/// Number of elements in the function call claims record.
pub const FN_CALL_CLAIMS_FIELDS: usize = 5;

/// Reason reported when an enclave marks its call as failed without saying why.
pub const UNSPECIFIED_APPLICATION_ERROR: &str = "attested function call failed without a reason";

/// Raw transitive attestation bytes as produced by the enclave.
///
/// Layout: `abi.encode(bytes[])` holding `[signed_payload, signature]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitiveAttestation(Bytes);

impl TransitiveAttestation {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Parses the `0x` hex text form used for on-chain calls.
    pub fn from_hex(text: &str) -> Result<Self, VerifyError> {
        let bytes = hex::decode(text.trim())
            .map_err(|err| VerifyError::decode("transitive_attestation", err))?;
        Ok(Self(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn envelope(&self) -> Result<SignedEnvelope, VerifyError> {
        SignedEnvelope::decode(&self.0)
    }
}

impl fmt::Display for TransitiveAttestation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SignedEnvelope> for TransitiveAttestation {
    fn from(envelope: SignedEnvelope) -> Self {
        Self(envelope.encode().into())
    }
}

/// The outer record: the signed payload and the enclave's signature over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEnvelope {
    pub payload: Bytes,
    pub signature: Bytes,
}

impl SignedEnvelope {
    pub fn encode(&self) -> Vec<u8> {
        vec![self.payload.clone(), self.signature.clone()].abi_encode()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, VerifyError> {
        let parts = Vec::<Bytes>::abi_decode(buf)
            .map_err(|err| VerifyError::decode("transitive_attestation", err))?;
        let [payload, signature]: [Bytes; 2] = parts.try_into().map_err(|parts: Vec<Bytes>| {
            VerifyError::decode(
                "transitive_attestation",
                format!("want 2 elements, got {}", parts.len()),
            )
        })?;
        Ok(Self { payload, signature })
    }
}

/// Claims the enclave makes about one executed function call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnCallClaims {
    pub hash_of_code: Bytes,
    pub function: String,
    pub hash_of_input: Bytes,
    pub hash_of_secrets: Bytes,
    /// JSON result envelope written by the function.
    pub output: Bytes,
}

impl FnCallClaims {
    pub fn encode(&self) -> Vec<u8> {
        vec![
            self.hash_of_code.clone(),
            Bytes::copy_from_slice(self.function.as_bytes()),
            self.hash_of_input.clone(),
            self.hash_of_secrets.clone(),
            self.output.clone(),
        ]
        .abi_encode()
    }

    /// Decodes the signed payload. Every failure here happens after the
    /// signature verified, so it is a shape problem rather than a decode one.
    pub fn decode(buf: &[u8]) -> Result<Self, VerifyError> {
        let parts = Vec::<Bytes>::abi_decode(buf)
            .map_err(|err| VerifyError::schema(format!("claims are not an ABI bytes[]: {err}")))?;
        let [hash_of_code, function, hash_of_input, hash_of_secrets, output]: [Bytes;
            FN_CALL_CLAIMS_FIELDS] = parts.try_into().map_err(|parts: Vec<Bytes>| {
            VerifyError::schema(format!(
                "claims want {FN_CALL_CLAIMS_FIELDS} elements, got {}",
                parts.len()
            ))
        })?;
        let function = String::from_utf8(function.to_vec())
            .map_err(|_| VerifyError::schema("function name is not UTF-8"))?;
        Ok(Self {
            hash_of_code,
            function,
            hash_of_input,
            hash_of_secrets,
            output,
        })
    }

    /// Splits the output envelope into a success value or an application error.
    pub fn call_result(&self) -> Result<CallResult, VerifyError> {
        let envelope: ResultEnvelope<'_> = serde_json::from_slice(&self.output).map_err(|err| {
            VerifyError::schema(format!("output is not a result envelope: {err}"))
        })?;

        let success = match (envelope.success, envelope.is_err) {
            (Some(success), _) => success,
            (None, Some(is_err)) => !is_err,
            (None, None) => {
                return Err(VerifyError::schema(
                    "output is not a result envelope: no success or is_err flag",
                ))
            }
        };

        if !success {
            return Ok(CallResult::Error(envelope.failure_reason()));
        }

        let value = match envelope.value {
            Some(raw) => Bytes::copy_from_slice(raw.get().as_bytes()),
            None => Bytes::from_static(b"null"),
        };
        Ok(CallResult::Value(value))
    }
}

// Producers disagree on field names. `is_err` is the inverse of `success`.
#[derive(Deserialize)]
struct ResultEnvelope<'a> {
    #[serde(default, alias = "Success")]
    success: Option<bool>,
    #[serde(default, alias = "IsErr", alias = "isErr")]
    is_err: Option<bool>,
    #[serde(default, alias = "Error")]
    error: Option<String>,
    #[serde(default, borrow, alias = "Value", alias = "output", alias = "Output")]
    value: Option<&'a RawValue>,
}

impl ResultEnvelope<'_> {
    /// Some failing functions leave `error` empty and put the reason in `value`.
    fn failure_reason(&self) -> String {
        if let Some(reason) = self.error.as_deref().filter(|r| !r.is_empty()) {
            return reason.to_string();
        }
        self.value
            .and_then(|raw| serde_json::from_str::<String>(raw.get()).ok())
            .filter(|reason| !reason.is_empty())
            .unwrap_or_else(|| UNSPECIFIED_APPLICATION_ERROR.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallResult {
    /// Raw JSON bytes of the returned value.
    Value(Bytes),
    Error(String),
}

impl CallResult {
    pub fn is_error(&self) -> bool {
        matches!(self, CallResult::Error(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCall {
    pub claims: FnCallClaims,
    pub result: CallResult,
}

/// Parses an already extracted signed payload into its claims and result.
///
/// When `expected_function` is set, an attestation for any other function is
/// refused even though its signature is genuine.
pub fn parse_fn_call(
    signed_payload: &[u8],
    expected_function: Option<&str>,
) -> Result<ParsedCall, VerifyError> {
    let claims = FnCallClaims::decode(signed_payload)?;
    if let Some(expected) = expected_function {
        if claims.function != expected {
            return Err(VerifyError::schema(format!(
                "attestation is for function `{}`, expected `{expected}`",
                claims.function
            )));
        }
    }
    let result = claims.call_result()?;
    Ok(ParsedCall { claims, result })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(function: &str, output: &str) -> FnCallClaims {
        FnCallClaims {
            hash_of_code: Bytes::from_static(&[0xba, 0xad, 0xaf]),
            function: function.to_string(),
            hash_of_input: Bytes::from_static(&[1; 32]),
            hash_of_secrets: Bytes::from_static(&[2; 32]),
            output: Bytes::copy_from_slice(output.as_bytes()),
        }
    }

    #[test]
    fn test_claims_decode() {
        let want = claims("helloWorld", r#"{"Success":true,"Error":"","Value":"Hello, World!"}"#);
        let got = FnCallClaims::decode(&want.encode()).unwrap();
        assert_eq!(got, want);
        assert_eq!(
            got.call_result().unwrap(),
            CallResult::Value(Bytes::from_static(b"\"Hello, World!\""))
        );
    }

    #[test]
    fn test_envelope_field_aliases() {
        let cases = [
            r#"{"success":true,"error":"","value":{"number":42}}"#,
            r#"{"Success":true,"Error":"","Output":{"number":42}}"#,
            r#"{"Success":true,"Value":{"number":42}}"#,
        ];
        for output in cases {
            let result = claims("f", output).call_result().unwrap();
            assert_eq!(
                result,
                CallResult::Value(Bytes::from_static(br#"{"number":42}"#)),
                "{output}"
            );
        }
    }

    #[test]
    fn test_error_envelope() {
        let output = r#"{ "Success": false, "Error": "expected error" , "Value": null }"#;
        let result = claims("errorFunc", output).call_result().unwrap();
        assert!(result.is_error());
        assert_eq!(result, CallResult::Error("expected error".into()));

        let result = claims("f", r#"{"success":false}"#).call_result().unwrap();
        assert_eq!(result, CallResult::Error(UNSPECIFIED_APPLICATION_ERROR.into()));
    }

    #[test]
    fn test_is_err_envelope() {
        let output = r#"{"IsErr":true,"Value":null,"Error":"Error executing function: boom"}"#;
        assert_eq!(
            claims("fetch", output).call_result().unwrap(),
            CallResult::Error("Error executing function: boom".into())
        );

        let output = r#"{"IsErr":false,"Value":{"price":1.5},"Error":""}"#;
        assert_eq!(
            claims("fetch", output).call_result().unwrap(),
            CallResult::Value(Bytes::from_static(br#"{"price":1.5}"#))
        );

        assert!(matches!(
            claims("fetch", r#"{"Value":1}"#).call_result(),
            Err(VerifyError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_error_reason_in_value() {
        let output = r#"{"Success":false,"Value":"upstream 500"}"#;
        assert_eq!(
            claims("esports", output).call_result().unwrap(),
            CallResult::Error("upstream 500".into())
        );

        let output = r#"{"Success":false,"Error":"bad input","Value":"ignored"}"#;
        assert_eq!(
            claims("esports", output).call_result().unwrap(),
            CallResult::Error("bad input".into())
        );

        let output = r#"{"Success":false,"Value":{"code":500}}"#;
        assert_eq!(
            claims("esports", output).call_result().unwrap(),
            CallResult::Error(UNSPECIFIED_APPLICATION_ERROR.into())
        );
    }

    #[test]
    fn test_null_value_is_kept() {
        let result = claims("f", r#"{"success":true,"value":null}"#)
            .call_result()
            .unwrap();
        assert_eq!(result, CallResult::Value(Bytes::from_static(b"null")));
    }

    #[test]
    fn test_shape_mismatches() {
        let not_envelope = claims("f", "Hello, World!");
        assert!(matches!(
            parse_fn_call(&not_envelope.encode(), None),
            Err(VerifyError::SchemaMismatch(_))
        ));

        let four = vec![Bytes::new(); 4].abi_encode();
        assert!(matches!(
            FnCallClaims::decode(&four),
            Err(VerifyError::SchemaMismatch(_))
        ));

        assert!(matches!(
            FnCallClaims::decode(b"garbage"),
            Err(VerifyError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_function_mismatch() {
        let encoded = claims("helloWorld", r#"{"success":true,"value":1}"#).encode();
        assert!(parse_fn_call(&encoded, Some("helloWorld")).is_ok());
        assert!(parse_fn_call(&encoded, None).is_ok());
        let err = parse_fn_call(&encoded, Some("twap")).unwrap_err();
        assert!(matches!(err, VerifyError::SchemaMismatch(_)));
        assert!(err.to_string().contains("helloWorld"));
    }

    #[test]
    fn test_envelope_decode() {
        let envelope = SignedEnvelope {
            payload: Bytes::from_static(b"payload"),
            signature: Bytes::from(vec![9u8; 65]),
        };
        let ta = TransitiveAttestation::from(envelope.clone());
        assert_eq!(ta.envelope().unwrap(), envelope);

        let parsed = TransitiveAttestation::from_hex(&ta.to_string()).unwrap();
        assert_eq!(parsed, ta);

        let three = TransitiveAttestation::new(vec![Bytes::new(); 3].abi_encode());
        assert!(matches!(
            three.envelope(),
            Err(VerifyError::Decode { field: "transitive_attestation", .. })
        ));
        assert!(TransitiveAttestation::new(vec![1, 2, 3]).envelope().is_err());
    }

    #[test]
    fn test_envelope_offsets_are_record_relative() {
        // The payload is itself an ABI record; its internal offsets must be
        // resolved against the payload, not against the outer envelope.
        let inner = claims("helloWorld", r#"{"success":true,"value":"x"}"#);
        let envelope = SignedEnvelope {
            payload: inner.encode().into(),
            signature: Bytes::from(vec![1u8; 65]),
        };
        let ta = TransitiveAttestation::from(envelope);
        let payload = ta.envelope().unwrap().payload;
        assert_eq!(FnCallClaims::decode(&payload).unwrap(), inner);
    }
}
