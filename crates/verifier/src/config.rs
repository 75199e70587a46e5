use std::fmt;
use std::str::FromStr;

use crate::{DigestScheme, RecoveryIdForm, SchemaVariant, SignatureVerifier};

/// What registering a signing key does when one is already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyPolicy {
    /// Every registration replaces the previous key.
    #[default]
    LastWriteWins,
    /// The first registered key is final.
    SetOnce,
}

/// Settings of a verifier instance.
///
/// `from_env` reads the same settings from `TA_*` variables, falling back to
/// the defaults when a variable is unset or cannot be parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifierConfig {
    /// Only attestations of this exported function are accepted.
    pub expected_function: Option<String>,
    /// Bundle key path; detected when `None`.
    pub schema_variant: Option<SchemaVariant>,
    pub signature: SignatureVerifier,
    pub key_policy: KeyPolicy,
}

impl VerifierConfig {
    pub fn from_env() -> Self {
        Self {
            expected_function: std::env::var("TA_EXPECTED_FUNCTION")
                .ok()
                .filter(|s| !s.is_empty()),
            schema_variant: env_parse("TA_SCHEMA_VARIANT"),
            signature: SignatureVerifier::new(
                env_parse::<DigestScheme>("TA_DIGEST_SCHEME").unwrap_or_default(),
                env_parse::<RecoveryIdForm>("TA_RECOVERY_ID").unwrap_or_default(),
            ),
            key_policy: env_parse("TA_KEY_POLICY").unwrap_or_default(),
        }
    }

    pub fn with_expected_function(mut self, function: impl Into<String>) -> Self {
        self.expected_function = Some(function.into());
        self
    }

    pub fn with_key_policy(mut self, key_policy: KeyPolicy) -> Self {
        self.key_policy = key_policy;
        self
    }
}

fn env_parse<T>(name: &str) -> Option<T>
where
    T: FromStr<Err = String>,
{
    let value = std::env::var(name).ok()?;
    match value.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::warn!("ignoring {name}={value}: {err}");
            None
        }
    }
}

impl fmt::Display for KeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeyPolicy::LastWriteWins => "last-write-wins",
            KeyPolicy::SetOnce => "set-once",
        })
    }
}

impl FromStr for KeyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "last-write-wins" | "overwrite" => Ok(KeyPolicy::LastWriteWins),
            "set-once" | "once" => Ok(KeyPolicy::SetOnce),
            other => Err(format!("unknown key policy: {other}")),
        }
    }
}
