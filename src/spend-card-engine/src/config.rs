//! Engine configuration.

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use spend_card_types::Environment;

use crate::error::CardError;

fn default_signer_timeout_secs() -> u64 {
    120
}

fn default_ledger_timeout_secs() -> u64 {
    60
}

/// Environment binding plus the timeouts applied at the two suspension points.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub environment: Environment,
    /// Upper bound on a signer call; expiry counts as a denial.
    #[serde(default = "default_signer_timeout_secs")]
    pub signer_timeout_secs: u64,
    /// Upper bound on a ledger submission; expiry counts as a failure, never as success.
    #[serde(default = "default_ledger_timeout_secs")]
    pub ledger_timeout_secs: u64,
}

impl EngineConfig {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            signer_timeout_secs: default_signer_timeout_secs(),
            ledger_timeout_secs: default_ledger_timeout_secs(),
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, CardError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| CardError::Config(format!("failed reading {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| CardError::Config(format!("failed parsing {}: {e}", path.display())))
    }

    pub fn signer_timeout(&self) -> Duration {
        Duration::from_secs(self.signer_timeout_secs)
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_secs(self.ledger_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_default_when_absent() {
        let config: EngineConfig = serde_json::from_str(
            r#"{
                "environment": {
                    "chain_id": 11155111,
                    "delegation_manager": "0xd0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0d0",
                    "native_token_period_transfer_enforcer": "0xe1e1e1e1e1e1e1e1e1e1e1e1e1e1e1e1e1e1e1e1",
                    "allowed_targets_enforcer": "0xe2e2e2e2e2e2e2e2e2e2e2e2e2e2e2e2e2e2e2e2"
                },
                "ledger_timeout_secs": 5
            }"#,
        )
        .unwrap();
        assert_eq!(config.environment.chain_id, 11_155_111);
        assert_eq!(config.signer_timeout(), Duration::from_secs(120));
        assert_eq!(config.ledger_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn unreadable_or_malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = EngineConfig::from_json_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(missing, CardError::Config(_)));

        let malformed = dir.path().join("engine.json");
        fs::write(&malformed, "{ \"environment\": 7 }").unwrap();
        let err = EngineConfig::from_json_file(&malformed).unwrap_err();
        assert!(matches!(err, CardError::Config(ref reason) if reason.contains("engine.json")));
    }
}
