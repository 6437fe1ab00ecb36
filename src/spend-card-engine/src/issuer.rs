use std::time::Duration;

use alloy_primitives::{Bytes, U256};
use spend_card_types::{AccountRef, Capability, Environment, SignedCapability, SpendingScope};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::EngineConfig,
    encoder::{delegation_digest, wire_delegation},
    error::{CardError, CardResult},
    signer::DelegationSigner,
};

/// Builds capabilities and obtains the delegator's signature over them.
///
/// Issuing persists nothing. Dropping the returned future before it resolves (or hitting the
/// signer timeout) leaves no partially-signed capability behind.
#[derive(Clone, Debug)]
pub struct DelegationIssuer {
    environment: Environment,
    signer_timeout: Duration,
}

impl DelegationIssuer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            environment: config.environment.clone(),
            signer_timeout: config.signer_timeout(),
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub async fn issue<S>(
        &self,
        signer: &S,
        delegator: AccountRef,
        delegatee: AccountRef,
        scope: SpendingScope,
    ) -> CardResult<SignedCapability>
    where
        S: DelegationSigner + ?Sized,
    {
        let salt = U256::from_be_slice(Uuid::new_v4().as_bytes());
        let capability = Capability::new(delegator, delegatee, scope, salt);
        let unsigned = wire_delegation(&capability, &self.environment, Bytes::new());
        let digest = delegation_digest(&unsigned, &self.environment);
        debug!(%delegator, %delegatee, %digest, "requesting delegation signature");

        let signature = match tokio::time::timeout(
            self.signer_timeout,
            signer.sign_delegation(&unsigned, digest),
        )
        .await
        {
            Err(_) => {
                return Err(CardError::SigningDenied {
                    reason: format!("signer did not answer within {:?}", self.signer_timeout),
                })
            }
            Ok(Err(rejection)) => {
                return Err(CardError::SigningDenied {
                    reason: rejection.reason,
                })
            }
            Ok(Ok(signature)) => signature,
        };
        if signature.len() != 65 {
            return Err(CardError::SigningDenied {
                reason: format!("signer returned a {}-byte signature", signature.len()),
            });
        }

        info!(
            %delegator,
            %delegatee,
            period_amount = %capability.scope().period_amount(),
            period_duration = capability.scope().period_duration(),
            start_date = capability.scope().start_date(),
            "delegation signed"
        );
        Ok(SignedCapability::new(capability, signature))
    }
}
