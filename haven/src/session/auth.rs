use alloy_primitives::Address;
use haven_msp_api::{MspApi, NonceRequest, Session, VerifyRequest};
use tracing::debug;

use crate::error::HavenError;
use crate::wallet::Wallet;

/// Origin the sign-in message is issued for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignInParams {
    pub domain: String,
    pub uri: String,
}

impl Default for SignInParams {
    fn default() -> Self {
        Self {
            domain: "localhost".to_string(),
            uri: "http://localhost".to_string(),
        }
    }
}

/// Challenge/response sign-in: fetch the message for `owner`, have the wallet sign it and trade
/// the signature for a backend session.
pub async fn sign_in(
    msp: &dyn MspApi,
    wallet: &dyn Wallet,
    owner: Address,
    chain_id: u64,
    params: &SignInParams,
) -> Result<Session, HavenError> {
    let challenge = msp
        .nonce(&NonceRequest {
            address: owner,
            chain_id,
            domain: params.domain.clone(),
            uri: params.uri.clone(),
        })
        .await?;

    let signature = wallet.sign_message(owner, &challenge.message).await?;
    let session = msp
        .verify(&VerifyRequest {
            message: challenge.message,
            signature,
        })
        .await?;

    if session.user.address != owner {
        debug!(%owner, returned = %session.user.address, "backend signed in a different address");
        return Err(HavenError::Unauthenticated);
    }
    Ok(session)
}
