//! LNURL-auth, LUD-04 and LUD-05.

use std::{sync::Arc, time::Duration};

use platform_utils::HttpClient;
use scan_engine_common::lnurl::auth::{LnurlAuthRequestDetails, derivation_domain, submit_auth};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    balance::BalanceProjection, error::EngineError, models::LoginScheme,
    psl::PublicSuffixList, signer::KeyDerivation,
};

use super::{
    CancellableOperation, FlowActor, FlowPhase, FlowState,
    error::{AuthOtherError, LnurlAuthError},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LnurlAuthIntent {
    Login { scheme: LoginScheme },
    Cancel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LnurlAuthState {
    /// `display_domain` is the registrable domain shown to the user.
    Init { display_domain: Option<String> },
    LoggingIn,
    Succeeded,
    Failed { error: LnurlAuthError },
}

impl BalanceProjection for LnurlAuthState {
    fn project_balance(&mut self, _balance_msat: u64) {}
}

impl FlowState for LnurlAuthState {
    fn phase(&self) -> FlowPhase {
        match self {
            LnurlAuthState::Init { .. } => FlowPhase::Idle,
            LnurlAuthState::LoggingIn => FlowPhase::Submitting,
            LnurlAuthState::Succeeded => FlowPhase::Succeeded,
            LnurlAuthState::Failed { .. } => FlowPhase::Failed,
        }
    }
}

pub(crate) struct LnurlAuthFlow {
    auth_request: Arc<LnurlAuthRequestDetails>,
    display_domain: Option<String>,
    http_client: Arc<dyn HttpClient>,
    key_derivation: Arc<dyn KeyDerivation>,
    min_success_delay: Duration,
    state: LnurlAuthState,
}

impl LnurlAuthFlow {
    pub(crate) fn new(
        auth_request: LnurlAuthRequestDetails,
        public_suffix_list: Option<&dyn PublicSuffixList>,
        http_client: Arc<dyn HttpClient>,
        key_derivation: Arc<dyn KeyDerivation>,
        min_success_delay: Duration,
    ) -> Self {
        let display_domain =
            public_suffix_list.and_then(|psl| psl.registrable_domain(&auth_request.domain));
        Self {
            auth_request: Arc::new(auth_request),
            display_domain: display_domain.clone(),
            http_client,
            key_derivation,
            min_success_delay,
            state: LnurlAuthState::Init { display_domain },
        }
    }

    fn login(&mut self, scheme: LoginScheme, operation: &mut CancellableOperation<LoginResult>) {
        if self.display_domain.is_none() {
            self.fail(AuthOtherError::CouldNotDetermineDomain.into());
            return;
        }

        let auth_request = Arc::clone(&self.auth_request);
        let http_client = Arc::clone(&self.http_client);
        let key_derivation = Arc::clone(&self.key_derivation);
        let min_success_delay = self.min_success_delay;
        operation.launch(async move {
            let started = Instant::now();
            let result = login(
                http_client.as_ref(),
                key_derivation.as_ref(),
                &auth_request,
                scheme,
            )
            .await;
            // Success is reported no earlier than `min_success_delay` after
            // the attempt started.
            if result.is_ok()
                && let Some(deadline) = started.checked_add(min_success_delay)
            {
                tokio::time::sleep_until(deadline).await;
            }
            result
        });
        self.state = LnurlAuthState::LoggingIn;
    }

    fn fail(&mut self, error: LnurlAuthError) {
        warn!("Login to {} failed: {error}", self.auth_request.domain);
        self.state = LnurlAuthState::Failed { error };
    }
}

pub(crate) type LoginResult = Result<(), LnurlAuthError>;

async fn login(
    http_client: &dyn HttpClient,
    key_derivation: &dyn KeyDerivation,
    auth_request: &LnurlAuthRequestDetails,
    scheme: LoginScheme,
) -> LoginResult {
    let k1 = auth_request
        .k1_bytes()
        .ok_or(AuthOtherError::InvalidChallenge)?;
    let (domain, is_legacy_service) = derivation_domain(&auth_request.domain);
    // The legacy scheme only applies to services that saw legacy keys.
    let scheme = if is_legacy_service {
        scheme
    } else {
        LoginScheme::Default
    };
    debug!("Deriving {scheme:?} login key for {domain}");

    let key_error = |e: EngineError| AuthOtherError::KeyDerivation {
        reason: e.to_string(),
    };
    let linking_key = key_derivation
        .derive_login_key(domain, scheme)
        .await
        .map_err(key_error)?;
    let signature = key_derivation
        .sign(&linking_key, &k1)
        .await
        .map_err(key_error)?;
    submit_auth(
        http_client,
        auth_request,
        &signature,
        &linking_key.public_key(),
    )
    .await?;
    Ok(())
}

impl FlowActor for LnurlAuthFlow {
    type Intent = LnurlAuthIntent;
    type State = LnurlAuthState;
    type Output = LoginResult;

    fn state(&self) -> &LnurlAuthState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut LnurlAuthState {
        &mut self.state
    }

    fn handle_intent(
        &mut self,
        intent: LnurlAuthIntent,
        operation: &mut CancellableOperation<LoginResult>,
    ) {
        match intent {
            LnurlAuthIntent::Login { scheme } => {
                if matches!(self.state, LnurlAuthState::LoggingIn) {
                    debug!("Login already in progress");
                } else {
                    self.login(scheme, operation);
                }
            }
            LnurlAuthIntent::Cancel => {
                if matches!(self.state, LnurlAuthState::LoggingIn) {
                    operation.cancel();
                    self.state = LnurlAuthState::Init {
                        display_domain: self.display_domain.clone(),
                    };
                }
            }
        }
    }

    fn handle_completed(
        &mut self,
        output: LoginResult,
        _operation: &mut CancellableOperation<LoginResult>,
    ) {
        match output {
            Ok(()) => {
                info!("Logged in to {}", self.auth_request.domain);
                self.state = LnurlAuthState::Succeeded;
            }
            Err(error) => self.fail(error),
        }
    }
}
