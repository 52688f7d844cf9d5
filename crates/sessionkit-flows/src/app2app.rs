//! Inbound app2app sign-in requests.
//!
//! Another app on the device asks to sign in as our current user. The
//! request arrives as a deep link, possibly before our client finished
//! configuring, and ends with the user approving or rejecting it.
//!
//! ```text
//!   submit(uri)
//!     │ not configured yet ──→ [pending] ──(configured + state known)──→ take_ready()
//!     ▼                                                                     │
//!   begin(uri) ◀────────────────────────────────────────────────────────────┘
//!     │ checks: platform capable, no open confirmation, Authenticated, parses
//!     ▼
//!   prepare_confirmation(client, request)     fetch user info (spawned)
//!     ▼
//!   present(confirmation)              [confirmation]  ← shown to the user
//!     ├── take_for_approval()  ──→ approve_request(client, request)  (spawned)
//!     └── take_for_rejection() ──→ reject_request(client, request)   (spawned)
//! ```
//!
//! The controller owns two slots, the pending URI and the open
//! confirmation, and lives on the orchestrator's actor task.

use std::sync::Arc;

use sessionkit_client::{AuthClient, ClientError, Platform};
use sessionkit_types::{App2AppRequest, SessionState, UserInfo};
use tracing::{debug, info};
use url::Url;

use crate::FlowError;

/// A request that arrived before the client finished configuring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingApp2AppRequest {
    pub request_uri: String,
    /// The request's `state`, read from the URI when it was parked.
    pub state: Option<String>,
}

impl PendingApp2AppRequest {
    fn new(request_uri: String) -> Self {
        let state = Url::parse(&request_uri).ok().and_then(|url| {
            url.query_pairs()
                .find(|(key, value)| key == "state" && !value.is_empty())
                .map(|(_, value)| value.into_owned())
        });
        Self { request_uri, state }
    }
}

/// A parsed request waiting for the user's decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct App2AppConfirmation {
    /// Human-readable prompt naming the identity and the request state.
    pub message: String,
    pub request: App2AppRequest,
}

impl App2AppConfirmation {
    pub fn new(user: &UserInfo, request: App2AppRequest) -> Self {
        let mut message = String::from("Approve app2app authentication");
        if let Some(handle) = user.display_handle() {
            message.push_str(&format!(" as {handle}"));
        }
        if let Some(state) = &request.state {
            message.push_str(&format!(" (state: {state})"));
        }
        message.push('?');
        Self { message, request }
    }
}

/// What [`App2AppHandoffController::submit`] decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Stored until the client is configured.
    Deferred,
    /// Ready to process now.
    Process(String),
}

#[derive(Debug)]
pub struct App2AppHandoffController<P> {
    platform: Arc<P>,
    reject_reason: String,
    pending: Option<PendingApp2AppRequest>,
    confirmation: Option<App2AppConfirmation>,
}

impl<P: Platform> App2AppHandoffController<P> {
    /// `reject_reason` is sent back to the requesting app when the user
    /// declines.
    pub fn new(platform: Arc<P>, reject_reason: impl Into<String>) -> Self {
        Self {
            platform,
            reject_reason: reject_reason.into(),
            pending: None,
            confirmation: None,
        }
    }

    // -- Bookkeeping (actor task) -------------------------------------------

    /// Accepts an inbound URI. Before the client is configured the URI is
    /// parked; a later URI replaces an earlier parked one.
    pub fn submit(&mut self, uri: impl Into<String>, configured: bool) -> Submission {
        let uri = uri.into();
        if configured {
            return Submission::Process(uri);
        }
        if self.pending.is_some() {
            debug!("replacing parked app2app request");
        }
        let pending = PendingApp2AppRequest::new(uri);
        info!(state = ?pending.state, "app2app request parked until configure completes");
        self.pending = Some(pending);
        Submission::Deferred
    }

    /// Hands out the parked request once the client is configured and the
    /// session state is known. Returns it at most once.
    pub fn take_ready(
        &mut self,
        configured: bool,
        state: SessionState,
    ) -> Option<PendingApp2AppRequest> {
        if configured && state.is_known() {
            self.pending.take()
        } else {
            None
        }
    }

    pub fn pending(&self) -> Option<&PendingApp2AppRequest> {
        self.pending.as_ref()
    }

    /// Synchronous checks before any network call.
    ///
    /// # Errors
    /// The [`FlowError`] precondition that failed, in check order:
    /// platform capability, an already open confirmation, session state,
    /// then parsing.
    pub fn begin<C: AuthClient>(
        &self,
        uri: &str,
        state: SessionState,
        client: &C,
    ) -> Result<App2AppRequest, FlowError> {
        if !self.platform.app2app_capable() {
            return Err(FlowError::App2AppUnsupported);
        }
        if self.confirmation.is_some() {
            return Err(FlowError::ConfirmationPending);
        }
        if !state.is_authenticated() {
            return Err(FlowError::NotAuthenticated);
        }
        client
            .parse_app2app_request(uri)
            .ok_or(FlowError::UnexpectedApp2AppUri)
    }

    /// Opens the confirmation if the session is still Authenticated and
    /// no other confirmation got there first.
    ///
    /// # Errors
    /// [`FlowError::NotAuthenticated`] or [`FlowError::ConfirmationPending`];
    /// the confirmation is dropped.
    pub fn present(
        &mut self,
        confirmation: App2AppConfirmation,
        state: SessionState,
    ) -> Result<(), FlowError> {
        if !state.is_authenticated() {
            debug!("session left Authenticated before confirmation; dropping");
            return Err(FlowError::NotAuthenticated);
        }
        if self.confirmation.is_some() {
            debug!("confirmation already open; dropping");
            return Err(FlowError::ConfirmationPending);
        }
        info!(client_id = %confirmation.request.client_id, "app2app confirmation opened");
        self.confirmation = Some(confirmation);
        Ok(())
    }

    pub fn confirmation(&self) -> Option<&App2AppConfirmation> {
        self.confirmation.as_ref()
    }

    /// Closes the confirmation for approval.
    pub fn take_for_approval(&mut self) -> Option<App2AppRequest> {
        self.confirmation.take().map(|c| c.request)
    }

    /// Closes the confirmation for rejection, with the reason to send.
    pub fn take_for_rejection(&mut self) -> Option<(App2AppRequest, ClientError)> {
        let request = self.confirmation.take()?.request;
        Some((request, ClientError::Other(self.reject_reason.clone())))
    }

    /// Drops the confirmation when the session leaves Authenticated.
    /// Returns whether one was open.
    pub fn on_state(&mut self, state: SessionState) -> bool {
        if !state.is_authenticated() && self.confirmation.take().is_some() {
            info!(%state, "app2app confirmation dropped: no longer authenticated");
            return true;
        }
        false
    }

    /// Forgets any open confirmation (on reconfigure). The parked request
    /// survives, since it is waiting for exactly that configure.
    pub fn reset(&mut self) {
        self.confirmation = None;
    }
}

// ---------------------------------------------------------------------------
// Network work (spawned by the orchestrator)
// ---------------------------------------------------------------------------

/// Fetches the current identity and builds the confirmation for it.
pub async fn prepare_confirmation<C: AuthClient>(
    client: Arc<C>,
    request: App2AppRequest,
) -> Result<App2AppConfirmation, ClientError> {
    let user = client.fetch_user_info().await?;
    Ok(App2AppConfirmation::new(&user, request))
}

pub async fn approve_request<C: AuthClient>(
    client: Arc<C>,
    request: App2AppRequest,
) -> Result<(), ClientError> {
    let client_id = request.client_id.clone();
    client.approve_app2app_request(request).await?;
    info!(%client_id, "app2app request approved");
    Ok(())
}

pub async fn reject_request<C: AuthClient>(
    client: Arc<C>,
    request: App2AppRequest,
    reason: ClientError,
) -> Result<(), ClientError> {
    let client_id = request.client_id.clone();
    client.reject_app2app_request(request, reason).await?;
    info!(%client_id, "app2app request rejected");
    Ok(())
}
