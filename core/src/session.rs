//! One signed-in session: credential, dashboard and transport together.
//!
//! # Design
//! A `Session` only exists after a successful sign-in and is consumed by
//! `end_session`, so the expense list cannot outlive the credential that
//! fetched it. Each method runs one `Dashboard` begin/finish pair through the
//! transport. Initialization sends its two requests on scoped threads.

use std::thread;

use tracing::{debug, info, instrument, warn};

use crate::client::ExpenseClient;
use crate::config::{ClientConfig, LogoutPolicy};
use crate::dashboard::{Confirmation, Dashboard, DashboardError};
use crate::error::ApiError;
use crate::form::{ExpenseDraft, LoginForm, SignupForm, ValidationErrors};
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::types::ExpenseId;

/// Errors from signing in or signing up.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Result of `Session::end_session`.
#[derive(Debug)]
pub enum SignOut<T> {
    /// The server ended the session.
    SignedOut,
    /// Logout failed but the session was dropped anyway.
    Forced(DashboardError),
    /// Logout failed and the session is handed back.
    Kept(Session<T>, DashboardError),
}

/// Create an account. Does not sign in.
#[instrument(skip_all, fields(email = %form.email))]
pub fn register<T: Transport>(
    config: &ClientConfig,
    transport: &T,
    form: &SignupForm,
) -> Result<(), AuthError> {
    let input = form.validate()?;
    let client = config.client();
    let request = client.build_register(&input)?;
    client.parse_register(send(transport, request)?)?;
    info!("account created");
    Ok(())
}

#[derive(Debug)]
pub struct Session<T> {
    client: ExpenseClient,
    dashboard: Dashboard,
    transport: T,
    logout: LogoutPolicy,
}

impl<T: Transport + Sync> Session<T> {
    /// Validate the form, log in, and start a session with the issued credential.
    #[instrument(skip_all, fields(email = %form.email))]
    pub fn sign_in(config: &ClientConfig, transport: T, form: &LoginForm) -> Result<Self, AuthError> {
        let input = form.validate()?;
        let client = config.client();
        let request = client.build_login(&input)?;
        let credential = client.parse_login(send(&transport, request)?, &config.credential)?;
        info!(?credential, "signed in");
        Ok(Self {
            client: client.with_credential(credential),
            dashboard: Dashboard::new(),
            transport,
            logout: config.logout,
        })
    }

    pub fn client(&self) -> &ExpenseClient {
        &self.client
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    /// Fetch the user and the expense list. Also used to refresh.
    pub fn initialize(&mut self) -> Result<(), DashboardError> {
        let (user_req, list_req) = self.dashboard.begin_initialize(&self.client)?;
        let transport = &self.transport;
        let (user, expenses) = thread::scope(|scope| {
            let user = scope.spawn(move || send(transport, user_req));
            let expenses = send(transport, list_req);
            let user = user
                .join()
                .unwrap_or_else(|_| Err(ApiError::Transport("request thread panicked".to_string())));
            (user, expenses)
        });
        self.dashboard.finish_initialize(&self.client, user, expenses)
    }

    /// Submit `draft` as a new expense.
    pub fn create(&mut self, draft: ExpenseDraft) -> Result<(), DashboardError> {
        *self.dashboard.create_draft_mut() = draft;
        let request = self.dashboard.begin_create(&self.client)?;
        let response = send(&self.transport, request);
        self.dashboard.finish_create(&self.client, response)
    }

    pub fn begin_edit(&mut self, id: &ExpenseId) -> Result<(), DashboardError> {
        self.dashboard.begin_edit(id)
    }

    /// The open edit form, if any.
    pub fn edit_draft_mut(&mut self) -> Option<&mut ExpenseDraft> {
        self.dashboard.edit_draft_mut()
    }

    pub fn commit_edit(&mut self) -> Result<(), DashboardError> {
        let request = self.dashboard.begin_commit_edit(&self.client)?;
        let response = send(&self.transport, request);
        self.dashboard.finish_commit_edit(&self.client, response)
    }

    pub fn cancel_edit(&mut self) {
        self.dashboard.cancel_edit();
    }

    /// Delete `id` if `confirm` agrees.
    pub fn delete(
        &mut self,
        id: &ExpenseId,
        confirm: impl FnOnce(&ExpenseId) -> bool,
    ) -> Result<(), DashboardError> {
        let confirmation = Confirmation::from(confirm(id));
        let request = self.dashboard.begin_delete(&self.client, id, confirmation)?;
        let response = send(&self.transport, request);
        self.dashboard.finish_delete(&self.client, response)
    }

    /// Log out and dispose of the session according to the logout policy.
    ///
    /// A logout rejected as session-lost always drops the session: there is
    /// nothing left to keep.
    pub fn end_session(mut self) -> SignOut<T> {
        let request = match self.dashboard.begin_end_session(&self.client) {
            Ok(request) => request,
            Err(err) => return SignOut::Kept(self, err),
        };
        let response = send(&self.transport, request);
        match self.dashboard.finish_end_session(&self.client, response) {
            Ok(()) => {
                info!("signed out");
                SignOut::SignedOut
            }
            Err(err) if err.is_session_lost() || self.logout == LogoutPolicy::ForceSignOut => {
                warn!(error = %err, "logout failed, dropping session");
                SignOut::Forced(err)
            }
            Err(err) => SignOut::Kept(self, err),
        }
    }

    /// Give up the session without contacting the server.
    pub fn into_transport(self) -> T {
        self.transport
    }
}

fn send<T: Transport + ?Sized>(transport: &T, request: HttpRequest) -> Result<HttpResponse, ApiError> {
    debug!(method = request.method.as_str(), url = %request.path, "sending request");
    let response = transport.execute(request);
    match &response {
        Ok(r) => debug!(status = r.status, "response received"),
        Err(err) => warn!(error = %err, "transport failed"),
    }
    response
}
