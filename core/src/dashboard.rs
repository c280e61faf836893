//! State container for the signed-in user's expense list.
//!
//! # Design
//! `Dashboard` owns the list and the form state; it never performs I/O.
//! Each operation is a `begin_*` call that validates, marks the operation in
//! flight and returns the request(s) to execute, followed by a `finish_*`
//! call that takes the outcome and settles it. While an operation is in
//! flight every other `begin_*` is refused with `Busy`.
//!
//! Failures are stored in `last_error` and returned. Whether a failure means
//! the session is gone is answered by `DashboardError::is_session_lost`; the
//! owner of the dashboard decides what to do about it.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::amount::Summary;
use crate::client::ExpenseClient;
use crate::error::ApiError;
use crate::form::{ExpenseDraft, ValidationErrors};
use crate::http::{HttpRequest, HttpResponse};
use crate::types::{Expense, ExpenseId, ExpenseInput, User};

/// Errors returned by `Dashboard` operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DashboardError {
    /// The form failed local validation; nothing was sent.
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    /// Another operation has not settled yet.
    #[error("another request is still in progress")]
    Busy,

    /// The user declined the delete prompt; nothing was sent.
    #[error("deletion cancelled")]
    ConfirmationDeclined,

    #[error("no expense is being edited")]
    NotEditing,

    #[error("no expense with id {0}")]
    UnknownExpense(ExpenseId),

    /// `finish_*` was called for an operation that was never begun.
    #[error("no matching request is in progress")]
    NothingInFlight,

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl DashboardError {
    pub fn is_session_lost(&self) -> bool {
        matches!(self, DashboardError::Api(err) if err.is_session_lost())
    }
}

/// The answer to "Are you sure you want to delete this expense?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

impl From<bool> for Confirmation {
    fn from(confirmed: bool) -> Self {
        if confirmed {
            Confirmation::Confirmed
        } else {
            Confirmation::Declined
        }
    }
}

/// An edit form bound to the expense it edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDraft {
    pub id: ExpenseId,
    pub draft: ExpenseDraft,
}

#[derive(Debug, Clone, PartialEq)]
enum InFlight {
    Initialize,
    Create(ExpenseInput),
    Update(ExpenseId),
    Delete(ExpenseId),
    EndSession,
}

#[derive(Debug, Default)]
pub struct Dashboard {
    user: Option<User>,
    expenses: Vec<Expense>,
    in_flight: Option<InFlight>,
    last_error: Option<String>,
    create_draft: ExpenseDraft,
    edit_draft: Option<EditDraft>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    pub fn expense(&self, id: &ExpenseId) -> Option<&Expense> {
        self.expenses.iter().find(|e| &e.id == id)
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn summary(&self) -> Summary {
        Summary::of(&self.expenses)
    }

    pub fn create_draft(&self) -> &ExpenseDraft {
        &self.create_draft
    }

    pub fn create_draft_mut(&mut self) -> &mut ExpenseDraft {
        &mut self.create_draft
    }

    pub fn edit_draft(&self) -> Option<&EditDraft> {
        self.edit_draft.as_ref()
    }

    pub fn edit_draft_mut(&mut self) -> Option<&mut ExpenseDraft> {
        self.edit_draft.as_mut().map(|edit| &mut edit.draft)
    }

    // -----------------------------------------------------------------------
    // Initialize
    // -----------------------------------------------------------------------

    /// Requests for the current user and the expense list, in that order.
    pub fn begin_initialize(
        &mut self,
        client: &ExpenseClient,
    ) -> Result<(HttpRequest, HttpRequest), DashboardError> {
        self.start(InFlight::Initialize)?;
        Ok((client.build_current_user(), client.build_list_expenses()))
    }

    /// Apply whichever halves succeeded; report the first failure.
    pub fn finish_initialize(
        &mut self,
        client: &ExpenseClient,
        user: Result<HttpResponse, ApiError>,
        expenses: Result<HttpResponse, ApiError>,
    ) -> Result<(), DashboardError> {
        self.settle(|op| matches!(op, InFlight::Initialize))?;
        let user = user.and_then(|r| client.parse_current_user(r));
        let expenses = expenses.and_then(|r| client.parse_list_expenses(r));

        let mut failure = None;
        match user {
            Ok(user) => self.user = Some(user),
            Err(err) => failure = Some(err),
        }
        match expenses {
            Ok(expenses) => {
                info!(count = expenses.len(), "loaded expenses");
                self.expenses = expenses;
            }
            Err(err) => {
                failure.get_or_insert(err);
            }
        }
        match failure {
            Some(err) => Err(self.fail(err)),
            None => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    /// Validate the create draft and build its request.
    pub fn begin_create(&mut self, client: &ExpenseClient) -> Result<HttpRequest, DashboardError> {
        self.ensure_idle()?;
        let input = self.create_draft.validate()?;
        let request = client.build_create_expense(&input)?;
        self.start(InFlight::Create(input))?;
        Ok(request)
    }

    pub fn finish_create(
        &mut self,
        client: &ExpenseClient,
        response: Result<HttpResponse, ApiError>,
    ) -> Result<(), DashboardError> {
        let op = self.settle(|op| matches!(op, InFlight::Create(_)))?;
        let InFlight::Create(submitted) = op else {
            return Err(DashboardError::NothingInFlight);
        };
        match response.and_then(|r| client.parse_create_expense(r)) {
            Ok(record) => {
                let expense = record.fill_from(&submitted, Utc::now());
                info!(id = %expense.id, "expense added");
                self.expenses.insert(0, expense);
                self.create_draft = ExpenseDraft::default();
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    // -----------------------------------------------------------------------
    // Edit
    // -----------------------------------------------------------------------

    /// Open the edit form for `id`, replacing any unsaved edit.
    pub fn begin_edit(&mut self, id: &ExpenseId) -> Result<(), DashboardError> {
        let draft = self
            .expense(id)
            .map(ExpenseDraft::from_expense)
            .ok_or_else(|| DashboardError::UnknownExpense(id.clone()))?;
        if let Some(previous) = &self.edit_draft {
            if &previous.id != id {
                debug!(discarded = %previous.id, "replacing unsaved edit");
            }
        }
        self.edit_draft = Some(EditDraft {
            id: id.clone(),
            draft,
        });
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.edit_draft = None;
    }

    /// Validate the edit draft and build the update request for its id.
    pub fn begin_commit_edit(
        &mut self,
        client: &ExpenseClient,
    ) -> Result<HttpRequest, DashboardError> {
        self.ensure_idle()?;
        let edit = self.edit_draft.as_ref().ok_or(DashboardError::NotEditing)?;
        let input = edit.draft.validate()?;
        let request = client.build_update_expense(&edit.id, &input)?;
        let id = edit.id.clone();
        self.start(InFlight::Update(id))?;
        Ok(request)
    }

    /// On failure the edit draft stays open for another attempt.
    pub fn finish_commit_edit(
        &mut self,
        client: &ExpenseClient,
        response: Result<HttpResponse, ApiError>,
    ) -> Result<(), DashboardError> {
        let op = self.settle(|op| matches!(op, InFlight::Update(_)))?;
        let InFlight::Update(id) = op else {
            return Err(DashboardError::NothingInFlight);
        };
        match response.and_then(|r| client.parse_update_expense(r)) {
            Ok(mut updated) => {
                // The row keeps its place even if the server echoes another id.
                updated.id = id.clone();
                if let Some(slot) = self.expenses.iter_mut().find(|e| e.id == id) {
                    *slot = updated;
                }
                info!(%id, "expense updated");
                if self.edit_draft.as_ref().is_some_and(|edit| edit.id == id) {
                    self.edit_draft = None;
                }
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    pub fn begin_delete(
        &mut self,
        client: &ExpenseClient,
        id: &ExpenseId,
        confirmation: Confirmation,
    ) -> Result<HttpRequest, DashboardError> {
        self.ensure_idle()?;
        if confirmation == Confirmation::Declined {
            debug!(%id, "delete declined");
            return Err(DashboardError::ConfirmationDeclined);
        }
        self.start(InFlight::Delete(id.clone()))?;
        Ok(client.build_delete_expense(id))
    }

    pub fn finish_delete(
        &mut self,
        client: &ExpenseClient,
        response: Result<HttpResponse, ApiError>,
    ) -> Result<(), DashboardError> {
        let op = self.settle(|op| matches!(op, InFlight::Delete(_)))?;
        let InFlight::Delete(id) = op else {
            return Err(DashboardError::NothingInFlight);
        };
        match response.and_then(|r| client.parse_delete_expense(r)) {
            Ok(()) => {
                self.expenses.retain(|e| e.id != id);
                if self.edit_draft.as_ref().is_some_and(|edit| edit.id == id) {
                    self.edit_draft = None;
                }
                info!(%id, "expense removed");
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    // -----------------------------------------------------------------------
    // End session
    // -----------------------------------------------------------------------

    pub fn begin_end_session(&mut self, client: &ExpenseClient) -> Result<HttpRequest, DashboardError> {
        self.start(InFlight::EndSession)?;
        Ok(client.build_logout())
    }

    /// Only reports the outcome; dropping the dashboard is up to its owner.
    pub fn finish_end_session(
        &mut self,
        client: &ExpenseClient,
        response: Result<HttpResponse, ApiError>,
    ) -> Result<(), DashboardError> {
        self.settle(|op| matches!(op, InFlight::EndSession))?;
        match response.and_then(|r| client.parse_logout(r)) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    // -----------------------------------------------------------------------
    // Bookkeeping
    // -----------------------------------------------------------------------

    fn ensure_idle(&self) -> Result<(), DashboardError> {
        if self.in_flight.is_some() {
            return Err(DashboardError::Busy);
        }
        Ok(())
    }

    fn start(&mut self, op: InFlight) -> Result<(), DashboardError> {
        self.ensure_idle()?;
        debug!(?op, "request started");
        self.last_error = None;
        self.in_flight = Some(op);
        Ok(())
    }

    fn settle(&mut self, expected: impl Fn(&InFlight) -> bool) -> Result<InFlight, DashboardError> {
        match self.in_flight.take() {
            Some(op) if expected(&op) => Ok(op),
            other => {
                self.in_flight = other;
                Err(DashboardError::NothingInFlight)
            }
        }
    }

    fn fail(&mut self, err: ApiError) -> DashboardError {
        if err.is_session_lost() {
            warn!(error = %err, "session lost");
        } else {
            warn!(error = %err, "request failed");
        }
        self.last_error = Some(err.to_string());
        DashboardError::Api(err)
    }
}
