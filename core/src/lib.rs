//! Synchronous client core for the expense tracker API.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern). On top of the client sit the
//! form validators, the `Dashboard` state container for the expense list and
//! the `Session` that ties a credential, a dashboard and a `Transport`
//! together for the lifetime of one sign-in.
//!
//! # Design
//! - `ExpenseClient` holds only the base URL and an optional credential.
//! - Each API operation is split into `build_*` and `parse_*`, so the I/O
//!   boundary is explicit and every step is testable with canned responses.
//! - Failures are classified once into `ApiError`; session loss is the
//!   `Unauthorized` variant rather than a string check at every call site.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod amount;
pub mod client;
pub mod config;
pub mod credential;
pub mod dashboard;
pub mod error;
pub mod form;
pub mod http;
pub mod session;
pub mod types;

pub use amount::{coerce_amount, format_amount, parse_amount, Summary};
pub use client::ExpenseClient;
pub use config::{ClientConfig, ConfigError, LogoutPolicy};
pub use credential::{BearerToken, Credential, CredentialPolicy, SessionCookie};
pub use dashboard::{Confirmation, Dashboard, DashboardError, EditDraft};
pub use error::ApiError;
pub use form::{ExpenseDraft, FieldError, LoginForm, SignupForm, ValidationErrors};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use session::{register, AuthError, Session, SignOut};
pub use types::{Expense, ExpenseId, ExpenseInput, ExpenseRecord, LoginRequest, RegisterRequest, User};
