//! Stateless HTTP request builder and response parser for the expense API.
//!
//! # Design
//! `ExpenseClient` holds the base URL and, once signed in, the credential to
//! attach. Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! The caller executes the round-trip.
//!
//! Every response body is an envelope `{ success, message?, <payload> }`.
//! Non-2xx statuses and `success: false` both become an `ApiError` carrying
//! the server's message, or the operation's fallback text when it sent none.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::credential::{Credential, CredentialPolicy};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    Expense, ExpenseId, ExpenseInput, ExpenseRecord, LoginRequest, RegisterRequest, User,
};

/// Synchronous, I/O-free client for the expense API.
#[derive(Debug, Clone)]
pub struct ExpenseClient {
    base_url: String,
    credential: Option<Arc<dyn Credential>>,
}

/// Fallback messages for one operation.
struct Fallback {
    status: &'static str,
    envelope: &'static str,
}

const LOGIN: Fallback = Fallback {
    status: "Login failed",
    envelope: "Login failed",
};
const REGISTER: Fallback = Fallback {
    status: "Signup failed",
    envelope: "Signup failed",
};
const CURRENT_USER: Fallback = Fallback {
    status: "Failed to fetch user data",
    envelope: "User fetch failed",
};
const LIST: Fallback = Fallback {
    status: "Failed to fetch expenses",
    envelope: "Expenses fetch failed",
};
const CREATE: Fallback = Fallback {
    status: "Failed to add expense",
    envelope: "Expense addition failed",
};
const UPDATE: Fallback = Fallback {
    status: "Failed to update expense",
    envelope: "Expense update failed",
};
const DELETE: Fallback = Fallback {
    status: "Failed to delete expense",
    envelope: "Expense deletion failed",
};
const LOGOUT: Fallback = Fallback {
    status: "Logout failed",
    envelope: "Logout failed",
};

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(flatten)]
    payload: T,
}

#[derive(Deserialize)]
struct Empty {}

#[derive(Deserialize)]
struct UserPayload {
    user: Option<User>,
}

#[derive(Deserialize)]
struct ExpensesPayload {
    expenses: Option<Vec<ExpenseRecord>>,
}

#[derive(Deserialize)]
struct ExpensePayload {
    expense: Option<ExpenseRecord>,
}

#[derive(Deserialize)]
struct LoginPayload {
    token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl ExpenseClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credential: None,
        }
    }

    /// A copy of this client that authorises requests with `credential`.
    pub fn with_credential(&self, credential: Arc<dyn Credential>) -> Self {
        Self {
            base_url: self.base_url.clone(),
            credential: Some(credential),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    // -----------------------------------------------------------------------
    // Build
    // -----------------------------------------------------------------------

    pub fn build_login(&self, input: &LoginRequest) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/user/login", input)
    }

    pub fn build_register(&self, input: &RegisterRequest) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/user/register", input)
    }

    pub fn build_current_user(&self) -> HttpRequest {
        self.authorized(self.request(HttpMethod::Get, "/user/me"))
    }

    pub fn build_list_expenses(&self) -> HttpRequest {
        self.authorized(self.request(HttpMethod::Get, "/expense/getall"))
    }

    pub fn build_create_expense(&self, input: &ExpenseInput) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/expense/add", input)
            .map(|req| self.authorized(req))
    }

    pub fn build_update_expense(
        &self,
        id: &ExpenseId,
        input: &ExpenseInput,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Put, &format!("/expense/update/{}", segment(id)), input)
            .map(|req| self.authorized(req))
    }

    pub fn build_delete_expense(&self, id: &ExpenseId) -> HttpRequest {
        self.authorized(self.request(
            HttpMethod::Delete,
            &format!("/expense/remove/{}", segment(id)),
        ))
    }

    pub fn build_logout(&self) -> HttpRequest {
        self.authorized(self.request(HttpMethod::Get, "/user/logout"))
    }

    // -----------------------------------------------------------------------
    // Parse
    // -----------------------------------------------------------------------

    /// Parse a login response into the credential `policy` says it issued.
    pub fn parse_login(
        &self,
        response: HttpResponse,
        policy: &CredentialPolicy,
    ) -> Result<Arc<dyn Credential>, ApiError> {
        let payload: LoginPayload = parse_envelope(&response, &LOGIN)?;
        policy
            .issue(&response, payload.token.as_deref())
            .ok_or_else(|| ApiError::Unsuccessful {
                message: "Login response did not include a session credential".to_string(),
            })
    }

    pub fn parse_register(&self, response: HttpResponse) -> Result<(), ApiError> {
        parse_envelope::<Empty>(&response, &REGISTER).map(|_| ())
    }

    pub fn parse_current_user(&self, response: HttpResponse) -> Result<User, ApiError> {
        let payload: UserPayload = parse_envelope(&response, &CURRENT_USER)?;
        payload.user.ok_or_else(|| missing("user"))
    }

    pub fn parse_list_expenses(&self, response: HttpResponse) -> Result<Vec<Expense>, ApiError> {
        let payload: ExpensesPayload = parse_envelope(&response, &LIST)?;
        let records = payload.expenses.ok_or_else(|| missing("expenses"))?;
        Ok(records.into_iter().map(Expense::from).collect())
    }

    /// The raw record, so the caller can fill omitted fields from its input.
    pub fn parse_create_expense(&self, response: HttpResponse) -> Result<ExpenseRecord, ApiError> {
        let payload: ExpensePayload = parse_envelope(&response, &CREATE)?;
        payload.expense.ok_or_else(|| missing("expense"))
    }

    pub fn parse_update_expense(&self, response: HttpResponse) -> Result<Expense, ApiError> {
        let payload: ExpensePayload = parse_envelope(&response, &UPDATE)?;
        payload
            .expense
            .map(Expense::from)
            .ok_or_else(|| missing("expense"))
    }

    pub fn parse_delete_expense(&self, response: HttpResponse) -> Result<(), ApiError> {
        parse_acknowledgement(&response, &DELETE)
    }

    /// Any 2xx ends the session, whatever the body says.
    pub fn parse_logout(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response, &LOGOUT)
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest {
            method,
            path: format!("{}{path}", self.base_url),
            headers: Vec::new(),
            body: None,
        }
    }

    fn json_request<T: Serialize>(
        &self,
        method: HttpMethod,
        path: &str,
        input: &T,
    ) -> Result<HttpRequest, ApiError> {
        let body =
            serde_json::to_string(input).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        let mut req = self.request(method, path);
        req.push_header("content-type", "application/json");
        req.body = Some(body);
        Ok(req)
    }

    fn authorized(&self, mut req: HttpRequest) -> HttpRequest {
        if let Some(credential) = &self.credential {
            credential.attach(&mut req);
        }
        req
    }
}

/// Map a non-2xx status to an `ApiError`, preferring the body's message.
fn check_status(response: &HttpResponse, fallback: &Fallback) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    let message = serde_json::from_str::<ErrorBody>(&response.body)
        .ok()
        .and_then(|body| body.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| fallback.status.to_string());
    Err(ApiError::classify(response.status, message))
}

fn parse_envelope<T: DeserializeOwned>(
    response: &HttpResponse,
    fallback: &Fallback,
) -> Result<T, ApiError> {
    check_status(response, fallback)?;
    let envelope: Envelope<T> = serde_json::from_str(&response.body)
        .map_err(|e| ApiError::DeserializationError(e.to_string()))?;
    if !envelope.success {
        let message = envelope
            .message
            .unwrap_or_else(|| fallback.envelope.to_string());
        return Err(ApiError::classify(response.status, message));
    }
    Ok(envelope.payload)
}

/// Like `parse_envelope`, but an empty 2xx body also counts as success.
fn parse_acknowledgement(response: &HttpResponse, fallback: &Fallback) -> Result<(), ApiError> {
    if response.is_success() && response.body.trim().is_empty() {
        return Ok(());
    }
    parse_envelope::<Empty>(response, fallback).map(|_| ())
}

/// An id as a single path segment; `/`, `?` and `#` cannot change the route.
fn segment(id: &ExpenseId) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(id.as_str())
}

fn missing(field: &str) -> ApiError {
    ApiError::DeserializationError(format!("response is missing `{field}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::BearerToken;

    fn client() -> ExpenseClient {
        ExpenseClient::new("http://localhost:4000/api/v1")
    }

    fn signed_in() -> ExpenseClient {
        client().with_credential(Arc::new(BearerToken::new("t0k")))
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    fn input() -> ExpenseInput {
        ExpenseInput {
            description: "Groceries".to_string(),
            amount: 50.5,
            category: "Food".to_string(),
        }
    }

    #[test]
    fn build_list_expenses_produces_correct_request() {
        let req = signed_in().build_list_expenses();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:4000/api/v1/expense/getall");
        assert!(req.body.is_none());
        assert_eq!(req.header("authorization"), Some("Bearer t0k"));
    }

    #[test]
    fn build_create_expense_produces_correct_request() {
        let req = signed_in().build_create_expense(&input()).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:4000/api/v1/expense/add");
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["description"], "Groceries");
        assert_eq!(body["amount"], 50.5);
        assert_eq!(body["category"], "Food");
    }

    #[test]
    fn build_update_and_delete_use_id_in_path() {
        let id = ExpenseId::new("65f0c0ffee");
        let update = signed_in().build_update_expense(&id, &input()).unwrap();
        assert_eq!(update.method, HttpMethod::Put);
        assert_eq!(
            update.path,
            "http://localhost:4000/api/v1/expense/update/65f0c0ffee"
        );
        let delete = signed_in().build_delete_expense(&id);
        assert_eq!(delete.method, HttpMethod::Delete);
        assert_eq!(
            delete.path,
            "http://localhost:4000/api/v1/expense/remove/65f0c0ffee"
        );
        assert!(delete.body.is_none());
    }

    #[test]
    fn login_and_register_carry_no_credential() {
        let login = signed_in()
            .build_login(&LoginRequest {
                email: "a@b.c".to_string(),
                password: "secret1".to_string(),
            })
            .unwrap();
        assert_eq!(login.path, "http://localhost:4000/api/v1/user/login");
        assert!(login.header("authorization").is_none());

        let register = signed_in()
            .build_register(&RegisterRequest {
                fullname: "A".to_string(),
                email: "a@b.c".to_string(),
                password: "secret1".to_string(),
            })
            .unwrap();
        assert_eq!(register.path, "http://localhost:4000/api/v1/user/register");
        assert!(register.header("authorization").is_none());
    }

    #[test]
    fn logout_is_an_authorized_get() {
        let req = signed_in().build_logout();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:4000/api/v1/user/logout");
        assert_eq!(req.header("authorization"), Some("Bearer t0k"));
    }

    #[test]
    fn ids_are_encoded_as_one_path_segment() {
        let c = signed_in();
        let req = c.build_delete_expense(&ExpenseId::new("a/b"));
        assert_eq!(req.path, "http://localhost:4000/api/v1/expense/remove/a%2Fb");

        let req = c
            .build_update_expense(&ExpenseId::new("../../user/logout?x#y"), &input())
            .unwrap();
        assert_eq!(
            req.path,
            "http://localhost:4000/api/v1/expense/update/..%2F..%2Fuser%2Flogout%3Fx%23y"
        );
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = ExpenseClient::new("http://localhost:4000/api/v1/");
        assert_eq!(
            client.build_current_user().path,
            "http://localhost:4000/api/v1/user/me"
        );
    }

    #[test]
    fn parse_current_user_success() {
        let user = client()
            .parse_current_user(response(
                200,
                r#"{"success":true,"user":{"_id":"u1","fullname":"Asha","email":"asha@example.com"}}"#,
            ))
            .unwrap();
        assert_eq!(user.fullname, "Asha");
    }

    #[test]
    fn parse_list_coerces_amounts() {
        let expenses = client()
            .parse_list_expenses(response(
                200,
                r#"{"success":true,"expenses":[{"_id":"1","amount":"50.5"},{"_id":"2","amount":-20},{"_id":"3","amount":"abc"}]}"#,
            ))
            .unwrap();
        let amounts: Vec<f64> = expenses.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![50.5, -20.0, 0.0]);
    }

    #[test]
    fn non_2xx_uses_server_message() {
        let err = client()
            .parse_create_expense(response(400, r#"{"success":false,"message":"Category is required"}"#))
            .unwrap_err();
        assert_eq!(err.to_string(), "Category is required");
        assert!(!err.is_session_lost());
    }

    #[test]
    fn non_2xx_without_message_uses_fallback() {
        let err = client()
            .parse_list_expenses(response(500, "internal error"))
            .unwrap_err();
        assert!(matches!(err, ApiError::Rejected { status: 500, .. }));
        assert_eq!(err.to_string(), "Failed to fetch expenses");
    }

    #[test]
    fn unsuccessful_envelope_uses_envelope_fallback() {
        let err = client()
            .parse_update_expense(response(200, r#"{"success":false}"#))
            .unwrap_err();
        assert_eq!(err.to_string(), "Expense update failed");
    }

    #[test]
    fn unauthorized_message_is_session_lost() {
        let err = client()
            .parse_current_user(response(401, r#"{"message":"Unauthorized access"}"#))
            .unwrap_err();
        assert!(err.is_session_lost());
    }

    #[test]
    fn parse_create_keeps_omitted_fields_absent() {
        let record = client()
            .parse_create_expense(response(201, r#"{"success":true,"expense":{"_id":"n1"}}"#))
            .unwrap();
        assert!(record.description.is_none());
        assert!(record.amount.is_none());
    }

    #[test]
    fn parse_create_without_expense_is_an_error() {
        let err = client()
            .parse_create_expense(response(201, r#"{"success":true}"#))
            .unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }

    #[test]
    fn delete_and_logout_accept_empty_bodies() {
        assert!(client().parse_delete_expense(response(204, "")).is_ok());
        assert!(client().parse_logout(response(200, "")).is_ok());
        assert!(client()
            .parse_delete_expense(response(200, r#"{"success":true,"message":"Expense removed"}"#))
            .is_ok());
    }

    #[test]
    fn logout_succeeds_on_any_2xx_body() {
        let c = signed_in();
        assert!(c
            .parse_logout(response(200, r#"{"message":"Logged out successfully."}"#))
            .is_ok());
        assert!(c.parse_logout(response(200, "OK")).is_ok());
        assert!(c
            .parse_logout(response(200, r#"{"success":false,"message":"ignored"}"#))
            .is_ok());
    }

    #[test]
    fn logout_failure_uses_server_message() {
        let err = signed_in()
            .parse_logout(response(401, r#"{"success":false,"message":"Unauthorized access"}"#))
            .unwrap_err();
        assert_eq!(err.to_string(), "Unauthorized access");
        assert!(err.is_session_lost());
    }

    #[test]
    fn logout_failure_has_fallback() {
        let err = client().parse_logout(response(500, "")).unwrap_err();
        assert_eq!(err.to_string(), "Logout failed");
    }

    #[test]
    fn parse_login_issues_bearer_token() {
        let credential = client()
            .parse_login(
                response(200, r#"{"success":true,"message":"Welcome back","token":"abc"}"#),
                &CredentialPolicy::Bearer,
            )
            .unwrap();
        let mut req = client().build_list_expenses();
        credential.attach(&mut req);
        assert_eq!(req.header("authorization"), Some("Bearer abc"));
    }

    #[test]
    fn parse_login_without_cookie_fails() {
        let err = client()
            .parse_login(
                response(200, r#"{"success":true,"token":"abc"}"#),
                &CredentialPolicy::default(),
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::Unsuccessful { .. }));
    }

    #[test]
    fn parse_login_bad_json() {
        let err = client()
            .parse_login(response(200, "not json"), &CredentialPolicy::Bearer)
            .unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }
}
