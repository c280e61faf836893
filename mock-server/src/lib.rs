use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "token";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub fullname: String,
    pub email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Expense {
    #[serde(rename = "_id")]
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub category: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

#[derive(Deserialize)]
pub struct Register {
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct Login {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct AddExpense {
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub category: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateExpense {
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub category: Option<String>,
}

struct Account {
    user: User,
    password: String,
}

struct Owned {
    owner: String,
    expense: Expense,
}

#[derive(Default)]
pub struct Store {
    accounts: HashMap<String, Account>,
    sessions: HashMap<String, String>,
    expenses: Vec<Owned>,
}

pub type Db = Arc<RwLock<Store>>;

/// A JSON failure body: `{ "success": false, "message": ... }`.
#[derive(Debug)]
pub struct Failure(StatusCode, String);

impl Failure {
    fn new(status: StatusCode, message: &str) -> Self {
        Self(status, message.to_string())
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "success": false, "message": self.1 }))).into_response()
    }
}

/// The user id behind the request's token cookie or bearer header.
pub struct AuthUser {
    pub user_id: String,
    pub token: String,
}

impl FromRequestParts<Db> for AuthUser {
    type Rejection = Failure;

    async fn from_request_parts(parts: &mut Parts, db: &Db) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers)
            .ok_or_else(|| Failure::new(StatusCode::UNAUTHORIZED, "User not authenticated"))?;
        let store = db.read().await;
        let user_id = store
            .sessions
            .get(&token)
            .cloned()
            .ok_or_else(|| Failure::new(StatusCode::UNAUTHORIZED, "Unauthorized access"))?;
        Ok(AuthUser { user_id, token })
    }
}

fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().trim().to_string())
        .filter(|token| !token.is_empty())
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    let api = Router::new()
        .route("/user/register", post(register))
        .route("/user/login", post(login))
        .route("/user/logout", get(logout))
        .route("/user/me", get(me))
        .route("/expense/getall", get(list_expenses))
        .route("/expense/add", post(add_expense))
        .route("/expense/update/{id}", put(update_expense))
        .route("/expense/remove/{id}", delete(remove_expense));
    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn register(
    State(db): State<Db>,
    Json(input): Json<Register>,
) -> Result<(StatusCode, Json<Value>), Failure> {
    let (Some(fullname), Some(email), Some(password)) = (
        required(input.fullname),
        required(input.email),
        required(input.password),
    ) else {
        return Err(Failure::new(StatusCode::BAD_REQUEST, "All fields are required"));
    };
    let mut store = db.write().await;
    if store.accounts.contains_key(&email) {
        return Err(Failure::new(
            StatusCode::CONFLICT,
            "User already exists with this email",
        ));
    }
    let user = User {
        id: Uuid::new_v4().to_string(),
        fullname,
        email: email.clone(),
    };
    tracing::info!(user_id = %user.id, "registered");
    store.accounts.insert(email, Account { user, password });
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Account created successfully." })),
    ))
}

async fn login(
    State(db): State<Db>,
    jar: CookieJar,
    Json(input): Json<Login>,
) -> Result<Response, Failure> {
    let (Some(email), Some(password)) = (required(input.email), required(input.password)) else {
        return Err(Failure::new(StatusCode::BAD_REQUEST, "All fields are required"));
    };
    let mut store = db.write().await;
    let user = match store.accounts.get(&email) {
        Some(account) if account.password == password => account.user.clone(),
        _ => {
            return Err(Failure::new(
                StatusCode::BAD_REQUEST,
                "Incorrect email or password",
            ))
        }
    };
    let token = Uuid::new_v4().simple().to_string();
    store.sessions.insert(token.clone(), user.id.clone());
    tracing::info!(user_id = %user.id, "logged in");

    let jar = jar.add(
        Cookie::build((SESSION_COOKIE, token.clone()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict),
    );
    let body = json!({
        "success": true,
        "message": format!("Welcome back {}", user.fullname),
        "token": token,
        "user": user,
    });
    Ok((jar, Json(body)).into_response())
}

/// Overwrite the session cookie with an expired, empty one.
fn clear_session_cookie(jar: CookieJar) -> CookieJar {
    let mut cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .build();
    cookie.make_removal();
    jar.add(cookie)
}

async fn logout(State(db): State<Db>, jar: CookieJar, auth: AuthUser) -> Response {
    db.write().await.sessions.remove(&auth.token);
    tracing::info!(user_id = %auth.user_id, "logged out");
    (
        clear_session_cookie(jar),
        Json(json!({ "success": true, "message": "Logged out successfully." })),
    )
        .into_response()
}

async fn me(State(db): State<Db>, auth: AuthUser) -> Result<Json<Value>, Failure> {
    let store = db.read().await;
    let user = store
        .accounts
        .values()
        .find(|a| a.user.id == auth.user_id)
        .map(|a| a.user.clone())
        .ok_or_else(|| Failure::new(StatusCode::NOT_FOUND, "User not found"))?;
    Ok(Json(json!({ "success": true, "user": user })))
}

async fn list_expenses(State(db): State<Db>, auth: AuthUser) -> Json<Value> {
    let store = db.read().await;
    let expenses: Vec<&Expense> = store
        .expenses
        .iter()
        .filter(|o| o.owner == auth.user_id)
        .map(|o| &o.expense)
        .collect();
    Json(json!({ "success": true, "expenses": expenses }))
}

async fn add_expense(
    State(db): State<Db>,
    auth: AuthUser,
    Json(input): Json<AddExpense>,
) -> Result<(StatusCode, Json<Value>), Failure> {
    let description = required(input.description)
        .ok_or_else(|| Failure::new(StatusCode::BAD_REQUEST, "Description is required"))?;
    let amount = input
        .amount
        .ok_or_else(|| Failure::new(StatusCode::BAD_REQUEST, "Amount is required"))?;
    let category = required(input.category)
        .ok_or_else(|| Failure::new(StatusCode::BAD_REQUEST, "Category is required"))?;

    let expense = Expense {
        id: Uuid::new_v4().to_string(),
        description,
        amount,
        category,
        created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    db.write().await.expenses.push(Owned {
        owner: auth.user_id,
        expense: expense.clone(),
    });
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": "Expense added", "expense": expense })),
    ))
}

async fn update_expense(
    State(db): State<Db>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(input): Json<UpdateExpense>,
) -> Result<Json<Value>, Failure> {
    let mut store = db.write().await;
    let expense = store
        .expenses
        .iter_mut()
        .find(|o| o.owner == auth.user_id && o.expense.id == id)
        .map(|o| &mut o.expense)
        .ok_or_else(|| Failure::new(StatusCode::NOT_FOUND, "Expense not found"))?;
    if let Some(description) = required(input.description) {
        expense.description = description;
    }
    if let Some(amount) = input.amount {
        expense.amount = amount;
    }
    if let Some(category) = required(input.category) {
        expense.category = category;
    }
    Ok(Json(
        json!({ "success": true, "message": "Expense updated", "expense": expense }),
    ))
}

async fn remove_expense(
    State(db): State<Db>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, Failure> {
    let mut store = db.write().await;
    let before = store.expenses.len();
    store
        .expenses
        .retain(|o| !(o.owner == auth.user_id && o.expense.id == id));
    if store.expenses.len() == before {
        return Err(Failure::new(StatusCode::NOT_FOUND, "Expense not found"));
    }
    Ok(Json(json!({ "success": true, "message": "Expense removed" })))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn expense_serializes_with_api_field_names() {
        let expense = Expense {
            id: "e1".to_string(),
            description: "Tea".to_string(),
            amount: 3.5,
            category: "Drinks".to_string(),
            created_at: "2024-05-01T10:00:00.000Z".to_string(),
        };
        let json = serde_json::to_value(&expense).unwrap();
        assert_eq!(json["_id"], "e1");
        assert_eq!(json["createdAt"], "2024-05-01T10:00:00.000Z");
        assert_eq!(json["amount"], 3.5);
    }

    #[test]
    fn add_expense_fields_are_optional_when_parsing() {
        let input: AddExpense = serde_json::from_str(r#"{"description":"Tea"}"#).unwrap();
        assert!(input.amount.is_none());
        assert!(input.category.is_none());
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("token=fromcookie"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer frombearer"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("frombearer"));
    }

    #[test]
    fn token_cookie_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; token=abc; lang=en"),
        );
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn empty_token_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("token="));
        assert!(token_from_headers(&headers).is_none());
    }

    #[test]
    fn cleared_session_cookie_expires_immediately() {
        let jar = clear_session_cookie(CookieJar::new());
        let cookie = jar.get(SESSION_COOKIE).unwrap();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.path(), Some("/"));
        assert!(cookie.to_string().contains("Max-Age=0"), "{cookie}");
    }

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required(Some("  x ".to_string())).as_deref(), Some("x"));
        assert!(required(Some("   ".to_string())).is_none());
        assert!(required(None).is_none());
    }
}
