//! Domain DTOs for the expense API.
//!
//! # Design
//! These types are defined independently of the mock-server crate; the
//! integration tests catch schema drift. Wire names follow the API (`_id`,
//! `createdAt`). Server records are read through `ExpenseRecord`, which keeps
//! every field optional so the caller can tell "omitted" from "empty".

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::amount::{coerce_amount, deserialize_lenient};

/// Server-assigned expense identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpenseId(String);

impl ExpenseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub fullname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl User {
    pub fn display_name(&self) -> &str {
        if self.fullname.trim().is_empty() {
            "User"
        } else {
            &self.fullname
        }
    }
}

/// An expense as held in the local list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    #[serde(rename = "_id")]
    pub id: ExpenseId,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_lenient")]
    pub amount: f64,
    #[serde(default)]
    pub category: String,
    #[serde(
        rename = "createdAt",
        default,
        deserialize_with = "deserialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

/// An expense exactly as the server returned it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExpenseRecord {
    #[serde(rename = "_id")]
    pub id: ExpenseId,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(rename = "createdAt", default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ExpenseRecord {
    /// Fill what the server left out with what the user submitted.
    ///
    /// Empty strings and a zero or missing amount count as omitted; a missing
    /// timestamp becomes `now`.
    pub fn fill_from(self, submitted: &ExpenseInput, now: DateTime<Utc>) -> Expense {
        let amount = self.amount.as_ref().map(coerce_amount).unwrap_or(0.0);
        Expense {
            id: self.id,
            description: non_empty(self.description).unwrap_or_else(|| submitted.description.clone()),
            amount: if amount == 0.0 { submitted.amount } else { amount },
            category: non_empty(self.category).unwrap_or_else(|| submitted.category.clone()),
            created_at: Some(self.created_at.unwrap_or(now)),
        }
    }
}

impl From<ExpenseRecord> for Expense {
    fn from(record: ExpenseRecord) -> Self {
        Expense {
            id: record.id,
            description: record.description.unwrap_or_default(),
            amount: record.amount.as_ref().map(coerce_amount).unwrap_or(0.0),
            category: record.category.unwrap_or_default(),
            created_at: record.created_at,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Timestamps the server mangles are dropped rather than failing the record.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}

/// Request payload for creating or updating an expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseInput {
    pub description: String,
    pub amount: f64,
    pub category: String,
}

/// Request payload for `POST /user/login`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request payload for `POST /user/register`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub fullname: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"********")
            .finish()
    }
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("fullname", &self.fullname)
            .field("email", &self.email)
            .field("password", &"********")
            .finish()
    }
}
