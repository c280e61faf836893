//! Form drafts and their local validation.
//!
//! Validation only blocks submission for missing or malformed fields. The
//! expense amount is never rejected for being unparsable; it is coerced.

use std::fmt;

use crate::amount::parse_amount;
use crate::types::{Expense, ExpenseInput, LoginRequest, RegisterRequest};

const MIN_PASSWORD_CHARS: usize = 6;

/// A single failed field check, shown next to the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every failed field of one form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// The message for `field`, if it failed.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|e| e.message.as_str()).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Default)]
struct Checks(Vec<FieldError>);

impl Checks {
    fn fail(&mut self, field: &'static str, message: &str) {
        self.0.push(FieldError {
            field,
            message: message.to_string(),
        });
    }

    fn required(&mut self, field: &'static str, value: &str, message: &str) -> bool {
        if value.trim().is_empty() {
            self.fail(field, message);
            return false;
        }
        true
    }

    fn email(&mut self, value: &str) {
        if self.required("email", value, "Email is required") && !looks_like_email(value.trim()) {
            self.fail("email", "Invalid email format");
        }
    }

    fn password(&mut self, value: &str) {
        if value.is_empty() {
            self.fail("password", "Password is required");
        } else if value.chars().count() < MIN_PASSWORD_CHARS {
            self.fail("password", "Password must be at least 6 characters long");
        }
    }

    fn finish<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.0.is_empty() {
            Ok(value)
        } else {
            Err(ValidationErrors(self.0))
        }
    }
}

/// Non-blank text on both sides of an `@`, no whitespace anywhere.
fn looks_like_email(value: &str) -> bool {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() < 3 || chars.iter().any(|c| c.is_whitespace()) {
        return false;
    }
    chars[1..chars.len() - 1].contains(&'@')
}

/// Text fields of the add and edit expense forms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpenseDraft {
    pub description: String,
    pub amount: String,
    pub category: String,
}

impl ExpenseDraft {
    pub fn new(
        description: impl Into<String>,
        amount: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            amount: amount.into(),
            category: category.into(),
        }
    }

    /// Prefill an edit form from a stored expense.
    pub fn from_expense(expense: &Expense) -> Self {
        Self {
            description: expense.description.clone(),
            amount: expense.amount.to_string(),
            category: expense.category.clone(),
        }
    }

    /// Set one field by its form name. Returns false for an unknown name.
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> bool {
        let slot = match field {
            "description" => &mut self.description,
            "amount" => &mut self.amount,
            "category" => &mut self.category,
            _ => return false,
        };
        *slot = value.into();
        true
    }

    pub fn validate(&self) -> Result<ExpenseInput, ValidationErrors> {
        let mut checks = Checks::default();
        checks.required("description", &self.description, "Description is required");
        checks.required("amount", &self.amount, "Amount is required");
        checks.required("category", &self.category, "Category is required");
        checks.finish(ExpenseInput {
            description: self.description.trim().to_string(),
            amount: parse_amount(&self.amount),
            category: self.category.trim().to_string(),
        })
    }
}

/// The sign-in form.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<LoginRequest, ValidationErrors> {
        let mut checks = Checks::default();
        checks.email(&self.email);
        checks.password(&self.password);
        checks.finish(LoginRequest {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

/// The sign-up form.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SignupForm {
    pub fullname: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<RegisterRequest, ValidationErrors> {
        let mut checks = Checks::default();
        checks.required("fullname", &self.fullname, "Name is required");
        checks.email(&self.email);
        checks.password(&self.password);
        if self.confirm_password.is_empty() {
            checks.fail("confirm_password", "Please confirm your password");
        } else if self.confirm_password != self.password {
            checks.fail("confirm_password", "Passwords do not match");
        }
        checks.finish(RegisterRequest {
            fullname: self.fullname.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparsable_amount_is_coerced_not_rejected() {
        let input = ExpenseDraft::new("Snacks", "abc", "Food").validate().unwrap();
        assert_eq!(input.amount, 0.0);
        assert_eq!(input.description, "Snacks");
    }

    #[test]
    fn missing_expense_fields_are_reported_per_field() {
        let errors = ExpenseDraft::new(" ", "", "Food").validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("description"), Some("Description is required"));
        assert_eq!(errors.get("amount"), Some("Amount is required"));
        assert_eq!(errors.get("category"), None);
    }

    #[test]
    fn draft_set_by_field_name() {
        let mut draft = ExpenseDraft::default();
        assert!(draft.set("amount", "12"));
        assert!(!draft.set("colour", "red"));
        assert_eq!(draft.amount, "12");
    }

    #[test]
    fn login_checks_email_and_password() {
        let form = LoginForm {
            email: "not-an-email".to_string(),
            password: "123".to_string(),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("email"), Some("Invalid email format"));
        assert_eq!(
            errors.get("password"),
            Some("Password must be at least 6 characters long")
        );
    }

    #[test]
    fn login_accepts_valid_form() {
        let form = LoginForm {
            email: " asha@example.com ".to_string(),
            password: "secret1".to_string(),
        };
        let request = form.validate().unwrap();
        assert_eq!(request.email, "asha@example.com");
    }

    #[test]
    fn email_pattern_edges() {
        assert!(looks_like_email("a@b"));
        assert!(looks_like_email("a@@"));
        assert!(!looks_like_email("@ab"));
        assert!(!looks_like_email("ab@"));
        assert!(!looks_like_email("a @b"));
    }

    #[test]
    fn signup_requires_matching_confirmation() {
        let mut form = SignupForm {
            fullname: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret2".to_string(),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("confirm_password"), Some("Passwords do not match"));

        form.confirm_password = form.password.clone();
        assert_eq!(form.validate().unwrap().fullname, "Asha");
    }

    #[test]
    fn empty_signup_lists_every_field() {
        let errors = SignupForm::default().validate().unwrap_err();
        assert_eq!(errors.get("fullname"), Some("Name is required"));
        assert_eq!(errors.get("email"), Some("Email is required"));
        assert_eq!(errors.get("password"), Some("Password is required"));
        assert_eq!(
            errors.get("confirm_password"),
            Some("Please confirm your password")
        );
    }
}
