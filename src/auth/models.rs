//! Authentication request payloads and their validation
//!
//! Login carries no validator on purpose: whatever is wrong with the
//! credentials, the handler answers with the same generic message, and a
//! field-level error here would leak more than that.

use serde::Deserialize;

use crate::common::{is_valid_email, ValidationResult, Validator};

/// POST /api/auth/register body
#[derive(Deserialize, Debug)]
pub struct RegisterPayload {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// POST /api/auth/login body
#[derive(Deserialize, Debug)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/forgotpassword body
#[derive(Deserialize, Debug)]
pub struct ForgotPasswordPayload {
    pub email: String,
}

/// PATCH /api/auth/resetpassword/:reset_token body
#[derive(Deserialize, Debug)]
pub struct ResetPasswordPayload {
    pub password: String,
}

fn check_password(result: &mut ValidationResult, password: &str) {
    if password.len() < 8 {
        result.add_error("password", "Password must be at least 8 characters");
    } else if password.len() > 32 {
        result.add_error("password", "Password must be at most 32 characters");
    }
}

impl Validator<RegisterPayload> for RegisterPayload {
    fn validate(&self, data: &RegisterPayload) -> ValidationResult {
        let mut result = ValidationResult::new();

        if data.name.trim().is_empty() {
            result.add_error("name", "Name is required");
        }
        if !is_valid_email(&data.email) {
            result.add_error("email", "Email is invalid");
        }
        check_password(&mut result, &data.password);

        result
    }
}

impl Validator<ForgotPasswordPayload> for ForgotPasswordPayload {
    fn validate(&self, data: &ForgotPasswordPayload) -> ValidationResult {
        let mut result = ValidationResult::new();

        if !is_valid_email(&data.email) {
            result.add_error("email", "Email is invalid");
        }

        result
    }
}

impl Validator<ResetPasswordPayload> for ResetPasswordPayload {
    fn validate(&self, data: &ResetPasswordPayload) -> ValidationResult {
        let mut result = ValidationResult::new();
        check_password(&mut result, &data.password);
        result
    }
}
