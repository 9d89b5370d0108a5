//! Input validation for API requests.
//!
//! Field validators return `Result<(), String>` and are collected into an
//! `ApiError` through the `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Pragmatic email shape check; real verification happens at login.
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

/// Cut-waste percentage bounds for measurements.
pub const PROCENT_DOCINKI_MIN: f64 = 5.0;
pub const PROCENT_DOCINKI_MAX: f64 = 20.0;

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 6 {
        return Err("Password must be at least 6 characters".to_string());
    }

    Ok(())
}

/// Validate a required person-name field (client first/last name)
pub fn validate_name(name: &str, label: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err(format!("{} is required", label));
    }

    if name.len() > 100 {
        return Err(format!("{} is too long (max 100 characters)", label));
    }

    Ok(())
}

/// Validate the cut-waste percentage (optional field)
pub fn validate_procent_docinki(value: &Option<f64>) -> Result<(), String> {
    if let Some(v) = value {
        if *v < PROCENT_DOCINKI_MIN || *v > PROCENT_DOCINKI_MAX {
            return Err(format!(
                "Cut-waste percentage must be between {} and {}",
                PROCENT_DOCINKI_MIN, PROCENT_DOCINKI_MAX
            ));
        }
    }

    Ok(())
}

/// Validate the measured area in m² (optional field)
pub fn validate_pomiar_m2(value: &Option<f64>) -> Result<(), String> {
    if let Some(v) = value {
        if *v <= 0.0 {
            return Err("Measured area must be greater than 0".to_string());
        }
    }

    Ok(())
}

/// Validate lead time in days before installation (optional field)
pub fn validate_dni_przed_montazem(value: &Option<i64>) -> Result<(), String> {
    if let Some(v) = value {
        if *v <= 0 {
            return Err("Days before installation must be greater than 0".to_string());
        }
    }

    Ok(())
}
