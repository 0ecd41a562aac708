//! Local, synchronous field validation.
//!
//! Validation here is shallow on purpose: presence, numeric parsability and
//! a minimal email shape. It runs before submission and never touches the
//! network; the server remains the authority on anything deeper.

use std::collections::BTreeMap;

/// Field name to message, in stable field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Requires a non-blank value.
pub fn require(errors: &mut ValidationErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.insert(field, format!("{} is required", label(field)));
    }
}

/// Requires a non-blank value that parses as a non-negative number.
pub fn require_numeric(errors: &mut ValidationErrors, field: &str, value: &str) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.insert(field, format!("{} is required", label(field)));
    } else if trimmed.parse::<f64>().map(|n| n < 0.0).unwrap_or(true) {
        errors.insert(field, format!("{} must be a non-negative number", label(field)));
    }
}

/// Requires something shaped like an email address: one `@` with a dotted
/// domain after it.
pub fn require_email(errors: &mut ValidationErrors, field: &str, value: &str) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.insert(field, format!("{} is required", label(field)));
        return;
    }
    let valid = match trimmed.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        errors.insert(field, format!("{} must be a valid email address", label(field)));
    }
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_rejected() {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "first_name", "  ");
        require(&mut errors, "last_name", "Okafor");
        assert_eq!(errors.get("first_name"), Some("first name is required"));
        assert_eq!(errors.get("last_name"), None);
    }

    #[test]
    fn numeric_check_rejects_garbage_and_negatives() {
        let mut errors = ValidationErrors::new();
        require_numeric(&mut errors, "unit_price", "12.50");
        require_numeric(&mut errors, "stock_qty", "-3");
        require_numeric(&mut errors, "reorder_level", "lots");
        assert!(errors.get("unit_price").is_none());
        assert!(errors.get("stock_qty").is_some());
        assert!(errors.get("reorder_level").is_some());
    }

    #[test]
    fn email_check_accepts_plain_addresses() {
        let mut errors = ValidationErrors::new();
        require_email(&mut errors, "email", "nurse@ward.example.org");
        assert!(errors.is_empty());

        require_email(&mut errors, "email", "not-an-email");
        assert!(errors.get("email").is_some());
    }
}
