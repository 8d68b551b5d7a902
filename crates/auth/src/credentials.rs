//! Local credential validation, run before any network call.

use crate::AuthError;

/// Check an email/password pair and return the normalized email.
pub fn validate_credentials(email: &str, password: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();

    if email.is_empty() {
        return Err(AuthError::InvalidInput("Email is required".to_string()));
    }
    if !is_valid_email(&email) {
        return Err(AuthError::InvalidInput(
            "Please enter a valid email address".to_string(),
        ));
    }
    if password.trim().is_empty() {
        return Err(AuthError::InvalidInput("Password is required".to_string()));
    }

    Ok(email)
}

/// `local@domain.tld`, no whitespace, exactly one `@`.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty() && !domain.starts_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_email() {
        assert_eq!(
            validate_credentials("  Sales@KAOS.com ", "pw").unwrap(),
            "sales@kaos.com"
        );
    }

    #[test]
    fn rejects_malformed_input() {
        for email in ["", "plain", "@kaos.com", "a@b", "a@.com", "a b@kaos.com", "a@@kaos.com", "a@kaos."] {
            assert!(
                matches!(validate_credentials(email, "pw"), Err(AuthError::InvalidInput(_))),
                "{email:?} should be rejected"
            );
        }
        assert!(matches!(
            validate_credentials("a@kaos.com", "   "),
            Err(AuthError::InvalidInput(_))
        ));
    }
}
