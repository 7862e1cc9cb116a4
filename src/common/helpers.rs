// Helper functions for safe logging

/// Masks email addresses for safe logging
/// Keeps the first character of the local part and the full domain
///
/// # Example
/// ```
/// let masked = safe_email_log("user@example.com");
/// // Returns: "u***@example.com"
/// ```
pub fn safe_email_log(email: &str) -> String {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || email.chars().count() <= 3 {
        return "***@***.***".to_string();
    }

    // The local part may be non-ASCII; take chars, not bytes
    let head: String = parts[0].chars().take(1).collect();
    format!("{}***@{}", head, parts[1])
}

/// Masks tokens for safe logging
/// Shows only the first and last 4 characters
///
/// # Example
/// ```
/// let masked = safe_token_log("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9");
/// // Returns: "eyJh...VCJ9"
/// ```
pub fn safe_token_log(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
