use anyhow::{Result, anyhow};

pub fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() {
        return Err(anyhow!("Email cannot be empty"));
    }

    if email.chars().any(char::is_whitespace) {
        return Err(anyhow!("Email contains whitespace"));
    }

    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(anyhow!("Email must contain exactly one '@'"));
    };

    if local.is_empty() || domain.is_empty() {
        return Err(anyhow!("Email is missing its local or domain part"));
    }

    Ok(())
}

pub fn validate_phone(phone: &str) -> Result<()> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);

    if digits.len() < 4 {
        return Err(anyhow!("Phone number too short (minimum 4 digits)"));
    }

    if digits.len() > 15 {
        return Err(anyhow!("Phone number too long (maximum 15 digits)"));
    }

    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(anyhow!("Phone number contains invalid characters"));
    }

    Ok(())
}
