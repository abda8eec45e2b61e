//! Input validation shared by the backend and the browser till

use rust_decimal::Decimal;

/// Validate a unit count (sale, return, purchase)
pub fn validate_quantity(quantity: i32) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be greater than 0");
    }
    Ok(())
}

/// Validate a price that must be strictly positive
pub fn validate_price(price: Decimal) -> Result<(), &'static str> {
    if price <= Decimal::ZERO {
        return Err("Price must be greater than 0");
    }
    Ok(())
}

/// Validate an amount that may be zero (refunds, amounts paid, credit limits)
pub fn validate_non_negative_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    Ok(())
}

/// Validate a stock level given at product creation or a reorder level
pub fn validate_stock_level(level: i32) -> Result<(), &'static str> {
    if level < 0 {
        return Err("Stock level cannot be negative");
    }
    Ok(())
}

/// Validate username (3-50 characters, alphanumeric, `_`, `.` or `-`)
pub fn validate_username(username: &str) -> Result<(), &'static str> {
    if username.len() < 3 || username.len() > 50 {
        return Err("Username must be 3 to 50 characters");
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err("Username may only contain letters, digits, '_', '.' and '-'");
    }
    Ok(())
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters");
    }
    Ok(())
}

/// Validate a phone number: 7-15 digits, optional leading `+`, spaces and dashes allowed
pub fn validate_phone(phone: &str) -> Result<(), &'static str> {
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    let allowed = phone
        .chars()
        .enumerate()
        .all(|(i, c)| c.is_ascii_digit() || c == ' ' || c == '-' || (i == 0 && c == '+'));
    if !allowed || !(7..=15).contains(&digits) {
        return Err("Invalid phone number");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
    }

    #[test]
    fn test_validate_prices_and_amounts() {
        assert!(validate_price(dec!(0.01)).is_ok());
        assert!(validate_price(dec!(0)).is_err());
        assert!(validate_non_negative_amount(dec!(0)).is_ok());
        assert!(validate_non_negative_amount(dec!(-0.01)).is_err());
    }

    #[test]
    fn test_validate_stock_level() {
        assert!(validate_stock_level(0).is_ok());
        assert!(validate_stock_level(-1).is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("ama.owusu").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("bad name").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("password123").is_ok());
        assert!(validate_password("short").is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+233 24 123 4567").is_ok());
        assert!(validate_phone("024-123-4567").is_ok());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("02x1234567").is_err());
    }
}
