use crate::settings::PassphraseMandates;
use crate::ApiError;

#[derive(Debug, Default, PartialEq, Eq)]
struct Composition {
    length: u32,
    upper: u32,
    lower: u32,
    digit: u32,
    special: u32,
}

impl Composition {
    fn of(passphrase: &str) -> Self {
        let mut composition = Composition::default();
        for c in passphrase.chars() {
            composition.length += 1;
            if c.is_uppercase() {
                composition.upper += 1;
            } else if c.is_lowercase() {
                composition.lower += 1;
            } else if c.is_numeric() {
                composition.digit += 1;
            } else {
                composition.special += 1;
            }
        }
        composition
    }
}

/// Check a private key passphrase against the configured mandates.
pub fn assert_passphrase_complexity(passphrase: &str, mandates: &PassphraseMandates) -> Result<(), ApiError> {
    if passphrase.trim().is_empty() {
        return Err(ApiError::Validation("passphrase may not be null/empty/blank".to_string()));
    }

    let composition = Composition::of(passphrase);
    let checks = [
        (composition.length, mandates.min_length, "passphrase must be at least {n} characters in length"),
        (composition.upper, mandates.min_upper_case, "passphrase must have at least {n} upper-case characters"),
        (composition.lower, mandates.min_lower_case, "passphrase must have at least {n} lower-case characters"),
        (composition.digit, mandates.min_digit, "passphrase must have at least {n} numeric characters"),
        (composition.special, mandates.min_special, "passphrase must have at least {n} special characters"),
    ];
    for (actual, required, message) in checks {
        if actual < required {
            return Err(ApiError::PassphrasePolicy(message.replace("{n}", &required.to_string())));
        }
    }
    Ok(())
}
