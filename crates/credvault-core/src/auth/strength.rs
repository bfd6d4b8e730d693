//! Password-strength scoring for registration.
//!
//! Pure and synchronous. Five required checks score one point each, plus
//! a bonus point for length >= 12; a password is acceptable at four
//! points or more. Feedback lists the unmet required checks in a fixed
//! order so the UI can render it deterministically.

/// Minimum score for a password to be accepted.
const MIN_VALID_SCORE: u8 = 4;

const FEEDBACK_LENGTH: &str = "Must be at least 8 characters long";
const FEEDBACK_UPPERCASE: &str = "Must include at least one uppercase letter";
const FEEDBACK_LOWERCASE: &str = "Must include at least one lowercase letter";
const FEEDBACK_DIGIT: &str = "Must include at least one digit";
const FEEDBACK_SYMBOL: &str = "Must include at least one symbol";

/// The outcome of scoring one password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrengthReport {
    /// Whether the password meets the acceptance threshold.
    pub is_valid: bool,
    /// 0-6: one point per required check met, plus the length bonus.
    pub score: u8,
    /// One message per unmet required check, in fixed order:
    /// length, uppercase, lowercase, digit, symbol. The length bonus
    /// never produces feedback.
    pub feedback: Vec<&'static str>,
}

/// Score a candidate master password.
pub fn score_password(password: &str) -> StrengthReport {
    let mut score = 0u8;
    let mut feedback = Vec::new();

    let length = password.chars().count();

    if length >= 8 {
        score += 1;
    } else {
        feedback.push(FEEDBACK_LENGTH);
    }

    if password.chars().any(|c| c.is_ascii_uppercase()) {
        score += 1;
    } else {
        feedback.push(FEEDBACK_UPPERCASE);
    }

    if password.chars().any(|c| c.is_ascii_lowercase()) {
        score += 1;
    } else {
        feedback.push(FEEDBACK_LOWERCASE);
    }

    if password.chars().any(|c| c.is_ascii_digit()) {
        score += 1;
    } else {
        feedback.push(FEEDBACK_DIGIT);
    }

    // Anything outside ASCII alphanumerics counts as a symbol.
    if password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        score += 1;
    } else {
        feedback.push(FEEDBACK_SYMBOL);
    }

    // Bonus point, no feedback when unmet.
    if length >= 12 {
        score += 1;
    }

    StrengthReport {
        is_valid: score >= MIN_VALID_SCORE,
        score,
        feedback,
    }
}
