//! Employee name rules.
//!
//! Rules are pure predicates evaluated in a fixed order; the first failure is
//! the one reported. Lengths are counted in Unicode scalar values.

use thiserror::Error;

pub const MIN_NAME_CHARS: usize = 2;
pub const MAX_NAME_CHARS: usize = 10;
/// Longest allowed run of one repeated character.
pub const MAX_CONSECUTIVE_REPEATS: usize = 2;

/// Why a candidate name was refused. Display strings are the messages the
/// browser client shows verbatim.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash)]
pub enum NameRejection {
    #[error("El nombre es obligatorio.")]
    EmptyName,
    #[error("El nombre del empleado ya está registrado.")]
    DuplicateName,
    #[error("El nombre no puede superar los 10 caracteres.")]
    TooLong,
    #[error("El nombre debe tener al menos 2 caracteres.")]
    TooShort,
    #[error("El nombre no puede contener números.")]
    ContainsDigit,
    #[error("El nombre contiene caracteres repetidos de forma excesiva.")]
    ExcessiveRepeat,
}

impl NameRejection {
    pub fn code(&self) -> &'static str {
        match self {
            NameRejection::EmptyName => "EMPTY_NAME",
            NameRejection::DuplicateName => "DUPLICATE_NAME",
            NameRejection::TooLong => "TOO_LONG",
            NameRejection::TooShort => "TOO_SHORT",
            NameRejection::ContainsDigit => "CONTAINS_DIGIT",
            NameRejection::ExcessiveRepeat => "EXCESSIVE_REPEAT",
        }
    }
}

/// Full check for a name about to be stored.
///
/// `existing` are names already held by other employees; comparison is exact
/// and case-sensitive. Order: empty, duplicate, too long, too short, digit,
/// repetition.
pub fn validate_new_name<'a, I>(name: &str, existing: I) -> Result<(), NameRejection>
where
    I: IntoIterator<Item = &'a str>,
{
    if name.is_empty() {
        return Err(NameRejection::EmptyName);
    }
    if existing.into_iter().any(|taken| taken == name) {
        return Err(NameRejection::DuplicateName);
    }
    validate_name_shape(name)
}

/// Every rule except uniqueness.
pub fn validate_name_shape(name: &str) -> Result<(), NameRejection> {
    if name.is_empty() {
        return Err(NameRejection::EmptyName);
    }
    let chars = name.chars().count();
    if chars > MAX_NAME_CHARS {
        return Err(NameRejection::TooLong);
    }
    if chars < MIN_NAME_CHARS {
        return Err(NameRejection::TooShort);
    }
    if name.chars().any(|ch| ch.is_ascii_digit()) {
        return Err(NameRejection::ContainsDigit);
    }
    if longest_run(name) > MAX_CONSECUTIVE_REPEATS {
        return Err(NameRejection::ExcessiveRepeat);
    }
    Ok(())
}

/// Length of the longest run of one character repeated back to back.
pub fn longest_run(name: &str) -> usize {
    let mut longest = 0;
    let mut run = 0;
    let mut previous = None;
    for ch in name.chars() {
        if previous == Some(ch) {
            run += 1;
        } else {
            previous = Some(ch);
            run = 1;
        }
        longest = longest.max(run);
    }
    longest
}
