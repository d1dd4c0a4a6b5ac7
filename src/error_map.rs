use std::collections::BTreeMap;

use serde::Serialize;

use crate::validity::Constraint;

/// Backend validators whose error codes translate into client constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ServerValidator {
    Alphanumeric,
    StringLength,
    EmailAddress,
    Integer,
    Float,
    Number,
    NumberRange,
    RegularExpression,
    DateRange,
    DateTime,
    NotEmpty,
}

impl ServerValidator {
    pub const ALL: [ServerValidator; 11] = [
        Self::Alphanumeric,
        Self::StringLength,
        Self::EmailAddress,
        Self::Integer,
        Self::Float,
        Self::Number,
        Self::NumberRange,
        Self::RegularExpression,
        Self::DateRange,
        Self::DateTime,
        Self::NotEmpty,
    ];

    /// Error codes this validator emits and the constraint each stands for.
    pub fn error_codes(self) -> &'static [(u32, Constraint)] {
        match self {
            Self::Alphanumeric => &[(1_221_551_320, Constraint::PatternMismatch)],
            Self::StringLength => &[
                (1_428_504_122, Constraint::TooShort),
                (1_238_108_068, Constraint::TooShort),
                (1_238_108_069, Constraint::TooLong),
            ],
            Self::EmailAddress => &[(1_221_559_976, Constraint::TypeMismatch)],
            Self::Integer => &[(1_221_551_320, Constraint::TypeMismatch)],
            Self::Float => &[(1_221_560_288, Constraint::TypeMismatch)],
            Self::Number => &[(1_221_560_494, Constraint::TypeMismatch)],
            Self::NumberRange => &[
                (1_221_563_685, Constraint::TypeMismatch),
                (1_221_561_046, Constraint::RangeUnderflow),
            ],
            Self::RegularExpression => &[(1_221_565_130, Constraint::PatternMismatch)],
            Self::DateRange => &[],
            Self::DateTime => &[(1_238_087_674, Constraint::TypeMismatch)],
            Self::NotEmpty => &[
                (1_221_560_910, Constraint::ValueMissing),
                (1_221_560_718, Constraint::ValueMissing),
                (1_347_992_400, Constraint::ValueMissing),
                (1_347_992_453, Constraint::ValueMissing),
            ],
        }
    }
}

/// Constraint for a backend error code. Codes shared by several validators
/// resolve to the first validator in [`ServerValidator::ALL`] order.
pub fn constraint_for_error_code(code: u32) -> Option<Constraint> {
    ServerValidator::ALL
        .iter()
        .flat_map(|validator| validator.error_codes())
        .find(|(known, _)| *known == code)
        .map(|(_, constraint)| *constraint)
}

/// Constraint to error codes for one validator, codes in declaration order.
pub fn inverse_map(validator: ServerValidator) -> BTreeMap<Constraint, Vec<u32>> {
    let mut map: BTreeMap<Constraint, Vec<u32>> = BTreeMap::new();
    for (code, constraint) in validator.error_codes() {
        map.entry(*constraint).or_default().push(*code);
    }
    map
}

/// Code reported for a server error rewritten as a client constraint.
pub fn constraint_code(constraint: Constraint) -> Option<u32> {
    match constraint {
        Constraint::TypeMismatch => Some(1_580_509_080),
        Constraint::ValueMissing => Some(1_580_509_091),
        _ => None,
    }
}

/// A backend error translated for the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedError {
    pub code: u32,
    pub message: String,
    pub constraint: Option<Constraint>,
}

/// Translates a backend error. Mapped errors take the constraint's own code
/// when it has one; a configured message for the original code replaces the
/// message and restores the original code.
pub fn map_server_error(
    code: u32,
    message: &str,
    custom_messages: &[(u32, String)],
) -> MappedError {
    let constraint = constraint_for_error_code(code);
    let mut mapped = MappedError {
        code: constraint.and_then(constraint_code).unwrap_or(code),
        message: message.to_string(),
        constraint,
    };
    if let Some((_, custom)) = custom_messages
        .iter()
        .find(|(known, custom)| *known == code && !custom.is_empty())
    {
        mapped.message = custom.clone();
        mapped.code = code;
    }
    mapped
}
