#![forbid(unsafe_code)]

//! Submission validation for formkit forms.
//!
//! - A core [`Validator`] trait with built-ins for required values, length
//!   bounds, regex patterns, email, numeric ranges, ISO dates and option
//!   membership
//! - Composition via [`And`], [`All`] and [`WithMessage`]
//! - [`validate_submission`] applies each input field's rules to a submission
//!
//! ```rust
//! use formkit_validation::{And, MinLength, Required, Validator};
//!
//! let username = And::new(Required::new(), MinLength::new(3));
//! assert!(username.validate("alice").is_valid());
//! assert!(!username.validate("ab").is_valid());
//! ```

mod submission;
mod validators;

pub use submission::{
    ERROR_CODE_MULTIPLE, Submission, SubmissionReport, SubmittedValue, validate_field,
    validate_submission, validator_for,
};
pub use validators::{
    // Composition
    All,
    And,
    // Error codes
    ERROR_CODE_DATE,
    ERROR_CODE_EMAIL,
    ERROR_CODE_MAX_LENGTH,
    ERROR_CODE_MIN_LENGTH,
    ERROR_CODE_NUMBER,
    ERROR_CODE_OPTION,
    ERROR_CODE_PATTERN,
    ERROR_CODE_RANGE,
    ERROR_CODE_REQUIRED,
    // Built-in validators
    AnyNumber,
    Email,
    IsoDate,
    MaxLength,
    MinLength,
    Numeric,
    OneOf,
    Pattern,
    Range,
    Required,
    // Core types
    ValidationError,
    ValidationResult,
    Validator,
    WithMessage,
};
