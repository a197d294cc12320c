#![forbid(unsafe_code)]

//! Validator trait, error values and the built-in field rules.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::Serialize;
use time::Date;
use time::format_description::well_known::Iso8601;

/// Stable codes carried by [`ValidationError::code`], for hosts that
/// translate messages.
pub const ERROR_CODE_REQUIRED: &str = "required";
pub const ERROR_CODE_MIN_LENGTH: &str = "too_short";
pub const ERROR_CODE_MAX_LENGTH: &str = "too_long";
pub const ERROR_CODE_PATTERN: &str = "pattern";
pub const ERROR_CODE_EMAIL: &str = "email";
/// A number outside the field's `min`/`max`.
pub const ERROR_CODE_RANGE: &str = "range";
pub const ERROR_CODE_NUMBER: &str = "not_a_number";
pub const ERROR_CODE_DATE: &str = "date";
/// A choice that is not among the field's option values.
pub const ERROR_CODE_OPTION: &str = "invalid_option";

/// One failed rule.
///
/// `message` may hold `{name}` placeholders that [`format_message`] fills
/// from `params`.
///
/// ```rust
/// use formkit_validation::ValidationError;
///
/// let error = ValidationError::new("too_short", "Use {min} or more characters")
///     .with_param("min", 8);
///
/// assert_eq!(error.format_message(), "Use 8 or more characters");
/// ```
///
/// [`format_message`]: ValidationError::format_message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
    pub params: BTreeMap<String, String>,
}

impl ValidationError {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            params: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    /// The message with every `{name}` placeholder substituted.
    #[must_use]
    pub fn format_message(&self) -> String {
        self.params
            .iter()
            .fold(self.message.clone(), |text, (name, value)| {
                text.replace(&format!("{{{name}}}"), value)
            })
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_message())
    }
}

impl std::error::Error for ValidationError {}

/// Outcome of running one [`Validator`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValidationResult {
    #[default]
    Valid,
    Invalid(ValidationError),
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    #[must_use]
    pub fn is_invalid(&self) -> bool {
        !self.is_valid()
    }

    #[must_use]
    pub fn error(&self) -> Option<&ValidationError> {
        if let Self::Invalid(error) = self {
            Some(error)
        } else {
            None
        }
    }

    #[must_use]
    pub fn into_error(self) -> Option<ValidationError> {
        if let Self::Invalid(error) = self {
            Some(error)
        } else {
            None
        }
    }

    /// Run `next` only if this result is valid.
    ///
    /// The first failure wins and later rules are never evaluated.
    #[must_use]
    pub fn and_then(self, next: impl FnOnce() -> Self) -> Self {
        match self {
            Self::Valid => next(),
            invalid @ Self::Invalid(_) => invalid,
        }
    }
}

/// A rule applied to one submitted value.
///
/// Empty input passes every validator except [`Required`], so optional
/// fields can carry format rules.
pub trait Validator<T: ?Sized>: Send + Sync {
    fn validate(&self, value: &T) -> ValidationResult;

    /// Message template reported on failure.
    fn error_message(&self) -> &str;
}

impl<T: ?Sized, V: Validator<T> + ?Sized> Validator<T> for Box<V> {
    fn validate(&self, value: &T) -> ValidationResult {
        (**self).validate(value)
    }

    fn error_message(&self) -> &str {
        (**self).error_message()
    }
}

const REQUIRED_MESSAGE: &str = "This field is required";

/// Rejects empty input. Whitespace counts as empty unless
/// [`keep_whitespace`](Required::keep_whitespace) is set.
#[derive(Debug, Clone, Copy)]
pub struct Required {
    pub trim: bool,
}

impl Default for Required {
    fn default() -> Self {
        Self { trim: true }
    }
}

impl Required {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn keep_whitespace(self) -> Self {
        Self { trim: false }
    }
}

impl Validator<str> for Required {
    fn validate(&self, value: &str) -> ValidationResult {
        let value = if self.trim { value.trim() } else { value };
        if value.is_empty() {
            ValidationResult::Invalid(ValidationError::new(ERROR_CODE_REQUIRED, REQUIRED_MESSAGE))
        } else {
            ValidationResult::Valid
        }
    }

    fn error_message(&self) -> &str {
        REQUIRED_MESSAGE
    }
}

fn length_error(code: &'static str, template: &str, bound: (&str, usize), len: usize) -> ValidationResult {
    ValidationResult::Invalid(
        ValidationError::new(code, template)
            .with_param(bound.0, bound.1)
            .with_param("actual", len),
    )
}

const MIN_LENGTH_MESSAGE: &str = "Must be at least {min} characters";
const MAX_LENGTH_MESSAGE: &str = "Must be at most {max} characters";

/// Lower bound on the character count of non-empty input.
#[derive(Debug, Clone, Copy)]
pub struct MinLength(pub usize);

impl MinLength {
    #[must_use]
    pub fn new(min: usize) -> Self {
        Self(min)
    }
}

impl Validator<str> for MinLength {
    fn validate(&self, value: &str) -> ValidationResult {
        match value.chars().count() {
            len if len > 0 && len < self.0 => {
                length_error(ERROR_CODE_MIN_LENGTH, MIN_LENGTH_MESSAGE, ("min", self.0), len)
            }
            _ => ValidationResult::Valid,
        }
    }

    fn error_message(&self) -> &str {
        MIN_LENGTH_MESSAGE
    }
}

/// Upper bound on the character count.
#[derive(Debug, Clone, Copy)]
pub struct MaxLength(pub usize);

impl MaxLength {
    #[must_use]
    pub fn new(max: usize) -> Self {
        Self(max)
    }
}

impl Validator<str> for MaxLength {
    fn validate(&self, value: &str) -> ValidationResult {
        match value.chars().count() {
            len if len > self.0 => {
                length_error(ERROR_CODE_MAX_LENGTH, MAX_LENGTH_MESSAGE, ("max", self.0), len)
            }
            _ => ValidationResult::Valid,
        }
    }

    fn error_message(&self) -> &str {
        MAX_LENGTH_MESSAGE
    }
}

/// Validates that the whole string matches a regular expression.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
    message: String,
}

impl Pattern {
    /// Compile `pattern`, anchored at both ends.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(Self {
            source: pattern.to_owned(),
            regex,
            message: "Invalid format".to_owned(),
        })
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Pattern as written, without anchors.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Validator<str> for Pattern {
    fn validate(&self, value: &str) -> ValidationResult {
        if value.is_empty() || self.regex.is_match(value) {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid(
                ValidationError::new(ERROR_CODE_PATTERN, &self.message)
                    .with_param("pattern", &self.source),
            )
        }
    }

    fn error_message(&self) -> &str {
        &self.message
    }
}

/// Validates that a string is a plausible email address.
///
/// Checks for text on both sides of a single `@` and a dotted domain whose
/// last label has at least two characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Email;

impl Email {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn is_plausible(value: &str) -> bool {
        let Some((local, domain)) = value.split_once('@') else {
            return false;
        };
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return false;
        }
        if value.chars().any(char::is_whitespace) {
            return false;
        }
        let labels: Vec<&str> = domain.split('.').collect();
        labels.len() >= 2
            && labels.iter().all(|label| !label.is_empty())
            && labels.last().is_some_and(|tld| tld.len() >= 2)
    }
}

impl Validator<str> for Email {
    fn validate(&self, value: &str) -> ValidationResult {
        let trimmed = value.trim();
        if trimmed.is_empty() || Self::is_plausible(trimmed) {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid(ValidationError::new(
                ERROR_CODE_EMAIL,
                "Invalid email address",
            ))
        }
    }

    fn error_message(&self) -> &str {
        "Invalid email address"
    }
}

const RANGE_MESSAGE: &str = "Must be between {min} and {max}";

/// Inclusive bounds on an ordered value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range<T> {
    pub min: T,
    pub max: T,
}

impl<T> Range<T> {
    #[must_use]
    pub fn new(min: T, max: T) -> Self {
        Self { min, max }
    }
}

impl Range<f64> {
    /// Bounds from optional field rules; a missing side is unbounded.
    ///
    /// `None` when neither side is set.
    #[must_use]
    pub fn from_rules(min: Option<f64>, max: Option<f64>) -> Option<Self> {
        if min.is_none() && max.is_none() {
            return None;
        }
        Some(Self::new(
            min.unwrap_or(f64::NEG_INFINITY),
            max.unwrap_or(f64::INFINITY),
        ))
    }
}

impl<T> Validator<T> for Range<T>
where
    T: PartialOrd + fmt::Display + Send + Sync,
{
    fn validate(&self, value: &T) -> ValidationResult {
        if (&self.min..=&self.max).contains(&value) {
            return ValidationResult::Valid;
        }
        ValidationResult::Invalid(
            ValidationError::new(ERROR_CODE_RANGE, RANGE_MESSAGE)
                .with_param("min", &self.min)
                .with_param("max", &self.max)
                .with_param("actual", value),
        )
    }

    fn error_message(&self) -> &str {
        RANGE_MESSAGE
    }
}

/// Accepts every number; the default bound of [`Numeric`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyNumber;

impl Validator<f64> for AnyNumber {
    fn validate(&self, _: &f64) -> ValidationResult {
        ValidationResult::Valid
    }

    fn error_message(&self) -> &str {
        ""
    }
}

const NUMBER_MESSAGE: &str = "Must be a number";

/// Parses text as a finite number, then checks it with a numeric validator.
///
/// ```rust
/// use formkit_validation::{Numeric, Range, Validator};
///
/// let seats = Numeric::within(Range::new(1.0, 4.0));
/// assert!(seats.validate("2").is_valid());
/// assert!(seats.validate("9").is_invalid());
/// assert!(seats.validate("two").is_invalid());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Numeric<V = AnyNumber> {
    pub bound: V,
}

impl Numeric {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<V: Validator<f64>> Numeric<V> {
    #[must_use]
    pub fn within(bound: V) -> Self {
        Self { bound }
    }
}

impl<V: Validator<f64>> Validator<str> for Numeric<V> {
    fn validate(&self, value: &str) -> ValidationResult {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return ValidationResult::Valid;
        }
        match trimmed.parse::<f64>() {
            Ok(number) if number.is_finite() => self.bound.validate(&number),
            _ => ValidationResult::Invalid(
                ValidationError::new(ERROR_CODE_NUMBER, NUMBER_MESSAGE)
                    .with_param("actual", trimmed),
            ),
        }
    }

    fn error_message(&self) -> &str {
        NUMBER_MESSAGE
    }
}

/// Validates an ISO 8601 calendar date (`YYYY-MM-DD`).
#[derive(Debug, Clone, Copy, Default)]
pub struct IsoDate;

impl Validator<str> for IsoDate {
    fn validate(&self, value: &str) -> ValidationResult {
        let trimmed = value.trim();
        if trimmed.is_empty() || Date::parse(trimmed, &Iso8601::DATE).is_ok() {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid(
                ValidationError::new(ERROR_CODE_DATE, "Must be a date (YYYY-MM-DD)")
                    .with_param("actual", trimmed),
            )
        }
    }

    fn error_message(&self) -> &str {
        "Must be a date (YYYY-MM-DD)"
    }
}

/// Validates that a string is one of a fixed set of values.
#[derive(Debug, Clone, Default)]
pub struct OneOf {
    pub allowed: Vec<String>,
}

impl OneOf {
    #[must_use]
    pub fn new(allowed: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator<str> for OneOf {
    fn validate(&self, value: &str) -> ValidationResult {
        if value.is_empty() || self.allowed.iter().any(|allowed| allowed == value) {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid(
                ValidationError::new(ERROR_CODE_OPTION, "Not one of the available options")
                    .with_param("actual", value),
            )
        }
    }

    fn error_message(&self) -> &str {
        "Not one of the available options"
    }
}

/// Two validators in sequence; `second` runs only when `first` passes.
#[derive(Debug, Clone)]
pub struct And<A, B> {
    pub first: A,
    pub second: B,
}

impl<A, B> And<A, B> {
    #[must_use]
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<T: ?Sized, A, B> Validator<T> for And<A, B>
where
    A: Validator<T>,
    B: Validator<T>,
{
    fn validate(&self, value: &T) -> ValidationResult {
        self.first
            .validate(value)
            .and_then(|| self.second.validate(value))
    }

    fn error_message(&self) -> &str {
        self.first.error_message()
    }
}

/// A list of boxed validators applied in order; the first failure is reported.
pub struct All<T: ?Sized> {
    validators: Vec<Box<dyn Validator<T>>>,
}

impl<T: ?Sized> All<T> {
    #[must_use]
    pub fn new(validators: Vec<Box<dyn Validator<T>>>) -> Self {
        Self { validators }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl<T: ?Sized> Validator<T> for All<T> {
    fn validate(&self, value: &T) -> ValidationResult {
        self.validators
            .iter()
            .fold(ValidationResult::Valid, |result, validator| {
                result.and_then(|| validator.validate(value))
            })
    }

    fn error_message(&self) -> &str {
        match self.validators.first() {
            Some(validator) => validator.error_message(),
            None => "Validation failed",
        }
    }
}

impl<T: ?Sized> fmt::Debug for All<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("All")
            .field("len", &self.validators.len())
            .finish_non_exhaustive()
    }
}

/// Replaces the message of every error the inner validator reports.
///
/// The code and params are kept, so `{min}` style placeholders still work.
#[derive(Debug, Clone)]
pub struct WithMessage<V> {
    pub inner: V,
    pub message: String,
}

impl<V> WithMessage<V> {
    #[must_use]
    pub fn new(inner: V, message: impl Into<String>) -> Self {
        Self {
            inner,
            message: message.into(),
        }
    }
}

impl<T: ?Sized, V> Validator<T> for WithMessage<V>
where
    V: Validator<T>,
{
    fn validate(&self, value: &T) -> ValidationResult {
        match self.inner.validate(value) {
            ValidationResult::Valid => ValidationResult::Valid,
            ValidationResult::Invalid(mut error) => {
                error.message.clone_from(&self.message);
                ValidationResult::Invalid(error)
            }
        }
    }

    fn error_message(&self) -> &str {
        &self.message
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn required_rejects_blank() {
        assert!(Required::new().validate("x").is_valid());
        assert!(Required::new().validate("   ").is_invalid());
        assert!(Required::new().keep_whitespace().validate("   ").is_valid());
    }

    #[test]
    fn length_bounds_count_chars() {
        let min = MinLength::new(3);
        assert!(min.validate("").is_valid());
        assert!(min.validate("ab").is_invalid());
        assert!(min.validate("äöü").is_valid());

        let err = MaxLength::new(2).validate("abc").into_error().expect("too long");
        assert_eq!(err.code, ERROR_CODE_MAX_LENGTH);
        assert_eq!(err.format_message(), "Must be at most 2 characters");
        assert_eq!(err.params["actual"], "3");
    }

    #[test]
    fn pattern_matches_whole_value() {
        let zip = Pattern::new(r"\d{5}").expect("valid regex");
        assert!(zip.validate("12345").is_valid());
        assert!(zip.validate("123456").is_invalid());
        assert!(zip.validate("").is_valid());
        assert!(Pattern::new("(").is_err());

        let custom = zip.with_message("Five digits please");
        let err = custom.validate("abc").into_error().expect("mismatch");
        assert_eq!(err.message, "Five digits please");
        assert_eq!(err.params["pattern"], r"\d{5}");
    }

    #[test]
    fn email_heuristics() {
        let email = Email::new();
        assert!(email.validate("ada@example.org").is_valid());
        assert!(email.validate("").is_valid());
        for bad in ["ada", "@example.org", "ada@", "ada@example", "ada@example.c", "a@b@c.de", "a b@c.de"] {
            assert!(email.validate(bad).is_invalid(), "{bad} should be rejected");
        }
    }

    #[test]
    fn numeric_parses_then_bounds() {
        let age = Numeric::within(Range::new(18.0, f64::INFINITY));
        assert!(age.validate("42").is_valid());
        assert!(age.validate(" 18 ").is_valid());
        assert!(age.validate("").is_valid());
        let err = age.validate("17").into_error().expect("below minimum");
        assert_eq!(err.code, ERROR_CODE_RANGE);
        assert_eq!(err.params["min"], "18");
        assert_eq!(
            age.validate("old").into_error().map(|e| e.code),
            Some(ERROR_CODE_NUMBER)
        );
        assert!(Numeric::new().validate("NaN").is_invalid());
        assert!(Numeric::new().validate("1e400").is_invalid());
    }

    #[test]
    fn range_from_rules_fills_missing_side() {
        assert_eq!(Range::from_rules(None, None), None);
        let upper = Range::from_rules(None, Some(4.0)).expect("bounded");
        assert_eq!(upper.min, f64::NEG_INFINITY);
        assert!(upper.validate(&-1e9).is_valid());
        assert!(upper.validate(&4.5).is_invalid());
        assert!(Range::new(1, 3).validate(&2).is_valid());
    }

    #[test]
    fn iso_date_accepts_calendar_dates() {
        assert!(IsoDate.validate("2024-02-29").is_valid());
        assert!(IsoDate.validate("2023-02-29").is_invalid());
        assert!(IsoDate.validate("29/02/2024").is_invalid());
    }

    #[test]
    fn one_of_checks_membership() {
        let choice = OneOf::new(["a", "b"]);
        assert!(choice.validate("a").is_valid());
        assert!(choice.validate("c").is_invalid());
    }

    #[test]
    fn composition_stops_at_first_error() {
        let v = And::new(Required::new(), MinLength::new(3));
        assert_eq!(
            v.validate("").into_error().map(|e| e.code),
            Some(ERROR_CODE_REQUIRED)
        );
        let all: All<str> = All::new(vec![Box::new(MinLength::new(2)), Box::new(MaxLength::new(3))]);
        assert!(all.validate("abc").is_valid());
        assert_eq!(
            all.validate("abcd").into_error().map(|e| e.code),
            Some(ERROR_CODE_MAX_LENGTH)
        );
    }

    #[test]
    fn and_then_skips_later_rules_after_a_failure() {
        let failed = ValidationResult::Invalid(ValidationError::new(ERROR_CODE_EMAIL, "bad"));
        let result = failed.and_then(|| panic!("later rule evaluated"));
        assert_eq!(result.error().map(|e| e.code), Some(ERROR_CODE_EMAIL));
        assert!(ValidationResult::Valid.and_then(|| ValidationResult::Valid).is_valid());
    }

    #[test]
    fn with_message_keeps_code_and_params() {
        let v = WithMessage::new(MinLength::new(4), "Need {min}+");
        let err = v.validate("ab").into_error().expect("too short");
        assert_eq!(err.code, ERROR_CODE_MIN_LENGTH);
        assert_eq!(err.format_message(), "Need 4+");
    }

    proptest! {
        #[test]
        fn length_validators_agree_with_char_count(value in "\\PC{0,20}", bound in 0usize..20) {
            let len = value.chars().count();
            prop_assert_eq!(MaxLength::new(bound).validate(&value).is_valid(), len <= bound);
            prop_assert_eq!(
                MinLength::new(bound).validate(&value).is_valid(),
                len == 0 || len >= bound
            );
        }
    }
}
