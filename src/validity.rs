use std::fmt;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dom::{Dom, NodeId};

/// A named reason a control's value is invalid.
///
/// The declaration order is significant: a constraint's position is its bit
/// index in the bitmask produced by [`bitmask_of`] and the order in which
/// constraints are checked and rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Constraint {
    BadInput,
    PatternMismatch,
    RangeOverflow,
    RangeUnderflow,
    StepMismatch,
    TooLong,
    TooShort,
    TypeMismatch,
    ValueMissing,
    CustomError,
}

impl Constraint {
    pub const ALL: [Constraint; 10] = [
        Constraint::BadInput,
        Constraint::PatternMismatch,
        Constraint::RangeOverflow,
        Constraint::RangeUnderflow,
        Constraint::StepMismatch,
        Constraint::TooLong,
        Constraint::TooShort,
        Constraint::TypeMismatch,
        Constraint::ValueMissing,
        Constraint::CustomError,
    ];

    /// Native constraints, i.e. everything but `customError`.
    pub const NATIVE: [Constraint; 9] = [
        Constraint::BadInput,
        Constraint::PatternMismatch,
        Constraint::RangeOverflow,
        Constraint::RangeUnderflow,
        Constraint::StepMismatch,
        Constraint::TooLong,
        Constraint::TooShort,
        Constraint::TypeMismatch,
        Constraint::ValueMissing,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn bit(self) -> u32 {
        1 << self.index()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Constraint::BadInput => "badInput",
            Constraint::PatternMismatch => "patternMismatch",
            Constraint::RangeOverflow => "rangeOverflow",
            Constraint::RangeUnderflow => "rangeUnderflow",
            Constraint::StepMismatch => "stepMismatch",
            Constraint::TooLong => "tooLong",
            Constraint::TooShort => "tooShort",
            Constraint::TypeMismatch => "typeMismatch",
            Constraint::ValueMissing => "valueMissing",
            Constraint::CustomError => "customError",
        }
    }

    /// Parses a constraint name, ignoring ASCII case (attribute names arrive
    /// lowercased).
    pub fn from_name(name: &str) -> Option<Constraint> {
        Constraint::ALL
            .into_iter()
            .find(|constraint| constraint.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sum of `2^index` over the active constraints.
pub fn bitmask_of<I>(constraints: I) -> u32
where
    I: IntoIterator<Item = Constraint>,
{
    constraints
        .into_iter()
        .fold(0, |mask, constraint| mask | constraint.bit())
}

/// Validity flags of one control, in the shape of the DOM `ValidityState`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidityState {
    pub bad_input: bool,
    pub pattern_mismatch: bool,
    pub range_overflow: bool,
    pub range_underflow: bool,
    pub step_mismatch: bool,
    pub too_long: bool,
    pub too_short: bool,
    pub type_mismatch: bool,
    pub value_missing: bool,
    pub custom_error: bool,
}

impl ValidityState {
    pub fn get(&self, constraint: Constraint) -> bool {
        match constraint {
            Constraint::BadInput => self.bad_input,
            Constraint::PatternMismatch => self.pattern_mismatch,
            Constraint::RangeOverflow => self.range_overflow,
            Constraint::RangeUnderflow => self.range_underflow,
            Constraint::StepMismatch => self.step_mismatch,
            Constraint::TooLong => self.too_long,
            Constraint::TooShort => self.too_short,
            Constraint::TypeMismatch => self.type_mismatch,
            Constraint::ValueMissing => self.value_missing,
            Constraint::CustomError => self.custom_error,
        }
    }

    pub fn set(&mut self, constraint: Constraint, on: bool) {
        let flag = match constraint {
            Constraint::BadInput => &mut self.bad_input,
            Constraint::PatternMismatch => &mut self.pattern_mismatch,
            Constraint::RangeOverflow => &mut self.range_overflow,
            Constraint::RangeUnderflow => &mut self.range_underflow,
            Constraint::StepMismatch => &mut self.step_mismatch,
            Constraint::TooLong => &mut self.too_long,
            Constraint::TooShort => &mut self.too_short,
            Constraint::TypeMismatch => &mut self.type_mismatch,
            Constraint::ValueMissing => &mut self.value_missing,
            Constraint::CustomError => &mut self.custom_error,
        };
        *flag = on;
    }

    pub fn valid(&self) -> bool {
        self.active().next().is_none()
    }

    /// Active constraints in declaration order.
    pub fn active(&self) -> impl Iterator<Item = Constraint> + '_ {
        Constraint::ALL
            .into_iter()
            .filter(|constraint| self.get(*constraint))
    }

    pub fn bitmask(&self) -> u32 {
        bitmask_of(self.active())
    }
}

/// Normalized `type` of an `<input>`; empty for other elements.
pub(crate) fn input_type(dom: &Dom, node: NodeId) -> String {
    if !dom.has_tag(node, "input") {
        return String::new();
    }
    let raw = dom
        .attr(node, "type")
        .unwrap_or_default()
        .to_ascii_lowercase();
    match raw.as_str() {
        "button" | "checkbox" | "color" | "date" | "email" | "file" | "hidden" | "image"
        | "month" | "number" | "password" | "radio" | "range" | "reset" | "search"
        | "submit" | "tel" | "text" | "time" | "url" | "week" => raw,
        _ => "text".to_string(),
    }
}

fn participates_in_constraint_validation(kind: &str) -> bool {
    !matches!(kind, "button" | "submit" | "reset" | "hidden" | "image")
}

pub(crate) fn is_effectively_disabled(dom: &Dom, node: NodeId) -> bool {
    if dom.has_attr(node, "disabled") {
        return true;
    }
    let mut cursor = dom.parent_element(node);
    while let Some(ancestor) = cursor {
        if dom.has_tag(ancestor, "fieldset") && dom.has_attr(ancestor, "disabled") {
            return true;
        }
        cursor = dom.parent_element(ancestor);
    }
    false
}

/// True when any radio sharing `node`'s name within the same form is checked.
pub(crate) fn is_radio_group_checked(dom: &Dom, node: NodeId) -> bool {
    let name = dom.attr(node, "name").unwrap_or_default();
    if name.is_empty() {
        return dom.checked(node);
    }
    let form = dom.find_ancestor_by_tag(node, "form");
    dom.all_element_nodes().into_iter().any(|candidate| {
        input_type(dom, candidate) == "radio"
            && dom.attr(candidate, "name").unwrap_or_default() == name
            && dom.find_ancestor_by_tag(candidate, "form") == form
            && dom.checked(candidate)
    })
}

fn parse_attr_f64(dom: &Dom, node: NodeId, name: &str) -> Option<f64> {
    dom.attr(node, name).and_then(|raw| parse_number_value(&raw))
}

fn parse_attr_i64(dom: &Dom, node: NodeId, name: &str) -> Option<i64> {
    dom.attr(node, name)
        .and_then(|raw| raw.trim().parse::<i64>().ok())
}

fn parse_number_value(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Days since 1970-01-01 for a `YYYY-MM-DD` value.
fn parse_date_value_days(raw: &str) -> Option<i64> {
    let mut parts = raw.trim().splitn(3, '-');
    let (year, month, day) = (parts.next()?, parts.next()?, parts.next()?);
    if year.len() < 4 || month.len() != 2 || day.len() != 2 {
        return None;
    }
    let year = year.parse::<i64>().ok()?;
    let month = month.parse::<u32>().ok()?;
    let day = day.parse::<u32>().ok()?;
    if !(1..=12).contains(&month) || day == 0 || day > days_in_month(year, month) {
        return None;
    }
    // Civil-from-days inverse (Howard Hinnant).
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = (i64::from(month) + 9) % 12;
    let doy = (153 * mp + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    Some(era * 146_097 + doe - 719_468)
}

fn days_in_month(year: i64, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 => 29,
        _ => 28,
    }
}

/// Seconds since midnight for `HH:MM` or `HH:MM:SS`.
fn parse_time_value_seconds(raw: &str) -> Option<i64> {
    let parts = raw.trim().split(':').collect::<Vec<_>>();
    if !(2..=3).contains(&parts.len()) || parts.iter().any(|part| part.len() != 2) {
        return None;
    }
    let hours = parts[0].parse::<i64>().ok().filter(|h| *h < 24)?;
    let minutes = parts[1].parse::<i64>().ok().filter(|m| *m < 60)?;
    let seconds = match parts.get(2) {
        Some(raw) => raw.parse::<i64>().ok().filter(|s| *s < 60)?,
        None => 0,
    };
    Some(hours * 3600 + minutes * 60 + seconds)
}

fn is_ascii_email_local_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-".contains(ch)
}

fn is_valid_email_domain_label(label: &str) -> bool {
    if label.is_empty() || label.len() > 63 {
        return false;
    }
    let bytes = label.as_bytes();
    bytes[0].is_ascii_alphanumeric()
        && bytes[bytes.len() - 1].is_ascii_alphanumeric()
        && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
}

pub(crate) fn is_simple_email(value: &str) -> bool {
    let Some((local, domain)) = value.trim().split_once('@') else {
        return false;
    };
    !local.is_empty()
        && local.chars().all(is_ascii_email_local_char)
        && !domain.is_empty()
        && domain.split('.').all(is_valid_email_domain_label)
}

fn is_email_address_list(value: &str) -> bool {
    value.trim().is_empty()
        || value
            .split(',')
            .all(|part| is_simple_email(part.trim()))
}

fn is_url_like(value: &str) -> bool {
    let Some((scheme, rest)) = value.trim().split_once(':') else {
        return false;
    };
    let mut scheme_chars = scheme.chars();
    scheme_chars.next().is_some_and(|ch| ch.is_ascii_alphabetic())
        && scheme_chars.all(|ch| ch.is_ascii_alphanumeric() || "+-.".contains(ch))
        && !rest.is_empty()
        && !rest.chars().any(char::is_whitespace)
        && (!rest.starts_with("//") || rest.len() > 2)
}

fn is_step_mismatch(value: f64, base: f64, step: f64) -> bool {
    let ratio = (value - base) / step;
    (ratio - ratio.round()).abs() > 1e-7
}

fn check_text_length(dom: &Dom, node: NodeId, value: &str, validity: &mut ValidityState) {
    let value_len = value.chars().count() as i64;
    if let Some(min_len) = parse_attr_i64(dom, node, "minlength") {
        if min_len >= 0 && value_len < min_len {
            validity.too_short = true;
        }
    }
    if let Some(max_len) = parse_attr_i64(dom, node, "maxlength") {
        if max_len >= 0 && value_len > max_len {
            validity.too_long = true;
        }
    }
}

fn check_range<T: PartialOrd + Copy>(
    value: T,
    min: Option<T>,
    max: Option<T>,
    validity: &mut ValidityState,
) {
    if min.is_some_and(|min| value < min) {
        validity.range_underflow = true;
    }
    if max.is_some_and(|max| value > max) {
        validity.range_overflow = true;
    }
}

/// Step size from the `step` attribute; `None` for `step="any"`.
fn step_attr(dom: &Dom, node: NodeId, default: f64) -> Option<f64> {
    let raw = dom.attr(node, "step").unwrap_or_default();
    if raw.trim().eq_ignore_ascii_case("any") {
        return None;
    }
    Some(
        parse_number_value(&raw)
            .filter(|step| *step > 0.0)
            .unwrap_or(default),
    )
}

/// Native constraint validation of one control, as a browser computes
/// `element.validity`. Custom validators are not consulted here.
pub fn compute_validity(dom: &Dom, node: NodeId) -> ValidityState {
    let mut validity = ValidityState::default();
    if is_effectively_disabled(dom, node) {
        return validity;
    }
    let Some(tag_name) = dom.tag_name(node).map(str::to_ascii_lowercase) else {
        return validity;
    };
    let required = dom.has_attr(node, "required");
    let readonly = dom.has_attr(node, "readonly");
    let value = dom.value(node);

    match tag_name.as_str() {
        "textarea" => {
            validity.value_missing = required && !readonly && value.is_empty();
            if !value.is_empty() {
                check_text_length(dom, node, &value, &mut validity);
            }
        }
        "select" => {
            validity.value_missing = required && value.is_empty();
        }
        "input" => compute_input_validity(dom, node, &value, required && !readonly, &mut validity),
        _ => {}
    }
    validity
}

fn compute_input_validity(
    dom: &Dom,
    node: NodeId,
    value: &str,
    required: bool,
    validity: &mut ValidityState,
) {
    let kind = input_type(dom, node);
    if !participates_in_constraint_validation(&kind) {
        return;
    }
    let multiple = dom.has_attr(node, "multiple");
    let email_multiple = kind == "email" && multiple;
    let value_is_empty = if email_multiple {
        value.trim().is_empty()
    } else {
        value.is_empty()
    };

    if required && kind != "range" && kind != "color" {
        validity.value_missing = match kind.as_str() {
            "checkbox" => !dom.checked(node),
            "radio" => !is_radio_group_checked(dom, node),
            "file" => dom.files(node).is_empty(),
            _ => value_is_empty,
        };
    }

    if value_is_empty || matches!(kind.as_str(), "checkbox" | "radio" | "file") {
        return;
    }

    match kind.as_str() {
        "email" => {
            validity.type_mismatch = if email_multiple {
                !is_email_address_list(value)
            } else {
                !is_simple_email(value)
            };
        }
        "url" => validity.type_mismatch = !is_url_like(value),
        _ => {}
    }

    if matches!(
        kind.as_str(),
        "text" | "search" | "url" | "tel" | "email" | "password"
    ) {
        check_text_length(dom, node, value, validity);
        validity.pattern_mismatch = pattern_mismatch(dom, node, value, email_multiple);
    }

    match kind.as_str() {
        "number" | "range" => match parse_number_value(value) {
            Some(numeric) => {
                let min = parse_attr_f64(dom, node, "min");
                check_range(numeric, min, parse_attr_f64(dom, node, "max"), validity);
                if let Some(step) = step_attr(dom, node, 1.0) {
                    let base = min
                        .or_else(|| parse_attr_f64(dom, node, "value"))
                        .unwrap_or(0.0);
                    validity.step_mismatch = is_step_mismatch(numeric, base, step);
                }
            }
            None => validity.bad_input = true,
        },
        "date" => match parse_date_value_days(value) {
            Some(days) => {
                let bound =
                    |name: &str| dom.attr(node, name).and_then(|raw| parse_date_value_days(&raw));
                let min = bound("min");
                check_range(days, min, bound("max"), validity);
                if let Some(step) = step_attr(dom, node, 1.0) {
                    let base = min.unwrap_or(0) as f64;
                    validity.step_mismatch = is_step_mismatch(days as f64, base, step);
                }
            }
            None => validity.bad_input = true,
        },
        "time" => match parse_time_value_seconds(value) {
            Some(seconds) => {
                let bound = |name: &str| {
                    dom.attr(node, name).and_then(|raw| parse_time_value_seconds(&raw))
                };
                let min = bound("min");
                check_range(seconds, min, bound("max"), validity);
                if let Some(step) = step_attr(dom, node, 60.0) {
                    let base = min.unwrap_or(0) as f64;
                    validity.step_mismatch = is_step_mismatch(seconds as f64, base, step);
                }
            }
            None => validity.bad_input = true,
        },
        _ => {}
    }
}

fn pattern_mismatch(dom: &Dom, node: NodeId, value: &str, email_multiple: bool) -> bool {
    let Some(pattern) = dom.attr(node, "pattern").filter(|p| !p.is_empty()) else {
        return false;
    };
    // An invalid pattern is ignored, as browsers do.
    let Ok(regex) = Regex::new(&format!("^(?:{pattern})$")) else {
        return false;
    };
    let mismatch = |candidate: &str| matches!(regex.is_match(candidate), Ok(false));
    if email_multiple {
        value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .any(mismatch)
    } else {
        mismatch(value)
    }
}

/// Browser default `validationMessage` for `constraint` on `node`.
pub fn default_validation_message(dom: &Dom, node: NodeId, constraint: Constraint) -> String {
    let kind = input_type(dom, node);
    match constraint {
        Constraint::ValueMissing => match kind.as_str() {
            "checkbox" => "Please check this box if you want to proceed.".to_string(),
            "radio" => "Please select one of these options.".to_string(),
            "file" => "Please select a file.".to_string(),
            _ if dom.has_tag(node, "select") => "Please select an item in the list.".to_string(),
            _ => "Please fill out this field.".to_string(),
        },
        Constraint::TypeMismatch => match kind.as_str() {
            "email" => "Please enter an email address.".to_string(),
            "url" => "Please enter a URL.".to_string(),
            _ => "Please enter a valid value.".to_string(),
        },
        Constraint::PatternMismatch => "Please match the requested format.".to_string(),
        Constraint::TooLong => format!(
            "Please shorten this text to {} characters or less.",
            dom.attr(node, "maxlength").unwrap_or_default()
        ),
        Constraint::TooShort => format!(
            "Please lengthen this text to {} characters or more (you are currently using {} characters).",
            dom.attr(node, "minlength").unwrap_or_default(),
            dom.value(node).chars().count()
        ),
        Constraint::RangeUnderflow => format!(
            "Value must be greater than or equal to {}.",
            dom.attr(node, "min").unwrap_or_default()
        ),
        Constraint::RangeOverflow => format!(
            "Value must be less than or equal to {}.",
            dom.attr(node, "max").unwrap_or_default()
        ),
        Constraint::StepMismatch => "Please enter a valid value.".to_string(),
        Constraint::BadInput => match kind.as_str() {
            "number" | "range" => "Please enter a number.".to_string(),
            _ => "Please enter a valid value.".to_string(),
        },
        Constraint::CustomError => String::new(),
    }
}
