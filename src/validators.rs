//! Powermail rules that HTML constraint validation cannot express.
//!
//! Every rule reports into the single `customError` bucket. A rule that
//! duplicates a native constraint steps aside when that constraint already
//! fired for the same value.

use crate::dom::{Dom, NodeId};
use crate::validity::{Constraint, ValidityState, input_type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CustomValidator {
    /// `data-powermail-length="[min,max]"`, inclusive, on the character count.
    Length,
    /// `data-powermail-equalto="<selector>"`, resolved inside the form.
    EqualTo,
    /// `data-powermail-powermailfilesize="<bytes>,..."` on file inputs.
    FileSize,
    /// `accept=".pdf, .png"` on file inputs.
    FileExtensions,
}

impl CustomValidator {
    /// Registration order, which is also evaluation order.
    pub const ALL: [CustomValidator; 4] = [
        CustomValidator::Length,
        CustomValidator::EqualTo,
        CustomValidator::FileSize,
        CustomValidator::FileExtensions,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CustomValidator::Length => "length",
            CustomValidator::EqualTo => "equalto",
            CustomValidator::FileSize => "powermailfilesize",
            CustomValidator::FileExtensions => "powermailfileextensions",
        }
    }

    pub fn message_attr(self) -> String {
        format!("data-powermail-{}-message", self.name())
    }

    /// Native constraints that already cover this rule.
    pub fn overlapping_constraints(self) -> &'static [Constraint] {
        match self {
            CustomValidator::Length => &[Constraint::TooShort, Constraint::TooLong],
            CustomValidator::EqualTo
            | CustomValidator::FileSize
            | CustomValidator::FileExtensions => &[],
        }
    }

    pub fn suppressed_by(self, validity: &ValidityState) -> bool {
        self.overlapping_constraints()
            .iter()
            .any(|constraint| validity.get(*constraint))
    }

    /// Whether the rule rejects the current value of `node`. Rules that are
    /// not configured on the control never fail.
    pub fn fails(self, dom: &Dom, node: NodeId) -> bool {
        match self {
            CustomValidator::Length => length_fails(dom, node),
            CustomValidator::EqualTo => equal_to_fails(dom, node),
            CustomValidator::FileSize => file_size_fails(dom, node),
            CustomValidator::FileExtensions => file_extensions_fails(dom, node),
        }
    }
}

fn length_fails(dom: &Dom, node: NodeId) -> bool {
    let Some(config) = dom.attr(node, "data-powermail-length") else {
        return false;
    };
    let value = dom.value(node);
    if value.is_empty() {
        return false;
    }
    let config = config.replace(['[', ']'], "");
    let mut bounds = config.split(',').map(|raw| raw.trim().parse::<usize>().ok());
    let minimum = bounds.next().flatten();
    let maximum = bounds.next().flatten();
    let length = value.chars().count();
    minimum.is_some_and(|min| length < min) || maximum.is_some_and(|max| length > max)
}

fn equal_to_fails(dom: &Dom, node: NodeId) -> bool {
    let Some(selector) = dom.attr(node, "data-powermail-equalto") else {
        return false;
    };
    let scope = dom
        .find_ancestor_by_tag(node, "form")
        .unwrap_or_else(|| dom.root());
    match dom.query_selector_from(scope, &selector) {
        Ok(Some(other)) => dom.value(other) != dom.value(node),
        _ => false,
    }
}

fn file_size_fails(dom: &Dom, node: NodeId) -> bool {
    if input_type(dom, node) != "file" {
        return false;
    }
    let Some(config) = dom.attr(node, "data-powermail-powermailfilesize") else {
        return false;
    };
    if dom.value(node).is_empty() {
        return false;
    }
    let Some(max_size) = config
        .split(',')
        .next()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
    else {
        return false;
    };
    dom.files(node).iter().any(|file| file.size > max_size)
}

fn file_extensions_fails(dom: &Dom, node: NodeId) -> bool {
    if input_type(dom, node) != "file" {
        return false;
    }
    let Some(accept) = dom.attr(node, "accept") else {
        return false;
    };
    let value = dom.value(node);
    if value.is_empty() {
        return false;
    }
    let extension = value
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    !accept
        .split(',')
        .map(|entry| entry.trim().replacen('.', "", 1).to_lowercase())
        .any(|allowed| allowed == extension)
}
