use std::collections::BTreeMap;

use crate::Result;
use crate::dom::{Dom, NodeId};
use crate::render::{RenderSnapshot, should_rerender};
use crate::runtime::Page;
use crate::validators::CustomValidator;
use crate::validity::{
    Constraint, ValidityState, bitmask_of, compute_validity, default_validation_message,
    input_type,
};

/// Active constraints of one field and the message shown for each, in
/// constraint order.
pub type ErrorMap = BTreeMap<Constraint, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Input,
    Textarea,
    Select,
    RadioGroup,
    CheckboxGroup,
}

/// Position of a field inside a radio/checkbox group.
///
/// Members refer to their primary by node; the primary owns nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRole {
    Single,
    Primary,
    Member { primary: NodeId },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Validate even while the field is pristine.
    pub force: bool,
}

impl ValidateOptions {
    pub fn forced() -> Self {
        Self { force: true }
    }
}

/// Validation state of one enhanced control.
#[derive(Debug, Clone)]
pub struct FormField {
    element: NodeId,
    id: Option<String>,
    name: String,
    kind: FieldKind,
    group: GroupRole,
    group_selector: String,
    wrapper: Option<NodeId>,
    error_bag: Option<NodeId>,
    form: Option<NodeId>,
    messages: ErrorMap,
    pristine: bool,
    last: RenderSnapshot,
    in_flight: Option<ErrorMap>,
}

impl FormField {
    pub(crate) fn new(page: &mut Page, element: NodeId) -> Result<Self> {
        let dom = &page.dom;
        let config = &page.config;

        let wrapper = dom.closest(element, &format!(".{}", config.wrapper_class))?;
        let form = dom.find_ancestor_by_tag(element, "form");
        let name = dom.attr(element, "name").unwrap_or_default();
        let is_group = config
            .group_classes
            .iter()
            .any(|class| dom.has_class(element, class));
        let group_selector = config.group_selector();
        let group = if is_group {
            group_role(dom, element, form, &name, &group_selector)?
        } else {
            GroupRole::Single
        };
        let kind = match (dom.tag_name(element), input_type(dom, element).as_str()) {
            (Some("textarea"), _) => FieldKind::Textarea,
            (Some("select"), _) => FieldKind::Select,
            (_, "radio") if is_group => FieldKind::RadioGroup,
            (_, "checkbox") if is_group => FieldKind::CheckboxGroup,
            _ => FieldKind::Input,
        };
        let error_bag = dom
            .attr(element, "aria-errormessage")
            .and_then(|id| dom.by_id(&id));

        let mut field = Self {
            element,
            id: dom.attr(element, "id").filter(|id| !id.is_empty()),
            name,
            kind,
            group,
            group_selector,
            wrapper,
            error_bag,
            form,
            messages: ErrorMap::new(),
            pristine: true,
            last: RenderSnapshot::default(),
            in_flight: None,
        };
        if let Some(bag) = error_bag {
            field.messages = captured_messages(dom, element);
            field.last = RenderSnapshot::seeded(initial_constraints(dom, bag)?);
        }

        page.trace(format!(
            "[field] enhance {} kind={:?} group={:?}",
            page.dom.node_label(element),
            field.kind,
            field.group
        ));
        Ok(field)
    }

    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn group(&self) -> GroupRole {
        self.group
    }

    pub fn is_group(&self) -> bool {
        self.group != GroupRole::Single
    }

    /// The field that validates on behalf of this one.
    pub fn representative(&self) -> NodeId {
        match self.group {
            GroupRole::Member { primary } => primary,
            GroupRole::Single | GroupRole::Primary => self.element,
        }
    }

    pub fn wrapper(&self) -> Option<NodeId> {
        self.wrapper
    }

    pub fn error_bag(&self) -> Option<NodeId> {
        self.error_bag
    }

    pub fn form(&self) -> Option<NodeId> {
        self.form
    }

    pub fn pristine(&self) -> bool {
        self.pristine
    }

    pub fn last_snapshot(&self) -> &RenderSnapshot {
        &self.last
    }

    pub fn last_constraints(&self) -> u32 {
        self.last.constraints
    }

    /// Messages read from the server-rendered `data-errormsg*` attributes.
    pub fn captured_messages(&self) -> &ErrorMap {
        &self.messages
    }

    #[cfg(test)]
    pub(crate) fn set_in_flight(&mut self, errors: Option<ErrorMap>) {
        self.in_flight = errors;
    }

    /// Computes the field's errors and, with `show_errors`, renders them.
    ///
    /// A pristine field answers with an empty map unless forced. While a
    /// render of this field is in progress the in-flight result is returned
    /// as is.
    pub(crate) fn validate(
        &mut self,
        page: &mut Page,
        show_errors: bool,
        options: ValidateOptions,
    ) -> Result<ErrorMap> {
        if self.pristine && !options.force {
            return Ok(ErrorMap::new());
        }
        if let Some(errors) = &self.in_flight {
            return Ok(errors.clone());
        }

        let errors = self.collect_errors(&page.dom);
        if show_errors {
            let constraints = bitmask_of(errors.keys().copied());
            self.in_flight = Some(errors.clone());
            let rendered = self.update_error_message_bag(page, constraints, &errors);
            self.in_flight = None;
            rendered?;
        }
        Ok(errors)
    }

    fn collect_errors(&self, dom: &Dom) -> ErrorMap {
        let mut errors = ErrorMap::new();

        if self.group == GroupRole::Primary {
            if self.validate_group(dom).value_missing {
                errors.insert(Constraint::ValueMissing, self.value_missing_message(dom));
            }
            return errors;
        }

        let validity = compute_validity(dom, self.element);
        if validity.value_missing {
            // A missing value is reported alone.
            errors.insert(Constraint::ValueMissing, self.value_missing_message(dom));
            return errors;
        }
        for constraint in validity.active() {
            errors.insert(constraint, self.native_message(dom, constraint));
        }

        if self.is_group() {
            return errors;
        }
        for validator in CustomValidator::ALL {
            if validator.suppressed_by(&validity) || !validator.fails(dom, self.element) {
                continue;
            }
            errors.insert(Constraint::CustomError, self.custom_message(dom, validator));
        }
        errors
    }

    /// Validity of the whole group: satisfied when any member is checked.
    /// Every other flag comes from this field's own validity.
    pub(crate) fn validate_group(&self, dom: &Dom) -> ValidityState {
        let mut validity = compute_validity(dom, self.element);
        let checked = dom.checked(self.element)
            || self
                .group_members(dom)
                .into_iter()
                .any(|member| dom.checked(member));
        validity.set(Constraint::ValueMissing, !checked);
        validity
    }

    /// Controls sharing this field's group, this field included.
    pub(crate) fn group_members(&self, dom: &Dom) -> Vec<NodeId> {
        let Some(form) = self.form else {
            return vec![self.element];
        };
        dom.form_elements(form)
            .into_iter()
            .filter(|node| {
                *node == self.element
                    || (dom.attr(*node, "name").unwrap_or_default() == self.name
                        && dom.matches(*node, &self.group_selector).unwrap_or(false))
            })
            .collect()
    }

    fn value_missing_message(&self, dom: &Dom) -> String {
        dom.first_attr(
            self.element,
            &["data-powermail-required-message", "data-errormsgvaluemissing"],
        )
        .or_else(|| self.messages.get(&Constraint::ValueMissing).cloned())
        .unwrap_or_else(|| default_validation_message(dom, self.element, Constraint::ValueMissing))
    }

    fn native_message(&self, dom: &Dom, constraint: Constraint) -> String {
        let lowered = constraint.as_str().to_ascii_lowercase();
        let override_attr = format!("data-powermail-{lowered}-message");
        let server_attr = format!("data-errormsg{lowered}");
        dom.first_attr(
            self.element,
            &[
                override_attr.as_str(),
                "data-powermail-error-message",
                server_attr.as_str(),
            ],
        )
        .or_else(|| self.messages.get(&constraint).cloned())
        .unwrap_or_else(|| default_validation_message(dom, self.element, constraint))
    }

    fn custom_message(&self, dom: &Dom, validator: CustomValidator) -> String {
        let override_attr = validator.message_attr();
        dom.first_attr(
            self.element,
            &[override_attr.as_str(), "data-powermail-error-message"],
        )
        .or_else(|| self.messages.get(&Constraint::CustomError).cloned())
        .unwrap_or_else(|| format!("Invalid input ({})", validator.name()))
    }

    /// Writes the error state into the DOM when it differs from the last
    /// render. Returns whether anything was written.
    pub(crate) fn update_error_message_bag(
        &mut self,
        page: &mut Page,
        constraints: u32,
        errors: &ErrorMap,
    ) -> Result<bool> {
        let Some(bag) = self.error_bag else {
            return Ok(false);
        };
        let next = RenderSnapshot::new(constraints, errors, self.pristine);
        if !should_rerender(&self.last, &next) {
            return Ok(false);
        }
        self.last = next;

        let dom = &mut page.dom;
        let has_error_class = page.config.has_error_class.as_str();
        if errors.is_empty() {
            dom.set_attr(bag, "hidden", "hidden")?;
            dom.set_attr(self.element, "aria-invalid", "false")?;
            if let Some(wrapper) = self.wrapper {
                dom.class_remove(wrapper, has_error_class)?;
            }
        } else {
            dom.remove_attr(bag, "hidden")?;
            dom.set_attr(self.element, "aria-invalid", "true")?;
            if let Some(wrapper) = self.wrapper {
                dom.class_add(wrapper, has_error_class)?;
            }
        }

        for stale in dom.query_selector_all_from(bag, "[data-constraint]")? {
            dom.remove_node(stale)?;
        }
        for (constraint, message) in errors {
            let span = dom.create_detached_element("span");
            dom.set_attr(span, "data-constraint", constraint.as_str())?;
            dom.set_text_content(span, message)?;
            dom.append_child(bag, span)?;
        }

        page.trace(format!(
            "[field] render {} constraints={} pristine={}",
            page.dom.node_label(self.element),
            constraints,
            self.pristine
        ));

        if !self.pristine {
            if let Some(form) = self.form {
                page.queue_form_update(form);
            }
            if let Some(wrapper) = self.wrapper {
                page.scroll_into_view(wrapper);
            }
        }
        Ok(true)
    }

    /// Setting the flag clears the rendered errors without recomputing them.
    pub(crate) fn set_pristine(&mut self, page: &mut Page, pristine: bool) -> Result<()> {
        self.pristine = pristine;
        if pristine {
            self.update_error_message_bag(page, 0, &ErrorMap::new())?;
        }
        Ok(())
    }

    pub(crate) fn focus(&self, page: &mut Page) {
        page.focus(self.element);
        if !self.pristine {
            if let Some(wrapper) = self.wrapper {
                page.scroll_into_view(wrapper);
            }
        }
    }
}

/// The primary of a group is its first member in form order.
fn group_role(
    dom: &Dom,
    element: NodeId,
    form: Option<NodeId>,
    name: &str,
    group_selector: &str,
) -> Result<GroupRole> {
    let Some(form) = form else {
        return Ok(GroupRole::Primary);
    };
    let mut primary = None;
    for candidate in dom.form_elements(form) {
        if dom.attr(candidate, "name").unwrap_or_default() == name
            && dom.matches(candidate, group_selector)?
        {
            primary = Some(candidate);
            break;
        }
    }
    Ok(match primary {
        Some(primary) if primary != element => GroupRole::Member { primary },
        _ => GroupRole::Primary,
    })
}

fn captured_messages(dom: &Dom, element: NodeId) -> ErrorMap {
    let mut messages = ErrorMap::new();
    for constraint in Constraint::ALL {
        let lowered = constraint.as_str().to_ascii_lowercase();
        let dashed = format!("data-errormsg-{lowered}");
        let joined = format!("data-errormsg{lowered}");
        let message = dom.first_attr(element, &[dashed.as_str(), joined.as_str()]);
        if let Some(message) = message {
            messages.insert(constraint, message);
        }
    }
    messages
}

/// Bitmask of the `[data-constraint]` nodes rendered by the server.
fn initial_constraints(dom: &Dom, bag: NodeId) -> Result<u32> {
    let constraints = dom
        .query_selector_all_from(bag, "[data-constraint]")?
        .into_iter()
        .filter_map(|node| dom.attr(node, "data-constraint"))
        .filter_map(|name| Constraint::from_name(&name));
    Ok(bitmask_of(constraints))
}
