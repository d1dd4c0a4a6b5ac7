use std::collections::HashMap;

use crate::Result;
use crate::dom::{Dom, NodeId};
use crate::field::{FormField, ValidateOptions};
use crate::form_validation::{hide_error_navigation, show_error_navigation};
use crate::runtime::Page;
use crate::visibility::is_field_visible;

/// A navigation request against a multi-step form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRequest {
    /// A "next"/"previous" button naming its target step.
    Show(usize),
    /// A progress-bar button; only steps up to `validated_until + 1` are
    /// reachable.
    Progress(usize),
}

impl StepRequest {
    pub fn target(self) -> usize {
        match self {
            Self::Show(target) | Self::Progress(target) => target,
        }
    }
}

/// Step state machine of a `powermail_morestep` form.
#[derive(Debug, Clone)]
pub struct MoreStepForm {
    form: NodeId,
    steps: Vec<NodeId>,
    step_pristine: Vec<bool>,
    validated_until: Option<usize>,
    active_step: usize,
    error_navigation: Option<NodeId>,
}

impl MoreStepForm {
    /// Attaches to `form` and shows its first step. Returns `None` for a form
    /// without step fieldsets.
    pub(crate) fn new(page: &mut Page, form: NodeId) -> Result<Option<Self>> {
        let steps = page
            .dom
            .query_selector_all_from(form, &format!(".{}", page.config.fieldset_class))?;
        if steps.is_empty() {
            return Ok(None);
        }
        let error_navigation = page
            .dom
            .query_selector_from(form, &format!(".{}", page.config.error_navigation_class))?;

        let mut more_step = Self {
            form,
            step_pristine: vec![true; steps.len()],
            steps,
            validated_until: None,
            active_step: 0,
            error_navigation,
        };
        // Server-rendered errors on the first step stay visible.
        more_step.show_step(page, 0)?;
        Ok(Some(more_step))
    }

    pub fn form(&self) -> NodeId {
        self.form
    }

    pub fn steps(&self) -> &[NodeId] {
        &self.steps
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn active_step(&self) -> usize {
        self.active_step
    }

    /// Highest step known to be valid; `None` until the first step passes.
    pub fn validated_until(&self) -> Option<usize> {
        self.validated_until
    }

    pub fn step_pristine(&self, index: usize) -> Option<bool> {
        self.step_pristine.get(index).copied()
    }

    pub fn error_navigation(&self) -> Option<NodeId> {
        self.error_navigation
    }

    /// Highest step index a progress button may jump to.
    pub fn reachable_limit(&self) -> usize {
        self.validated_until.map_or(0, |until| until + 1)
    }

    /// Index of the step containing `node`.
    pub fn step_index_of(&self, dom: &Dom, node: NodeId) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| *step == node || dom.is_descendant_of(node, *step))
    }

    /// Step a progress button inside this form points at.
    pub(crate) fn progress_index(&self, page: &Page, button: NodeId) -> Result<Option<usize>> {
        let buttons = page
            .dom
            .query_selector_all_from(self.form, &page.config.progress_button_selector)?;
        Ok(buttons
            .iter()
            .position(|candidate| *candidate == button)
            .map(|position| button_index(&page.dom, button, position)))
    }

    /// Handles a navigation request. Returns whether the transition happened.
    pub(crate) fn navigate(
        &mut self,
        page: &mut Page,
        fields: &mut HashMap<NodeId, FormField>,
        request: StepRequest,
    ) -> Result<bool> {
        let target = request.target();
        let from = self.active_step;
        if target >= self.steps.len() {
            page.trace(format!(
                "[step] reject form={} target={target} reason=out-of-range",
                page.dom.node_label(self.form)
            ));
            return Ok(false);
        }
        if matches!(request, StepRequest::Progress(_)) && target > self.reachable_limit() {
            page.trace(format!(
                "[step] reject form={} target={target} reason=unreachable validated_until={}",
                page.dom.node_label(self.form),
                self.trace_watermark()
            ));
            return Ok(false);
        }
        if target == from {
            return Ok(true);
        }

        if target > from {
            let already_validated = matches!(request, StepRequest::Progress(_))
                && self.validated_until.is_some_and(|until| target <= until);
            if !already_validated {
                if !self.validate_current_step(page, fields)? {
                    if let Some(navigation) = self.error_navigation {
                        show_error_navigation(page, navigation, true)?;
                    }
                    page.trace(format!(
                        "[step] blocked form={} from={from} to={target}",
                        page.dom.node_label(self.form)
                    ));
                    return Ok(false);
                }
                let reached = target - 1;
                self.validated_until =
                    Some(self.validated_until.map_or(reached, |until| until.max(reached)));
                if let Some(navigation) = self.error_navigation {
                    hide_error_navigation(page, navigation)?;
                }
            }
        }

        self.show_step(page, target)?;
        if self.step_pristine[target] {
            for node in self.step_fields(page, target) {
                if let Some(field) = fields.get_mut(&node) {
                    field.set_pristine(page, true)?;
                }
            }
        }
        Ok(true)
    }

    /// Marks the active step touched and validates its visible fields.
    /// A step without visible fields is valid.
    pub(crate) fn validate_current_step(
        &mut self,
        page: &mut Page,
        fields: &mut HashMap<NodeId, FormField>,
    ) -> Result<bool> {
        let step = self.active_step;
        self.step_pristine[step] = false;
        let nodes = self.step_fields(page, step);
        for node in &nodes {
            if let Some(field) = fields.get_mut(node) {
                field.set_pristine(page, false)?;
            }
        }

        let mut representatives: Vec<NodeId> = Vec::new();
        for node in nodes {
            if !is_field_visible(&page.dom, node, &page.config.fieldset_class) {
                continue;
            }
            let Some(field) = fields.get(&node) else {
                continue;
            };
            let representative = field.representative();
            if !representatives.contains(&representative) {
                representatives.push(representative);
            }
        }

        let mut valid = true;
        for node in representatives {
            let Some(field) = fields.get_mut(&node) else {
                continue;
            };
            let errors = field.validate(page, true, ValidateOptions::forced())?;
            if !errors.is_empty() {
                valid = false;
            }
        }
        page.trace(format!(
            "[step] validate form={} step={step} valid={valid}",
            page.dom.node_label(self.form)
        ));
        Ok(valid)
    }

    /// Enhanced controls inside step `index`, in form order.
    fn step_fields(&self, page: &Page, index: usize) -> Vec<NodeId> {
        let Some(step) = self.steps.get(index).copied() else {
            return Vec::new();
        };
        page.dom
            .form_elements(self.form)
            .into_iter()
            .filter(|node| page.dom.is_descendant_of(*node, step))
            .collect()
    }

    fn show_step(&mut self, page: &mut Page, index: usize) -> Result<()> {
        let from = self.active_step;
        for (position, step) in self.steps.iter().enumerate() {
            let display = if position == index { "" } else { "none" };
            page.dom.style_set(*step, "display", display)?;
        }
        self.active_step = index;
        self.update_buttons(page)?;
        page.trace(format!(
            "[step] transition form={} from={from} to={index} validated_until={}",
            page.dom.node_label(self.form),
            self.trace_watermark()
        ));
        Ok(())
    }

    /// Applies active/complete/incomplete state to every progress button.
    fn update_buttons(&self, page: &mut Page) -> Result<()> {
        let buttons = page
            .dom
            .query_selector_all_from(self.form, &page.config.progress_button_selector)?;
        let legacy_class = page.config.legacy_active_class.clone();
        let limit = self.reachable_limit();

        for (position, button) in buttons.into_iter().enumerate() {
            let index = button_index(&page.dom, button, position);
            let active = index == self.active_step;
            let complete = self.validated_until.is_some_and(|until| index <= until);

            let dom = &mut page.dom;
            dom.class_toggle(button, "Progress__button--active", active)?;
            dom.class_toggle(button, &legacy_class, active)?;
            dom.class_toggle(button, "Progress__button--complete", complete)?;
            dom.class_toggle(button, "Progress__button--incomplete", !complete)?;
            if active {
                dom.set_attr(button, "aria-current", "step")?;
            } else {
                dom.remove_attr(button, "aria-current")?;
            }
            if index > limit {
                dom.set_attr(button, "disabled", "")?;
                dom.set_attr(button, "aria-disabled", "true")?;
            } else {
                dom.remove_attr(button, "disabled")?;
                dom.remove_attr(button, "aria-disabled")?;
            }

            for label in dom.query_selector_all_from(button, ".Progress__success-label")? {
                dom.remove_node(label)?;
            }
            if complete {
                if let Some(text) = dom.attr(button, "data-success-label") {
                    let label = dom.create_detached_element("span");
                    dom.set_attr(label, "class", "Progress__success-label")?;
                    dom.set_text_content(label, &text)?;
                    dom.append_child(button, label)?;
                }
            }
        }
        Ok(())
    }

    fn trace_watermark(&self) -> String {
        self.validated_until
            .map_or_else(|| "-1".to_string(), |until| until.to_string())
    }
}

/// A numeric `data-powermail-morestep-current` names the step; otherwise the
/// button's position among the form's progress buttons does.
fn button_index(dom: &Dom, button: NodeId, position: usize) -> usize {
    dom.attr(button, "data-powermail-morestep-current")
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(position)
}
