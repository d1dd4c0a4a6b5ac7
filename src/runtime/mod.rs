use std::collections::{BTreeMap, HashMap};

use crate::config::FormsConfig;
use crate::dom::{Dom, NodeId, parse_fragment};
use crate::field::FormField;
use crate::form_validation::{FormValidation, Submit, show_error_navigation};
use crate::more_step::{MoreStepForm, StepRequest};
use crate::observer::{Dispatch, Observer};
use crate::validity::{compute_validity, input_type, is_effectively_disabled};
use crate::{Error, Result};

mod actions;
mod assertions;
mod page;

pub(crate) use page::{Microtask, Page};

/// What became of a submit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted,
    Prevented,
}

impl SubmitOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Prevented => "prevented",
        }
    }
}

/// Per-form state created on DOMContentLoaded.
#[derive(Debug, Default)]
struct FormEntry {
    /// Single-page forms surface live errors only once this is set.
    dirty: bool,
    validation: Option<FormValidation>,
    more_step: Option<MoreStepForm>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldEvent {
    Input,
    Change,
}

impl FieldEvent {
    fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Change => "change",
        }
    }
}

/// Owns the document and every enhancer attached to it, and plays the part
/// of the browser event loop: user actions dispatch events to the enhancers,
/// then inserted nodes and queued microtasks are drained until the page
/// settles.
#[derive(Debug)]
pub struct FormsRuntime {
    page: Page,
    fields: HashMap<NodeId, FormField>,
    forms: BTreeMap<NodeId, FormEntry>,
    observer: Observer<FormsRuntime>,
    last_submit: Option<SubmitOutcome>,
}

impl FormsRuntime {
    pub fn from_html(html: &str) -> Result<Self> {
        Self::from_html_with_config(html, FormsConfig::default())
    }

    pub fn from_html_with_config(html: &str, config: FormsConfig) -> Result<Self> {
        config.validate()?;
        let mut dom = parse_fragment(html)?;
        dom.take_inserted();
        let field_selector = config.field_selector.clone();

        let mut runtime = Self {
            page: Page::new(dom, config),
            fields: HashMap::new(),
            forms: BTreeMap::new(),
            observer: Observer::new(),
            last_submit: None,
        };
        runtime.observe(&field_selector, |runtime, node| runtime.enhance_node(node))?;
        runtime.dom_content_loaded()?;
        runtime.flush()?;
        Ok(runtime)
    }

    /// Registers an extra DOM subscription. Matching elements already in the
    /// document are dispatched right away, later insertions on flush.
    pub fn observe<F>(&mut self, selector: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut FormsRuntime, NodeId) -> Result<()> + 'static,
    {
        self.observer.register(selector, handler)?;
        let dispatches = self.observer.scan(&self.page.dom)?;
        self.run_dispatches(dispatches)
    }

    pub fn observer_rule_count(&self) -> usize {
        self.observer.rule_count()
    }

    /// Rule and node pairs the observer has already handled.
    pub fn observer_dispatched_count(&self) -> usize {
        self.observer.dispatched_count()
    }

    /// Enhances the element matching `selector` by hand. Enhancing an
    /// already enhanced element is a no-op.
    pub fn enhance(&mut self, selector: &str) -> Result<()> {
        let node = self.select_one(selector)?;
        self.enhance_node(node)?;
        self.flush()
    }

    fn enhance_node(&mut self, node: NodeId) -> Result<()> {
        if self.fields.contains_key(&node) {
            return Ok(());
        }
        let mut field = FormField::new(&mut self.page, node)?;
        if self.joins_touched_form(&field) {
            field.set_pristine(&mut self.page, false)?;
        }
        if let Some(validation) = field
            .form()
            .and_then(|form| self.forms.get_mut(&form))
            .and_then(|entry| entry.validation.as_mut())
        {
            validation.register_field(&field);
        }
        self.fields.insert(node, field);
        Ok(())
    }

    /// Whether a field arrives in a form (or step) whose fields already left
    /// the pristine state.
    fn joins_touched_form(&self, field: &FormField) -> bool {
        let Some(entry) = field.form().and_then(|form| self.forms.get(&form)) else {
            return false;
        };
        match &entry.more_step {
            Some(more_step) => more_step
                .step_index_of(&self.page.dom, field.element())
                .and_then(|step| more_step.step_pristine(step))
                == Some(false),
            None => entry.dirty,
        }
    }

    fn run_dispatches(&mut self, dispatches: Vec<Dispatch<FormsRuntime>>) -> Result<()> {
        for dispatch in dispatches {
            let label = self.page.dom.node_label(dispatch.node);
            self.page.trace(format!(
                "[observer] enhance selector={} node={label}",
                dispatch.selector
            ));
            (dispatch.handler)(self, dispatch.node)?;
        }
        Ok(())
    }

    fn dom_content_loaded(&mut self) -> Result<()> {
        for form in self.page.dom.query_selector_all("form")? {
            let mut entry = FormEntry::default();
            if self.page.dom.has_class(form, &self.page.config.morestep_class) {
                entry.more_step = MoreStepForm::new(&mut self.page, form)?;
            }
            if self
                .page
                .dom
                .has_class(form, &self.page.config.custom_validation_class)
            {
                entry.validation = Some(FormValidation::new(&mut self.page, form, &self.fields)?);
            }
            self.forms.insert(form, entry);
        }
        self.page.trace(format!(
            "[runtime] loaded fields={} forms={}",
            self.fields.len(),
            self.forms.len()
        ));
        Ok(())
    }

    /// Delivers pending insertions to the observer and runs queued
    /// microtasks until both are empty.
    pub fn flush(&mut self) -> Result<()> {
        let limit = self.page.config.microtask_step_limit;
        let mut steps = 0usize;
        loop {
            let inserted = self.page.dom.take_inserted();
            let task = if inserted.is_empty() {
                match self.page.microtasks.pop_front() {
                    Some(task) => Some(task),
                    None => break,
                }
            } else {
                None
            };

            steps += 1;
            if steps > limit {
                self.page.microtasks.clear();
                return Err(Error::MicrotaskLimitExceeded { limit });
            }

            match task {
                None => {
                    let dispatches = self.observer.notify_inserted(&self.page.dom, &inserted)?;
                    self.run_dispatches(dispatches)?;
                }
                Some(Microtask::FormUpdate(form)) => self.run_form_update(form)?,
            }
        }
        Ok(())
    }

    fn run_form_update(&mut self, form: NodeId) -> Result<()> {
        if !self.page.dom.is_connected(form) {
            return Ok(());
        }
        let Some(validation) = self
            .forms
            .get_mut(&form)
            .and_then(|entry| entry.validation.as_mut())
        else {
            return Ok(());
        };
        validation.validate(&mut self.page, &mut self.fields, None)?;
        Ok(())
    }

    /// Routes an `input`/`change` event to the field listening for it.
    fn dispatch_field_event(&mut self, target: NodeId, event: FieldEvent) -> Result<()> {
        let Some(field) = self.fields.get(&target) else {
            return Ok(());
        };
        let kind = input_type(&self.page.dom, target);
        let listens_to = if kind == "radio" || kind == "checkbox" {
            FieldEvent::Change
        } else {
            FieldEvent::Input
        };
        if event != listens_to {
            return Ok(());
        }

        let label = self.page.dom.node_label(target);
        if let Some(form) = field.form() {
            let gated = match self.forms.get(&form) {
                Some(FormEntry {
                    more_step: Some(more_step),
                    ..
                }) => more_step
                    .step_index_of(&self.page.dom, target)
                    .and_then(|step| more_step.step_pristine(step))
                    .unwrap_or(false),
                Some(entry) => !entry.dirty,
                None => true,
            };
            if gated {
                self.page.trace(format!("[event] {} target={label} gated", event.as_str()));
                return Ok(());
            }
        }

        let representative = field.representative();
        self.page
            .trace(format!("[event] {} target={label}", event.as_str()));
        if let Some(field) = self.fields.get_mut(&representative) {
            field.validate(&mut self.page, true, Default::default())?;
        }
        Ok(())
    }

    fn submit_form(&mut self, form: NodeId, submitter: Option<NodeId>) -> Result<SubmitOutcome> {
        let bypass = submitter.is_some_and(|node| self.page.dom.has_attr(node, "formnovalidate"));
        let entry = self.forms.entry(form).or_default();
        let mut allowed = true;

        if let Some(more_step) = entry.more_step.as_mut() {
            if !bypass && !more_step.validate_current_step(&mut self.page, &mut self.fields)? {
                allowed = false;
                if entry.validation.is_none() {
                    if let Some(navigation) = more_step.error_navigation() {
                        show_error_navigation(&mut self.page, navigation, true)?;
                    }
                }
            }
        } else {
            entry.dirty = true;
            for field in self
                .fields
                .values_mut()
                .filter(|field| field.form() == Some(form))
            {
                field.set_pristine(&mut self.page, false)?;
            }
        }

        if let Some(validation) = entry.validation.as_mut() {
            let valid =
                validation.validate(&mut self.page, &mut self.fields, Some(Submit { submitter }))?;
            allowed = allowed && valid;
        } else if allowed && !bypass && !self.page.dom.has_attr(form, "novalidate") {
            allowed = native_form_check(&mut self.page, form);
        }

        let outcome = if allowed {
            SubmitOutcome::Submitted
        } else {
            SubmitOutcome::Prevented
        };
        self.last_submit = Some(outcome);
        let label = self.page.dom.node_label(form);
        self.page.trace(format!(
            "[event] done submit target={label} outcome={}",
            outcome.as_str()
        ));
        self.flush()?;
        Ok(outcome)
    }

    /// Follows an error-summary link to the field its fragment names.
    /// Returns whether the click was consumed.
    fn follow_error_link(&mut self, target: NodeId) -> Result<bool> {
        let link_selector = format!("a.{}", self.page.config.error_link_class);
        let Some(link) = self.page.dom.closest(target, &link_selector)? else {
            return Ok(false);
        };
        let Some(fragment) = self
            .page
            .dom
            .attr(link, "href")
            .and_then(|href| href.split('#').nth(1).map(str::to_string))
        else {
            return Ok(false);
        };
        let Some(form) = self.page.dom.find_ancestor_by_tag(link, "form") else {
            return Ok(false);
        };
        let Some(node) = self
            .forms
            .get(&form)
            .and_then(|entry| entry.validation.as_ref())
            .and_then(|validation| validation.field_node(&fragment))
        else {
            return Ok(false);
        };
        if let Some(field) = self.fields.get(&node) {
            field.focus(&mut self.page);
        }
        Ok(true)
    }

    /// Handles progress-bar and step buttons. Returns whether the click was
    /// consumed.
    fn follow_step_button(&mut self, target: NodeId) -> Result<bool> {
        let Some(form) = self.page.dom.find_ancestor_by_tag(target, "form") else {
            return Ok(false);
        };
        let Some(more_step) = self
            .forms
            .get_mut(&form)
            .and_then(|entry| entry.more_step.as_mut())
        else {
            return Ok(false);
        };

        let progress_selector = self.page.config.progress_button_selector.clone();
        if let Some(button) = self.page.dom.closest(target, &progress_selector)? {
            if let Some(index) = more_step.progress_index(&self.page, button)? {
                more_step.navigate(&mut self.page, &mut self.fields, StepRequest::Progress(index))?;
                return Ok(true);
            }
        }

        let show_selector = format!("[{}]", self.page.config.step_show_attr);
        if let Some(button) = self.page.dom.closest(target, &show_selector)? {
            let requested = self
                .page
                .dom
                .attr(button, &self.page.config.step_show_attr)
                .and_then(|value| value.trim().parse::<usize>().ok());
            if let Some(index) = requested {
                more_step.navigate(&mut self.page, &mut self.fields, StepRequest::Show(index))?;
            }
            return Ok(true);
        }
        Ok(false)
    }

    pub(crate) fn select_one(&self, selector: &str) -> Result<NodeId> {
        self.page
            .dom
            .query_selector(selector)?
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    fn select_form(&self, selector: &str) -> Result<NodeId> {
        let node = self.select_one(selector)?;
        self.page
            .dom
            .find_ancestor_by_tag(node, "form")
            .or_else(|| self.page.dom.has_tag(node, "form").then_some(node))
            .ok_or_else(|| Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "form or form descendant".into(),
                actual: self.page.dom.node_label(node),
            })
    }

    fn field_at(&self, selector: &str) -> Result<NodeId> {
        let node = self.select_one(selector)?;
        if self.fields.contains_key(&node) {
            return Ok(node);
        }
        Err(Error::TypeMismatch {
            selector: selector.to_string(),
            expected: "enhanced field".into(),
            actual: self.page.dom.node_label(node),
        })
    }

    pub fn dom(&self) -> &Dom {
        &self.page.dom
    }
}

/// Browser constraint validation for forms no enhancer takes over. Focuses
/// the first invalid control.
fn native_form_check(page: &mut Page, form: NodeId) -> bool {
    let invalid = page
        .dom
        .form_elements(form)
        .into_iter()
        .find(|node| {
            !is_effectively_disabled(&page.dom, *node)
                && !compute_validity(&page.dom, *node).valid()
        });
    match invalid {
        Some(node) => {
            page.focus(node);
            false
        }
        None => true,
    }
}
