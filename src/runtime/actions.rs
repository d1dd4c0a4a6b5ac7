use super::*;
use crate::dom::FileSpec;
use crate::field::{ErrorMap, ValidateOptions};
use crate::validity::ValidityState;

impl FormsRuntime {
    pub fn type_text(&mut self, selector: &str, text: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if is_effectively_disabled(&self.page.dom, target)
            || self.page.dom.has_attr(target, "readonly")
        {
            return Ok(());
        }
        let tag = self.page.dom.tag_name(target).unwrap_or_default().to_string();
        let kind = input_type(&self.page.dom, target);
        let typeable = tag == "textarea"
            || (tag == "input" && !matches!(kind.as_str(), "checkbox" | "radio" | "file"));
        if !typeable {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "input or textarea".into(),
                actual: self.page.dom.node_label(target),
            });
        }

        self.page.dom.set_value(target, text)?;
        self.dispatch_field_event(target, FieldEvent::Input)?;
        self.flush()
    }

    /// Checks or unchecks a checkbox or radio. Checking a radio unchecks the
    /// rest of its group.
    pub fn set_checked(&mut self, selector: &str, checked: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        if is_effectively_disabled(&self.page.dom, target) {
            return Ok(());
        }
        let kind = input_type(&self.page.dom, target);
        if !self.page.dom.has_tag(target, "input") || (kind != "checkbox" && kind != "radio") {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "input[type=checkbox|radio]".into(),
                actual: self.page.dom.node_label(target),
            });
        }
        if self.page.dom.checked(target) == checked {
            return Ok(());
        }

        if kind == "radio" && checked {
            for other in self.radio_group(target) {
                if other != target && self.page.dom.checked(other) {
                    self.page.dom.set_checked(other, false)?;
                }
            }
        }
        self.page.dom.set_checked(target, checked)?;
        self.dispatch_field_event(target, FieldEvent::Input)?;
        self.dispatch_field_event(target, FieldEvent::Change)?;
        self.flush()
    }

    fn radio_group(&self, radio: NodeId) -> Vec<NodeId> {
        let dom = &self.page.dom;
        let name = dom.attr(radio, "name").unwrap_or_default();
        if name.is_empty() {
            return vec![radio];
        }
        let form = dom.find_ancestor_by_tag(radio, "form");
        dom.all_element_nodes()
            .into_iter()
            .filter(|node| {
                input_type(dom, *node) == "radio"
                    && dom.attr(*node, "name").unwrap_or_default() == name
                    && dom.find_ancestor_by_tag(*node, "form") == form
            })
            .collect()
    }

    pub fn set_files(&mut self, selector: &str, files: Vec<FileSpec>) -> Result<()> {
        let target = self.select_one(selector)?;
        if is_effectively_disabled(&self.page.dom, target) {
            return Ok(());
        }
        if !self.page.dom.has_tag(target, "input") || input_type(&self.page.dom, target) != "file" {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "input[type=file]".into(),
                actual: self.page.dom.node_label(target),
            });
        }
        self.page.dom.set_files(target, files)?;
        self.dispatch_field_event(target, FieldEvent::Input)?;
        self.dispatch_field_event(target, FieldEvent::Change)?;
        self.flush()
    }

    pub fn select_value(&mut self, selector: &str, value: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if is_effectively_disabled(&self.page.dom, target) {
            return Ok(());
        }
        if !self.page.dom.has_tag(target, "select") {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "select".into(),
                actual: self.page.dom.node_label(target),
            });
        }
        self.page.dom.set_value(target, value)?;
        self.dispatch_field_event(target, FieldEvent::Input)?;
        self.dispatch_field_event(target, FieldEvent::Change)?;
        self.flush()
    }

    /// Clicks an element. In order of precedence a click follows an error
    /// summary link, navigates a multi-step form, toggles a checkbox or
    /// radio, or submits the owning form.
    pub fn click(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if is_effectively_disabled(&self.page.dom, target) {
            return Ok(());
        }
        let label = self.page.dom.node_label(target);
        self.page.trace(format!("[event] click target={label}"));

        if self.follow_error_link(target)? || self.follow_step_button(target)? {
            return self.flush();
        }

        let kind = input_type(&self.page.dom, target);
        if self.page.dom.has_tag(target, "input") && (kind == "checkbox" || kind == "radio") {
            let checked = kind == "radio" || !self.page.dom.checked(target);
            return self.set_checked(selector, checked);
        }

        let submits = match self.page.dom.tag_name(target) {
            Some("button") => {
                let kind = self.page.dom.attr(target, "type").unwrap_or_default();
                kind.is_empty() || kind.eq_ignore_ascii_case("submit")
            }
            Some("input") => kind == "submit" || kind == "image",
            _ => false,
        };
        if submits {
            if let Some(form) = self.page.dom.find_ancestor_by_tag(target, "form") {
                self.submit_form(form, Some(target))?;
                return Ok(());
            }
        }
        self.flush()
    }

    /// Submits the form matching `selector`, or the form containing it,
    /// without a submitter.
    pub fn submit(&mut self, selector: &str) -> Result<SubmitOutcome> {
        let form = self.select_form(selector)?;
        self.submit_form(form, None)
    }

    /// Parses `html` and appends it to the element matching
    /// `parent_selector`; enhancers attach on the following flush.
    pub fn insert_html(&mut self, parent_selector: &str, html: &str) -> Result<()> {
        let parent = self.select_one(parent_selector)?;
        let fragment = parse_fragment(html)?;
        let adopted = self.page.dom.adopt_fragment(&fragment, parent)?;
        let label = self.page.dom.node_label(parent);
        self.page
            .trace(format!("[dom] insert parent={label} nodes={}", adopted.len()));
        self.flush()
    }

    /// Detaches the element matching `selector`. Enhancers of controls that
    /// leave the document are dropped.
    pub fn remove(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let label = self.page.dom.node_label(target);
        self.page.dom.remove_node(target)?;
        let dom = &self.page.dom;
        self.fields.retain(|node, _| dom.is_connected(*node));
        self.forms.retain(|node, _| dom.is_connected(*node));
        self.observer.forget_disconnected(dom);
        self.page.trace(format!("[dom] remove target={label}"));
        self.flush()
    }

    /// Validates the field at `selector`; group members validate their
    /// group's primary.
    pub fn validate_field(
        &mut self,
        selector: &str,
        show_errors: bool,
        force: bool,
    ) -> Result<ErrorMap> {
        let node = self.field_at(selector)?;
        let representative = self.fields[&node].representative();
        let errors = match self.fields.get_mut(&representative) {
            Some(field) => field.validate(&mut self.page, show_errors, ValidateOptions { force })?,
            None => ErrorMap::new(),
        };
        self.flush()?;
        Ok(errors)
    }

    pub fn validate_group(&self, selector: &str) -> Result<ValidityState> {
        let node = self.field_at(selector)?;
        let representative = self.fields[&node].representative();
        let field = self.fields.get(&representative).unwrap_or(&self.fields[&node]);
        Ok(field.validate_group(&self.page.dom))
    }

    pub fn set_pristine(&mut self, selector: &str, pristine: bool) -> Result<()> {
        let node = self.field_at(selector)?;
        if let Some(field) = self.fields.get_mut(&node) {
            field.set_pristine(&mut self.page, pristine)?;
        }
        self.flush()
    }

    pub fn focus_field(&mut self, selector: &str) -> Result<()> {
        let node = self.field_at(selector)?;
        if let Some(field) = self.fields.get(&node) {
            field.focus(&mut self.page);
        }
        Ok(())
    }

    /// Requests a "next"/"previous" style transition. Returns whether it
    /// happened.
    pub fn navigate_to_step(&mut self, form_selector: &str, index: usize) -> Result<bool> {
        self.request_step(form_selector, StepRequest::Show(index))
    }

    /// Requests a progress-bar jump. Returns whether it happened.
    pub fn progress_navigate(&mut self, form_selector: &str, index: usize) -> Result<bool> {
        self.request_step(form_selector, StepRequest::Progress(index))
    }

    fn request_step(&mut self, form_selector: &str, request: StepRequest) -> Result<bool> {
        let form = self.select_form(form_selector)?;
        let Some(more_step) = self
            .forms
            .get_mut(&form)
            .and_then(|entry| entry.more_step.as_mut())
        else {
            return Err(Error::TypeMismatch {
                selector: form_selector.to_string(),
                expected: "multi-step form".into(),
                actual: self.page.dom.node_label(form),
            });
        };
        let moved = more_step.navigate(&mut self.page, &mut self.fields, request)?;
        self.flush()?;
        Ok(moved)
    }

    /// Re-runs the form summary as the deferred field notification does.
    pub fn update_form(&mut self, form_selector: &str) -> Result<()> {
        let form = self.select_form(form_selector)?;
        self.run_form_update(form)?;
        self.flush()
    }
}
