use super::*;

impl FormsRuntime {
    pub fn field(&self, selector: &str) -> Result<&FormField> {
        let node = self.field_at(selector)?;
        self.fields
            .get(&node)
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    #[cfg(test)]
    pub(crate) fn field_mut(&mut self, selector: &str) -> Result<&mut FormField> {
        let node = self.field_at(selector)?;
        self.fields
            .get_mut(&node)
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn more_step(&self, form_selector: &str) -> Result<Option<&MoreStepForm>> {
        let form = self.select_form(form_selector)?;
        Ok(self
            .forms
            .get(&form)
            .and_then(|entry| entry.more_step.as_ref()))
    }

    pub fn form_validation(&self, form_selector: &str) -> Result<Option<&FormValidation>> {
        let form = self.select_form(form_selector)?;
        Ok(self
            .forms
            .get(&form)
            .and_then(|entry| entry.validation.as_ref()))
    }

    /// Whether a single-page form has seen its first submit attempt.
    pub fn is_form_dirty(&self, form_selector: &str) -> Result<bool> {
        let form = self.select_form(form_selector)?;
        Ok(self.forms.get(&form).is_some_and(|entry| entry.dirty))
    }

    pub fn title(&self) -> &str {
        &self.page.title
    }

    pub fn active_element(&self) -> Option<NodeId> {
        self.page.active_element
    }

    pub fn active_element_id(&self) -> Option<String> {
        self.page
            .active_element
            .and_then(|node| self.page.dom.attr(node, "id"))
    }

    /// Elements scrolled into view, oldest first.
    pub fn scroll_log(&self) -> &[NodeId] {
        &self.page.scroll_log
    }

    pub fn dom_write_count(&self) -> u64 {
        self.page.dom.write_count()
    }

    pub fn last_submit(&self) -> Option<SubmitOutcome> {
        self.last_submit
    }

    pub fn pending_microtasks(&self) -> usize {
        self.page.microtasks.len()
    }

    pub fn dump_dom(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.page.dom.dump_node(target))
    }

    pub fn assert_text(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.page.dom.text_content(target);
        if actual != expected {
            return Err(self.assertion_failed(selector, target, expected, actual));
        }
        Ok(())
    }

    pub fn assert_attr(&self, selector: &str, name: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        match self.page.dom.attr(target, name) {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => Err(self.assertion_failed(
                selector,
                target,
                &format!("{name}={expected}"),
                format!("{name}={actual}"),
            )),
            None => Err(self.assertion_failed(
                selector,
                target,
                &format!("{name}={expected}"),
                format!("no {name}"),
            )),
        }
    }

    pub fn assert_no_attr(&self, selector: &str, name: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if let Some(actual) = self.page.dom.attr(target, name) {
            return Err(self.assertion_failed(
                selector,
                target,
                &format!("no {name}"),
                format!("{name}={actual}"),
            ));
        }
        Ok(())
    }

    pub fn assert_class(&self, selector: &str, class_name: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if !self.page.dom.has_class(target, class_name) {
            return Err(self.assertion_failed(
                selector,
                target,
                &format!("class {class_name}"),
                self.page.dom.attr(target, "class").unwrap_or_default(),
            ));
        }
        Ok(())
    }

    pub fn assert_no_class(&self, selector: &str, class_name: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if self.page.dom.has_class(target, class_name) {
            return Err(self.assertion_failed(
                selector,
                target,
                &format!("no class {class_name}"),
                self.page.dom.attr(target, "class").unwrap_or_default(),
            ));
        }
        Ok(())
    }

    pub fn assert_exists(&self, selector: &str) -> Result<()> {
        let _ = self.select_one(selector)?;
        Ok(())
    }

    pub fn assert_missing(&self, selector: &str) -> Result<()> {
        if let Some(target) = self.page.dom.query_selector(selector)? {
            return Err(self.assertion_failed(selector, target, "no match", "match".to_string()));
        }
        Ok(())
    }

    pub fn assert_count(&self, selector: &str, expected: usize) -> Result<()> {
        let actual = self.page.dom.query_selector_all(selector)?.len();
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
                dom_snippet: String::new(),
            });
        }
        Ok(())
    }

    fn assertion_failed(
        &self,
        selector: &str,
        target: NodeId,
        expected: &str,
        actual: String,
    ) -> Error {
        Error::AssertionFailed {
            selector: selector.to_string(),
            expected: expected.to_string(),
            actual,
            dom_snippet: self.page.dom.node_snippet(target),
        }
    }

    pub fn enable_trace(&mut self, enabled: bool) {
        self.page.trace_state.enabled = enabled;
    }

    pub fn set_trace_stderr(&mut self, enabled: bool) {
        self.page.trace_state.to_stderr = enabled;
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::Config(
                "set_trace_log_limit requires at least 1 entry".into(),
            ));
        }
        let trace_state = &mut self.page.trace_state;
        trace_state.log_limit = max_entries;
        while trace_state.logs.len() > trace_state.log_limit {
            trace_state.logs.pop_front();
        }
        Ok(())
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        self.page.trace_state.logs.drain(..).collect()
    }
}
