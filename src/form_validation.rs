use std::collections::HashMap;

use crate::Result;
use crate::dom::NodeId;
use crate::field::{ErrorMap, FormField, GroupRole, ValidateOptions};
use crate::runtime::Page;
use crate::visibility::is_field_visible;

/// The submit event a validation pass runs for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Submit {
    pub(crate) submitter: Option<NodeId>,
}

/// Form-level controller for forms opting into custom validation: keeps the
/// error summary with deep links, the summary heading and the page title in
/// step with the fields.
#[derive(Debug, Clone)]
pub struct FormValidation {
    form: NodeId,
    fields: Vec<(String, NodeId)>,
    error_summary: Option<NodeId>,
    error_navigation: Option<NodeId>,
    original_title: String,
    navigation_visible: bool,
    error_count: usize,
}

impl FormValidation {
    pub(crate) fn new(
        page: &mut Page,
        form: NodeId,
        fields: &HashMap<NodeId, FormField>,
    ) -> Result<Self> {
        page.dom.set_attr(form, "novalidate", "novalidate")?;

        let summary_selector = format!(".{}", page.config.error_summary_class);
        let error_summary = page.dom.query_selector_from(form, &summary_selector)?;
        let error_navigation = match error_summary {
            Some(summary) => page
                .dom
                .closest(summary, &format!(".{}", page.config.error_navigation_class))?,
            None => None,
        };

        let mut validation = Self {
            form,
            fields: Vec::new(),
            error_summary,
            error_navigation,
            original_title: page.title.clone(),
            navigation_visible: false,
            error_count: 0,
        };
        for element in page.dom.form_elements(form) {
            if let Some(field) = fields.get(&element) {
                validation.register_field(field);
            }
        }
        page.trace(format!(
            "[form] enhance {} fields={}",
            page.dom.node_label(form),
            validation.fields.len()
        ));
        Ok(validation)
    }

    /// Adds a field enhanced after construction. Group members and fields
    /// without an id are not tracked.
    pub(crate) fn register_field(&mut self, field: &FormField) {
        if matches!(field.group(), GroupRole::Member { .. }) {
            return;
        }
        let Some(id) = field.id() else {
            return;
        };
        if self.fields.iter().all(|(known, _)| known != id) {
            self.fields.push((id.to_string(), field.element()));
        }
    }

    pub fn form(&self) -> NodeId {
        self.form
    }

    /// Ids of the tracked fields in registration order.
    pub fn field_ids(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(id, _)| id.as_str())
    }

    pub fn field_node(&self, id: &str) -> Option<NodeId> {
        self.fields
            .iter()
            .find(|(known, _)| known == id)
            .map(|(_, node)| *node)
    }

    pub fn error_summary(&self) -> Option<NodeId> {
        self.error_summary
    }

    pub fn error_navigation(&self) -> Option<NodeId> {
        self.error_navigation
    }

    pub fn navigation_visible(&self) -> bool {
        self.navigation_visible
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn original_title(&self) -> &str {
        &self.original_title
    }

    /// Validates every visible tracked field and refreshes the summary.
    ///
    /// With a submit event the fields are forced and the navigation panel is
    /// focused on failure; the return value tells whether the submission may
    /// proceed. A submitter carrying `formnovalidate` skips validation.
    pub(crate) fn validate(
        &mut self,
        page: &mut Page,
        fields: &mut HashMap<NodeId, FormField>,
        submit: Option<Submit>,
    ) -> Result<bool> {
        let novalidate = submit
            .and_then(|submit| submit.submitter)
            .is_some_and(|submitter| page.dom.has_attr(submitter, "formnovalidate"));

        if !novalidate {
            let options = ValidateOptions {
                force: submit.is_some(),
            };
            let mut errors: Vec<(String, ErrorMap)> = Vec::new();
            for (id, node) in &self.fields {
                if !page.dom.is_connected(*node)
                    || !is_field_visible(&page.dom, *node, &page.config.fieldset_class)
                {
                    continue;
                }
                let Some(field) = fields.get_mut(node) else {
                    continue;
                };
                let field_errors = field.validate(page, true, options)?;
                if !field_errors.is_empty() {
                    errors.push((id.clone(), field_errors));
                }
            }

            if !self.update_error_summary(page, &errors)? {
                self.navigation_visible = true;
                if let Some(navigation) = self.error_navigation {
                    show_error_navigation(page, navigation, submit.is_some())?;
                }
                return Ok(false);
            }
        }

        self.navigation_visible = false;
        if let Some(navigation) = self.error_navigation {
            hide_error_navigation(page, navigation)?;
        }
        Ok(true)
    }

    /// Rebuilds the summary list, heading and title. Returns whether the form
    /// is free of errors.
    fn update_error_summary(
        &mut self,
        page: &mut Page,
        errors: &[(String, ErrorMap)],
    ) -> Result<bool> {
        let error_count = errors.len();
        self.error_count = error_count;

        if let Some(summary) = self.error_summary {
            for child in page.dom.children(summary).to_vec() {
                page.dom.remove_node(child)?;
            }
            for (id, field_errors) in errors {
                let link = page.dom.create_detached_element("a");
                page.dom.set_attr(link, "class", &page.config.error_link_class.clone())?;
                page.dom.set_attr(link, "href", &format!("#{id}"))?;
                let text = field_errors.values().cloned().collect::<Vec<_>>().join("; ");
                page.dom.set_text_content(link, &text)?;

                let item = page.dom.create_detached_element("li");
                let description_class = page.config.error_description_class.clone();
                page.dom.set_attr(item, "class", &description_class)?;
                page.dom.append_child(item, link)?;
                page.dom.append_child(summary, item)?;
            }
        }

        if let Some(navigation) = self.error_navigation {
            let heading_selector = format!(".{}", page.config.error_heading_class);
            if let Some(heading) = page.dom.query_selector_from(navigation, &heading_selector)? {
                let template_attr = if error_count == 1 {
                    "data-heading-single"
                } else {
                    "data-heading-multiple"
                };
                if let Some(template) = page.dom.attr(heading, template_attr) {
                    let text = template.replace("%s", &error_count.to_string());
                    page.dom.set_text_content(heading, &text)?;
                }
            }
        }

        if error_count > 0 {
            let pattern = self
                .error_navigation
                .and_then(|navigation| page.dom.attr(navigation, "data-title-errors"))
                .unwrap_or_else(|| page.config.default_title_error_pattern.clone());
            let title = format!("{pattern} {}", self.original_title)
                .replacen("{0}", &error_count.to_string(), 1);
            page.set_title(&title)?;
        } else if page.title != self.original_title {
            let original = self.original_title.clone();
            page.set_title(&original)?;
        }

        page.trace(format!(
            "[form] summary {} errors={}",
            page.dom.node_label(self.form),
            error_count
        ));
        Ok(error_count == 0)
    }
}

/// Reveals the error navigation panel, optionally moving focus onto it.
pub(crate) fn show_error_navigation(
    page: &mut Page,
    navigation: NodeId,
    focus: bool,
) -> Result<()> {
    let visible_class = page.config.error_navigation_visible_class.clone();
    page.dom.remove_attr(navigation, "hidden")?;
    page.dom.class_add(navigation, &visible_class)?;
    if focus {
        page.focus(navigation);
    }
    Ok(())
}

pub(crate) fn hide_error_navigation(page: &mut Page, navigation: NodeId) -> Result<()> {
    let visible_class = page.config.error_navigation_visible_class.clone();
    page.dom.set_attr(navigation, "hidden", "hidden")?;
    page.dom.class_remove(navigation, &visible_class)?;
    Ok(())
}
