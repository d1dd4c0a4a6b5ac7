use serde::{Deserialize, Serialize};

use crate::selector::SelectorList;
use crate::{Error, Result};

/// Markup vocabulary and runtime limits.
///
/// The defaults match the markup rendered by the server-side templates, so
/// `FormsConfig::default()` is a drop-in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormsConfig {
    pub field_selector: String,
    pub wrapper_class: String,
    pub group_classes: Vec<String>,
    pub has_error_class: String,
    pub fieldset_class: String,
    pub morestep_class: String,
    pub custom_validation_class: String,
    pub error_summary_class: String,
    pub error_navigation_class: String,
    pub error_navigation_visible_class: String,
    pub error_heading_class: String,
    pub error_link_class: String,
    pub error_description_class: String,
    pub progress_button_selector: String,
    pub step_show_attr: String,
    pub legacy_active_class: String,
    pub default_title_error_pattern: String,
    pub microtask_step_limit: usize,
    /// Most recent scroll targets kept for inspection.
    pub scroll_log_limit: usize,
    pub trace: TraceConfig,
}

impl Default for FormsConfig {
    fn default() -> Self {
        Self {
            field_selector: ".FormField__input, .FormField__textarea".to_string(),
            wrapper_class: "FormField".to_string(),
            group_classes: vec![
                "FormField__group-element".to_string(),
                "FormMultiCheckbox".to_string(),
            ],
            has_error_class: "FormField--has-error".to_string(),
            fieldset_class: "powermail_fieldset".to_string(),
            morestep_class: "powermail_morestep".to_string(),
            custom_validation_class: "Form--custom-validation".to_string(),
            error_summary_class: "Form__error-summary".to_string(),
            error_navigation_class: "Form__error-navigation".to_string(),
            error_navigation_visible_class: "Form__error-navigation--visible".to_string(),
            error_heading_class: "Form__error-heading".to_string(),
            error_link_class: "Form__error-link".to_string(),
            error_description_class: "Form__error-description".to_string(),
            progress_button_selector: ".Progress__button, [data-powermail-morestep-current]"
                .to_string(),
            step_show_attr: "data-powermail-morestep-show".to_string(),
            legacy_active_class: "btn-primary".to_string(),
            default_title_error_pattern: "({0})".to_string(),
            microtask_step_limit: 10_000,
            scroll_log_limit: 1_000,
            trace: TraceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceConfig {
    pub enabled: bool,
    pub to_stderr: bool,
    pub log_limit: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            to_stderr: false,
            log_limit: 10_000,
        }
    }
}

impl FormsConfig {
    /// Parses a JSON document; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|err| Error::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.microtask_step_limit == 0 {
            return Err(Error::Config(
                "microtask_step_limit requires at least 1 step".into(),
            ));
        }
        if self.scroll_log_limit == 0 {
            return Err(Error::Config("scroll_log_limit requires at least 1 entry".into()));
        }
        if self.trace.log_limit == 0 {
            return Err(Error::Config("trace.log_limit requires at least 1 entry".into()));
        }
        if self.field_selector.trim().is_empty() {
            return Err(Error::Config("field_selector must not be empty".into()));
        }
        SelectorList::parse(&self.field_selector)?;
        SelectorList::parse(&self.progress_button_selector)?;
        Ok(())
    }

    /// Selector matching any group member class, e.g.
    /// `.FormField__group-element, .FormMultiCheckbox`.
    pub(crate) fn group_selector(&self) -> String {
        self.group_classes
            .iter()
            .map(|class| format!(".{class}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
