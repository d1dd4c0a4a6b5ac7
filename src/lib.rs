//! Client-side form validation and multi-step navigation engine.
//!
//! The engine enhances server-rendered form markup: every control matching the
//! field selector gets a [`FormField`] that tracks its constraint state and
//! renders error messages, forms marked for custom validation get a
//! [`FormValidation`] error summary, and multi-step forms get a
//! [`MoreStepForm`] that gates forward navigation behind per-step validation.
//!
//! Everything runs against a deterministic in-memory DOM owned by
//! [`FormsRuntime`], which also plays the part of the browser event loop.

mod config;
mod dom;
mod error_map;
mod field;
mod form_validation;
mod more_step;
mod observer;
mod render;
mod runtime;
mod selector;
mod validators;
mod validity;
mod visibility;

pub use config::{FormsConfig, TraceConfig};
pub use dom::{Dom, FileSpec, NodeId, parse_fragment};
pub use error_map::{
    MappedError, ServerValidator, constraint_code, constraint_for_error_code, inverse_map,
    map_server_error,
};
pub use field::{ErrorMap, FieldKind, FormField, GroupRole, ValidateOptions};
pub use form_validation::FormValidation;
pub use more_step::{MoreStepForm, StepRequest};
pub use observer::{Dispatch, Handler, Observer};
pub use render::{RenderSnapshot, should_rerender};
pub use runtime::{FormsRuntime, SubmitOutcome};
pub use validators::CustomValidator;
pub use validity::{
    Constraint, ValidityState, bitmask_of, compute_validity, default_validation_message,
};
pub use visibility::is_field_visible;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("html parse error: {0}")]
    HtmlParse(String),
    #[error("unsupported selector: {0}")]
    UnsupportedSelector(String),
    #[error("selector not found: {0}")]
    SelectorNotFound(String),
    #[error("type mismatch for {selector}: expected {expected}, actual {actual}")]
    TypeMismatch {
        selector: String,
        expected: String,
        actual: String,
    },
    #[error(
        "assertion failed for {selector}: expected {expected}, actual {actual}, snippet {dom_snippet}"
    )]
    AssertionFailed {
        selector: String,
        expected: String,
        actual: String,
        dom_snippet: String,
    },
    #[error("config error: {0}")]
    Config(String),
    #[error("microtask queue did not settle within {limit} steps")]
    MicrotaskLimitExceeded { limit: usize },
    #[error("dom error: {0}")]
    Dom(String),
}

#[cfg(test)]
mod tests;
