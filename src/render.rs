use crate::field::ErrorMap;

/// What a field last wrote to its error container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSnapshot {
    pub constraints: u32,
    pub error_string: String,
    /// `None` until the first render, so that render always happens.
    pub pristine: Option<bool>,
}

impl RenderSnapshot {
    pub fn new(constraints: u32, errors: &ErrorMap, pristine: bool) -> Self {
        Self {
            constraints,
            error_string: serialize_errors(errors),
            pristine: Some(pristine),
        }
    }

    /// Snapshot seeded from constraints already present in server markup.
    pub fn seeded(constraints: u32) -> Self {
        Self {
            constraints,
            error_string: String::new(),
            pristine: None,
        }
    }
}

/// Memoized-render check: a field rewrites its error container only when the
/// bitmask, the serialized messages or the pristine flag changed.
pub fn should_rerender(prev: &RenderSnapshot, next: &RenderSnapshot) -> bool {
    prev.constraints != next.constraints
        || prev.error_string != next.error_string
        || prev.pristine != next.pristine
}

pub(crate) fn serialize_errors(errors: &ErrorMap) -> String {
    // Constraint keys serialize as strings, so this cannot fail.
    serde_json::to_string(errors).unwrap_or_default()
}
