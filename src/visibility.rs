use crate::dom::{Dom, NodeId};

/// Whether `node` is currently rendered.
///
/// Only inline state counts: `style="display: none"`, the `hidden` attribute,
/// and (for ancestors) the `hidden` class. The walk stops below `<body>`;
/// without a body it stops at the document.
pub fn is_field_visible(dom: &Dom, node: NodeId, fieldset_class: &str) -> bool {
    if is_display_none(dom, node) || dom.has_attr(node, "hidden") {
        return false;
    }

    let body = dom.body();
    let mut cursor = dom.parent_element(node);
    while let Some(parent) = cursor {
        if Some(parent) == body {
            break;
        }
        if is_display_none(dom, parent)
            || dom.has_attr(parent, "hidden")
            || dom.has_class(parent, "hidden")
        {
            return false;
        }
        // Step containers are hidden through their inline display.
        if dom.has_class(parent, fieldset_class) && is_display_none(dom, parent) {
            return false;
        }
        cursor = dom.parent_element(parent);
    }
    true
}

fn is_display_none(dom: &Dom, node: NodeId) -> bool {
    dom.style_get(node, "display").eq_ignore_ascii_case("none")
}
