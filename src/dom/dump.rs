use super::html::is_void_tag;
use super::{Dom, NodeId, NodeKind};

impl Dom {
    /// Serializes `node_id` and its subtree. Attributes come out sorted by
    /// name so dumps are stable across runs.
    pub fn dump_node(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        self.dump_into(node_id, &mut out);
        out
    }

    fn dump_into(&self, node_id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(node_id.0) else {
            return;
        };
        match &node.kind {
            NodeKind::Document => {
                for child in &node.children {
                    self.dump_into(*child, out);
                }
            }
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Element(data) => {
                out.push('<');
                out.push_str(&data.tag_name);
                for (name, value) in &data.attrs {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape_attr(value));
                        out.push('"');
                    }
                }
                out.push('>');
                if is_void_tag(&data.tag_name) {
                    return;
                }
                for child in &node.children {
                    stacker::maybe_grow(64 * 1024, 1024 * 1024, || self.dump_into(*child, out));
                }
                out.push_str("</");
                out.push_str(&data.tag_name);
                out.push('>');
            }
        }
    }

    /// Compact label for trace lines, e.g. `input#email` or `form.Form`.
    pub fn node_label(&self, node_id: NodeId) -> String {
        let Some(tag) = self.tag_name(node_id) else {
            return format!("#node{}", node_id.index());
        };
        if let Some(id) = self.attr(node_id, "id").filter(|id| !id.is_empty()) {
            return format!("{tag}#{id}");
        }
        if let Some(name) = self.attr(node_id, "name").filter(|name| !name.is_empty()) {
            return format!("{tag}[name={name}]");
        }
        match self.attr(node_id, "class") {
            Some(class) if !class.trim().is_empty() => {
                format!("{tag}.{}", class.split_whitespace().collect::<Vec<_>>().join("."))
            }
            _ => tag.to_string(),
        }
    }

    /// Short excerpt of a node's markup for assertion messages.
    pub fn node_snippet(&self, node_id: NodeId) -> String {
        truncate_chars(&self.dump_node(node_id), 200)
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

pub(crate) fn truncate_chars(value: &str, max_chars: usize) -> String {
    let mut it = value.chars();
    let mut out: String = it.by_ref().take(max_chars).collect();
    if it.next().is_some() {
        out.push_str("...");
    }
    out
}
