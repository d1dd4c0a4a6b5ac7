//! A small arena DOM: just enough document model for form enhancement to read
//! controls, write error markup and toggle visibility.

use std::collections::{BTreeMap, HashMap};

use crate::selector::SelectorList;
use crate::{Error, Result};

mod dump;
pub(crate) mod html;
mod query;

pub use html::parse_fragment;

/// Handle of one node in a [`Dom`] arena. Handles stay valid after the node is
/// detached; detached nodes simply stop being reachable from the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A file selected in an `<input type="file">`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpec {
    pub name: String,
    pub size: u64,
}

impl FileSpec {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Document,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) kind: NodeKind,
}

/// Markup attributes plus the live control state that diverges from them
/// once the user interacts.
#[derive(Debug, Clone)]
pub(crate) struct ElementData {
    pub(crate) tag_name: String,
    pub(crate) attrs: BTreeMap<String, String>,
    pub(crate) value: String,
    pub(crate) checked: bool,
    pub(crate) files: Vec<FileSpec>,
}

impl ElementData {
    fn new(tag_name: String, attrs: BTreeMap<String, String>) -> Self {
        Self {
            value: attrs.get("value").cloned().unwrap_or_default(),
            checked: attrs.contains_key("checked"),
            files: Vec::new(),
            tag_name,
            attrs,
        }
    }

    fn classes(&self) -> impl Iterator<Item = &str> {
        self.attrs
            .get("class")
            .map(String::as_str)
            .unwrap_or_default()
            .split_whitespace()
    }
}

/// Arena-backed document tree.
///
/// Besides the tree itself the document keeps a journal of inserted nodes
/// (drained by the mutation observer) and a running count of writes, which is
/// what render idempotence is measured against.
#[derive(Debug, Clone)]
pub struct Dom {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    id_index: HashMap<String, NodeId>,
    inserted: Vec<NodeId>,
    write_count: u64,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
            root: NodeId(0),
            id_index: HashMap::new(),
            inserted: Vec::new(),
            write_count: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn write_count(&self) -> u64 {
        self.write_count
    }

    pub(crate) fn take_inserted(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.inserted)
    }

    fn alloc(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            kind,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    /// Creates an element while building a tree; the node is not journaled.
    pub(crate) fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: String,
        attrs: BTreeMap<String, String>,
    ) -> NodeId {
        let id_attr = attrs.get("id").filter(|id| !id.is_empty()).cloned();
        let node = self.alloc(Some(parent), NodeKind::Element(ElementData::new(tag_name, attrs)));
        if let Some(id_attr) = id_attr {
            if self.is_connected(node) {
                self.id_index.entry(id_attr).or_insert(node);
            }
        }
        node
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.alloc(Some(parent), NodeKind::Text(text))
    }

    pub(crate) fn create_detached_element(&mut self, tag_name: &str) -> NodeId {
        let data = ElementData::new(tag_name.to_ascii_lowercase(), BTreeMap::new());
        self.alloc(None, NodeKind::Element(data))
    }

    pub(crate) fn element(&self, node_id: NodeId) -> Option<&ElementData> {
        match &self.nodes.get(node_id.0)?.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    /// Mutable element access for a write; every successful call counts as
    /// one DOM write.
    fn write(&mut self, node_id: NodeId, what: &str) -> Result<&mut ElementData> {
        let Some(Node {
            kind: NodeKind::Element(data),
            ..
        }) = self.nodes.get_mut(node_id.0)
        else {
            return Err(Error::Dom(format!("{what} target is not an element")));
        };
        self.write_count += 1;
        Ok(data)
    }

    /// Internal state sync that does not count as a write.
    fn sync_mut(&mut self, node_id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes.get_mut(node_id.0)?.kind {
            NodeKind::Element(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_element(&self, node_id: NodeId) -> bool {
        self.element(node_id).is_some()
    }

    pub fn tag_name(&self, node_id: NodeId) -> Option<&str> {
        self.element(node_id).map(|data| data.tag_name.as_str())
    }

    pub fn has_tag(&self, node_id: NodeId, tag: &str) -> bool {
        self.tag_name(node_id)
            .is_some_and(|name| name.eq_ignore_ascii_case(tag))
    }

    pub fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes.get(node_id.0)?.parent
    }

    /// Parent element, skipping the document node.
    pub fn parent_element(&self, node_id: NodeId) -> Option<NodeId> {
        self.parent(node_id).filter(|parent| self.is_element(*parent))
    }

    fn ancestors(&self, node_id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(node_id), |node| self.parent(*node))
    }

    pub fn children(&self, node_id: NodeId) -> &[NodeId] {
        self.nodes
            .get(node_id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    pub fn by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index.get(id).copied()
    }

    pub fn is_connected(&self, node_id: NodeId) -> bool {
        node_id == self.root || self.ancestors(node_id).any(|node| node == self.root)
    }

    pub fn is_descendant_of(&self, node_id: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(node_id).any(|node| node == ancestor)
    }

    pub fn find_ancestor_by_tag(&self, node_id: NodeId, tag: &str) -> Option<NodeId> {
        self.ancestors(node_id).find(|node| self.has_tag(*node, tag))
    }

    pub fn body(&self) -> Option<NodeId> {
        self.all_element_nodes()
            .into_iter()
            .find(|node| self.has_tag(*node, "body"))
    }

    pub fn text_content(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        self.append_text(node_id, &mut out);
        out
    }

    fn append_text(&self, node_id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(node_id.0) else {
            return;
        };
        if let NodeKind::Text(text) = &node.kind {
            out.push_str(text);
            return;
        }
        for child in &node.children {
            stacker::maybe_grow(64 * 1024, 1024 * 1024, || self.append_text(*child, out));
        }
    }

    /// Replaces all children of `node_id` with a single text node.
    pub(crate) fn set_text_content(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        self.write(node_id, "textContent")?;
        for child in std::mem::take(&mut self.nodes[node_id.0].children) {
            self.nodes[child.0].parent = None;
        }
        if !value.is_empty() {
            self.create_text(node_id, value.to_string());
        }
        self.rebuild_id_index();
        Ok(())
    }

    pub fn value(&self, node_id: NodeId) -> String {
        self.element(node_id)
            .map(|data| data.value.clone())
            .unwrap_or_default()
    }

    pub(crate) fn set_value(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        if self.has_tag(node_id, "select") {
            return self.select_option_by_value(node_id, value);
        }
        self.write(node_id, "value")?.value = value.to_string();
        Ok(())
    }

    pub fn checked(&self, node_id: NodeId) -> bool {
        self.element(node_id).is_some_and(|data| data.checked)
    }

    pub(crate) fn set_checked(&mut self, node_id: NodeId, checked: bool) -> Result<()> {
        self.write(node_id, "checked")?.checked = checked;
        Ok(())
    }

    pub fn files(&self, node_id: NodeId) -> &[FileSpec] {
        self.element(node_id)
            .map(|data| data.files.as_slice())
            .unwrap_or_default()
    }

    /// Stores the selection; the control's value becomes the first file name,
    /// which is what `value` reports for file inputs.
    pub(crate) fn set_files(&mut self, node_id: NodeId, files: Vec<FileSpec>) -> Result<()> {
        let data = self.write(node_id, "files")?;
        data.value = files.first().map(|file| file.name.clone()).unwrap_or_default();
        data.files = files;
        Ok(())
    }

    pub fn attr(&self, node_id: NodeId, name: &str) -> Option<String> {
        self.element(node_id)?
            .attrs
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    pub fn has_attr(&self, node_id: NodeId, name: &str) -> bool {
        self.element(node_id)
            .is_some_and(|data| data.attrs.contains_key(&name.to_ascii_lowercase()))
    }

    /// First non-empty value among `names`, in order.
    pub fn first_attr(&self, node_id: NodeId, names: &[&str]) -> Option<String> {
        names
            .iter()
            .filter_map(|name| self.attr(node_id, name))
            .find(|value| !value.is_empty())
    }

    pub(crate) fn set_attr(&mut self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        let name = name.to_ascii_lowercase();
        let data = self.write(node_id, "setAttribute")?;
        data.attrs.insert(name.clone(), value.to_string());
        match name.as_str() {
            "value" => data.value = value.to_string(),
            "checked" => data.checked = true,
            _ => {}
        }
        let is_option = data.tag_name.eq_ignore_ascii_case("option");

        if name == "id" {
            self.rebuild_id_index();
        }
        if is_option && matches!(name.as_str(), "selected" | "value") {
            if let Some(select) = self.find_ancestor_by_tag(node_id, "select") {
                self.sync_select_value(select);
            }
        }
        Ok(())
    }

    pub(crate) fn remove_attr(&mut self, node_id: NodeId, name: &str) -> Result<()> {
        let name = name.to_ascii_lowercase();
        let data = self.write(node_id, "removeAttribute")?;
        data.attrs.remove(&name);
        if name == "checked" {
            data.checked = false;
        }
        if name == "id" {
            self.rebuild_id_index();
        }
        Ok(())
    }

    pub fn has_class(&self, node_id: NodeId, class_name: &str) -> bool {
        self.element(node_id)
            .is_some_and(|data| has_class(data, class_name))
    }

    pub(crate) fn class_add(&mut self, node_id: NodeId, class_name: &str) -> Result<()> {
        self.class_toggle(node_id, class_name, true)
    }

    pub(crate) fn class_remove(&mut self, node_id: NodeId, class_name: &str) -> Result<()> {
        self.class_toggle(node_id, class_name, false)
    }

    /// Adds or removes one class token, normalizing the attribute's
    /// whitespace and dropping it once no tokens remain.
    pub(crate) fn class_toggle(
        &mut self,
        node_id: NodeId,
        class_name: &str,
        on: bool,
    ) -> Result<()> {
        let data = self.write(node_id, "classList")?;
        let mut tokens: Vec<String> = data
            .classes()
            .filter(|token| *token != class_name)
            .map(str::to_string)
            .collect();
        let position = data.classes().position(|token| token == class_name);
        if on {
            let at = position.unwrap_or(tokens.len()).min(tokens.len());
            tokens.insert(at, class_name.to_string());
        }
        if tokens.is_empty() {
            data.attrs.remove("class");
        } else {
            data.attrs.insert("class".to_string(), tokens.join(" "));
        }
        Ok(())
    }

    /// Reads one inline style declaration, e.g. `display`.
    pub fn style_get(&self, node_id: NodeId, name: &str) -> String {
        InlineStyle::parse(self.attr(node_id, "style").as_deref())
            .get(name)
            .unwrap_or_default()
            .to_string()
    }

    /// Writes one inline style declaration; an empty value removes it.
    pub(crate) fn style_set(&mut self, node_id: NodeId, name: &str, value: &str) -> Result<()> {
        let data = self.write(node_id, "style")?;
        let mut style = InlineStyle::parse(data.attrs.get("style").map(String::as_str));
        style.set(name, value);
        match style.serialize() {
            Some(css) => data.attrs.insert("style".to_string(), css),
            None => data.attrs.remove("style"),
        };
        Ok(())
    }

    /// Moves `child` under `parent`, journaling it when it lands in the
    /// connected tree.
    pub(crate) fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if !self.can_have_children(parent) {
            return Err(Error::Dom("appendChild target cannot have children".into()));
        }
        if child == self.root || child.0 >= self.nodes.len() {
            return Err(Error::Dom("invalid appendChild node".into()));
        }
        if parent == child || self.is_descendant_of(parent, child) {
            return Err(Error::Dom("appendChild would create a cycle".into()));
        }

        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        self.rebuild_id_index();
        if self.is_connected(child) {
            self.inserted.push(child);
        }
        self.write_count += 1;
        Ok(())
    }

    /// Detaches `node` from its parent. Detached and root nodes are rejected
    /// or ignored as a browser would.
    pub(crate) fn remove_node(&mut self, node: NodeId) -> Result<()> {
        if node == self.root {
            return Err(Error::Dom("cannot remove document root".into()));
        }
        if self.detach(node) {
            self.rebuild_id_index();
            self.write_count += 1;
        }
        Ok(())
    }

    fn detach(&mut self, node: NodeId) -> bool {
        let Some(parent) = self.nodes.get_mut(node.0).and_then(|slot| slot.parent.take()) else {
            return false;
        };
        self.nodes[parent.0].children.retain(|child| *child != node);
        true
    }

    /// Moves every top-level node of `fragment` under `parent` and journals
    /// each moved subtree root as inserted.
    pub(crate) fn adopt_fragment(&mut self, fragment: &Dom, parent: NodeId) -> Result<Vec<NodeId>> {
        if !self.can_have_children(parent) {
            return Err(Error::Dom("fragment target cannot have children".into()));
        }
        fragment
            .children(fragment.root)
            .iter()
            .map(|top| {
                let copy = self.copy_subtree(fragment, *top, None);
                self.append_child(parent, copy).map(|()| copy)
            })
            .collect()
    }

    fn copy_subtree(&mut self, source: &Dom, from: NodeId, parent: Option<NodeId>) -> NodeId {
        let copy = self.alloc(parent, source.nodes[from.0].kind.clone());
        for child in source.children(from) {
            stacker::maybe_grow(64 * 1024, 1024 * 1024, || {
                self.copy_subtree(source, *child, Some(copy))
            });
        }
        copy
    }

    fn can_have_children(&self, node_id: NodeId) -> bool {
        self.nodes
            .get(node_id.0)
            .is_some_and(|node| !matches!(node.kind, NodeKind::Text(_)))
    }

    /// Earliest element in tree order wins a duplicated id.
    fn rebuild_id_index(&mut self) {
        let mut index = HashMap::new();
        for node in self.all_element_nodes() {
            if let Some(id) = self.element(node).and_then(|data| data.attrs.get("id")) {
                if !id.is_empty() && !index.contains_key(id) {
                    index.insert(id.clone(), node);
                }
            }
        }
        self.id_index = index;
    }

    /// Seeds live control values that markup expresses through content:
    /// textarea text and the selected option.
    pub(crate) fn initialize_form_control_values(&mut self) {
        for node in self.all_element_nodes() {
            let value = match self.tag_name(node) {
                Some("textarea") => self.text_content(node),
                Some("select") => self.selected_option_value(node),
                _ => continue,
            };
            if let Some(data) = self.sync_mut(node) {
                data.value = value;
            }
        }
    }

    fn select_option_by_value(&mut self, select: NodeId, requested: &str) -> Result<()> {
        let options = self.options_of(select);
        let chosen = options
            .iter()
            .copied()
            .find(|option| self.option_value(*option) == requested);
        for option in options {
            if let Some(data) = self.sync_mut(option) {
                if Some(option) == chosen {
                    data.attrs.insert("selected".into(), "true".into());
                } else {
                    data.attrs.remove("selected");
                }
            }
        }
        let value = chosen.map(|option| self.option_value(option)).unwrap_or_default();
        self.write(select, "select")?.value = value;
        Ok(())
    }

    fn sync_select_value(&mut self, select: NodeId) {
        let value = self.selected_option_value(select);
        if let Some(data) = self.sync_mut(select) {
            data.value = value;
        }
    }

    /// Value of the first `selected` option, falling back to the first option.
    fn selected_option_value(&self, select: NodeId) -> String {
        let options = self.options_of(select);
        options
            .iter()
            .copied()
            .find(|option| self.has_attr(*option, "selected"))
            .or_else(|| options.first().copied())
            .map(|option| self.option_value(option))
            .unwrap_or_default()
    }

    fn options_of(&self, select: NodeId) -> Vec<NodeId> {
        let mut options = Vec::new();
        self.collect_elements_descendants_dfs(select, &mut options);
        options.retain(|node| self.has_tag(*node, "option"));
        options
    }

    fn option_value(&self, option: NodeId) -> String {
        self.attr(option, "value")
            .unwrap_or_else(|| self.text_content(option).trim().to_string())
    }

    /// Pushes `node_id` (when it is an element) and every element below it,
    /// in tree order.
    pub(crate) fn collect_elements_dfs(&self, node_id: NodeId, out: &mut Vec<NodeId>) {
        if self.is_element(node_id) {
            out.push(node_id);
        }
        self.collect_elements_descendants_dfs(node_id, out);
    }

    pub(crate) fn collect_elements_descendants_dfs(&self, node_id: NodeId, out: &mut Vec<NodeId>) {
        for child in self.children(node_id) {
            stacker::maybe_grow(64 * 1024, 1024 * 1024, || {
                self.collect_elements_dfs(*child, out)
            });
        }
    }

    pub fn all_element_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_elements_descendants_dfs(self.root, &mut out);
        out
    }

    /// Form-associated controls of `form` in tree order, like `form.elements`.
    pub fn form_elements(&self, form: NodeId) -> Vec<NodeId> {
        const LISTED: &[&str] = &["input", "select", "textarea", "button", "fieldset", "output"];
        let mut out = Vec::new();
        self.collect_elements_descendants_dfs(form, &mut out);
        out.retain(|node| self.tag_name(*node).is_some_and(|tag| LISTED.contains(&tag)));
        out
    }

    fn parse_selector(selector: &str) -> Result<SelectorList> {
        SelectorList::parse(selector)
    }
}

pub(crate) fn has_class(data: &ElementData, class_name: &str) -> bool {
    data.classes().any(|token| token == class_name)
}

/// Ordered `property: value` pairs of a `style` attribute.
struct InlineStyle(Vec<(String, String)>);

impl InlineStyle {
    fn parse(attr: Option<&str>) -> Self {
        let mut style = Self(Vec::new());
        for decl in attr.unwrap_or_default().split(';') {
            if let Some((name, value)) = decl.split_once(':') {
                let name = name.trim().to_ascii_lowercase();
                if !name.is_empty() {
                    style.set(&name, value.trim());
                }
            }
        }
        style
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(prop, _)| prop.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn set(&mut self, name: &str, value: &str) {
        let existing = self.0.iter().position(|(prop, _)| prop == name);
        match (existing, value.is_empty()) {
            (Some(pos), true) => {
                self.0.remove(pos);
            }
            (Some(pos), false) => self.0[pos].1 = value.to_string(),
            (None, false) => self.0.push((name.to_string(), value.to_string())),
            (None, true) => {}
        }
    }

    fn serialize(&self) -> Option<String> {
        if self.0.is_empty() {
            return None;
        }
        let decls: Vec<String> = self
            .0
            .iter()
            .map(|(name, value)| format!("{name}: {value};"))
            .collect();
        Some(decls.join(" "))
    }
}
