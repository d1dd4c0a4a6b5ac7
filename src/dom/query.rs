use std::collections::HashSet;

use super::{Dom, NodeId, has_class};
use crate::Result;
use crate::selector::{Combinator, Complex, Compound, Pseudo, SelectorList};

impl Dom {
    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let list = Self::parse_selector(selector)?;
        if let Some(id) = list.lone_id() {
            return Ok(self.by_id(id).into_iter().collect());
        }
        Ok(self.filter_matching(self.all_element_nodes(), &list))
    }

    /// First descendant of `root` matching `selector`; `root` itself is skipped.
    pub fn query_selector_from(&self, root: NodeId, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.query_selector_all_from(root, selector)?.into_iter().next())
    }

    pub fn query_selector_all_from(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>> {
        let list = Self::parse_selector(selector)?;
        let mut scope = Vec::new();
        self.collect_elements_descendants_dfs(root, &mut scope);
        Ok(self.filter_matching(scope, &list))
    }

    /// Matches within each subtree of `roots`, roots included, deduplicated
    /// and in the order the roots were given.
    pub(crate) fn query_subtrees(&self, roots: &[NodeId], selector: &str) -> Result<Vec<NodeId>> {
        let list = Self::parse_selector(selector)?;
        let mut scope = Vec::new();
        for root in roots {
            self.collect_elements_dfs(*root, &mut scope);
        }
        Ok(self.filter_matching(scope, &list))
    }

    pub fn matches(&self, node_id: NodeId, selector: &str) -> Result<bool> {
        if !self.is_element(node_id) {
            return Ok(false);
        }
        let list = Self::parse_selector(selector)?;
        Ok(self.matches_list(node_id, &list))
    }

    /// Nearest inclusive ancestor matching `selector`.
    pub fn closest(&self, node_id: NodeId, selector: &str) -> Result<Option<NodeId>> {
        if !self.is_element(node_id) {
            return Ok(None);
        }
        let list = Self::parse_selector(selector)?;
        Ok(std::iter::successors(Some(node_id), |node| self.parent_element(*node))
            .find(|node| self.matches_list(*node, &list)))
    }

    fn filter_matching(&self, scope: Vec<NodeId>, list: &SelectorList) -> Vec<NodeId> {
        let mut seen = HashSet::with_capacity(scope.len());
        scope
            .into_iter()
            .filter(|node| seen.insert(*node) && self.matches_list(*node, list))
            .collect()
    }

    fn matches_list(&self, node: NodeId, list: &SelectorList) -> bool {
        list.0.iter().any(|complex| {
            complex
                .parts
                .len()
                .checked_sub(1)
                .is_some_and(|last| self.matches_complex(node, complex, last))
        })
    }

    /// Right-to-left match of `complex.parts[..=index]` with `node` as the
    /// subject of `parts[index]`. Backtracks over candidate ancestors and
    /// siblings.
    fn matches_complex(&self, node: NodeId, complex: &Complex, index: usize) -> bool {
        if !self.matches_compound(node, &complex.parts[index]) {
            return false;
        }
        let Some(prev) = index.checked_sub(1) else {
            return true;
        };
        match complex.links[prev] {
            Combinator::Child => self
                .parent_element(node)
                .is_some_and(|parent| self.matches_complex(parent, complex, prev)),
            Combinator::Adjacent => self
                .previous_element_sibling(node)
                .is_some_and(|sibling| self.matches_complex(sibling, complex, prev)),
            Combinator::Descendant => {
                std::iter::successors(self.parent_element(node), |n| self.parent_element(*n))
                    .any(|ancestor| self.matches_complex(ancestor, complex, prev))
            }
            Combinator::Sibling => std::iter::successors(self.previous_element_sibling(node), |n| {
                self.previous_element_sibling(*n)
            })
            .any(|sibling| self.matches_complex(sibling, complex, prev)),
        }
    }

    fn matches_compound(&self, node: NodeId, compound: &Compound) -> bool {
        let Some(element) = self.element(node) else {
            return false;
        };
        let attr = |name: &str| element.attrs.get(name).map(String::as_str);

        compound
            .tag
            .as_deref()
            .is_none_or(|tag| element.tag_name.eq_ignore_ascii_case(tag))
            && compound.id.as_deref().is_none_or(|id| attr("id") == Some(id))
            && compound.classes.iter().all(|class| has_class(element, class))
            && compound.attrs.iter().all(|test| test.matches(attr(&test.name)))
            && compound.pseudos.iter().all(|pseudo| match pseudo {
                Pseudo::FirstChild => self.previous_element_sibling(node).is_none(),
                Pseudo::LastChild => self.next_element_sibling(node).is_none(),
                Pseudo::Checked => element.checked,
                Pseudo::Disabled => attr("disabled").is_some(),
                Pseudo::Enabled => attr("disabled").is_none(),
                Pseudo::Required => attr("required").is_some(),
                Pseudo::Not(inner) => !self.matches_list(node, inner),
            })
    }

    /// Element siblings of `node_id` together with its position among them.
    fn element_position(&self, node_id: NodeId) -> Option<(Vec<NodeId>, usize)> {
        let parent = self.parent(node_id)?;
        let siblings: Vec<NodeId> = self
            .children(parent)
            .iter()
            .copied()
            .filter(|child| self.is_element(*child))
            .collect();
        let position = siblings.iter().position(|sibling| *sibling == node_id)?;
        Some((siblings, position))
    }

    pub fn previous_element_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let (siblings, position) = self.element_position(node_id)?;
        siblings.get(position.checked_sub(1)?).copied()
    }

    pub fn next_element_sibling(&self, node_id: NodeId) -> Option<NodeId> {
        let (siblings, position) = self.element_position(node_id)?;
        siblings.get(position + 1).copied()
    }
}
