use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::Result;
use crate::dom::{Dom, NodeId};
use crate::selector::SelectorList;

pub type Handler<C> = Rc<dyn Fn(&mut C, NodeId) -> Result<()>>;

struct Rule<C> {
    selector: String,
    handler: Handler<C>,
}

/// One pending handler invocation produced by [`Observer::notify_inserted`].
pub struct Dispatch<C> {
    pub selector: String,
    pub node: NodeId,
    pub handler: Handler<C>,
}

/// DOM change subscription registry.
///
/// Rules are `(selector, handler)` pairs kept in registration order. When
/// nodes are inserted, each rule is matched against every inserted element and
/// its descendants; a concrete element is dispatched at most once per rule.
/// Handlers receive the context `C` mutably, so the registry hands back
/// [`Dispatch`] values instead of calling them itself.
pub struct Observer<C> {
    rules: Vec<Rule<C>>,
    processed: HashSet<(usize, NodeId)>,
}

impl<C> Default for Observer<C> {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            processed: HashSet::new(),
        }
    }
}

impl<C> fmt::Debug for Observer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field(
                "rules",
                &self.rules.iter().map(|rule| &rule.selector).collect::<Vec<_>>(),
            )
            .field("processed", &self.processed.len())
            .finish()
    }
}

impl<C> Observer<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule. The selector is parsed eagerly so a bad selector fails
    /// here rather than on the first mutation.
    pub fn register<F>(&mut self, selector: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut C, NodeId) -> Result<()> + 'static,
    {
        SelectorList::parse(selector)?;
        self.rules.push(Rule {
            selector: selector.to_string(),
            handler: Rc::new(handler),
        });
        Ok(())
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Matches the inserted subtrees against every rule and returns the
    /// handler calls still owed, rule by rule, each rule in tree order.
    pub fn notify_inserted(&mut self, dom: &Dom, inserted: &[NodeId]) -> Result<Vec<Dispatch<C>>> {
        let roots = inserted
            .iter()
            .copied()
            .filter(|node| dom.is_element(*node) && dom.is_connected(*node))
            .collect::<Vec<_>>();
        if roots.is_empty() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for (index, rule) in self.rules.iter().enumerate() {
            for node in dom.query_subtrees(&roots, &rule.selector)? {
                if self.processed.insert((index, node)) {
                    out.push(Dispatch {
                        selector: rule.selector.clone(),
                        node,
                        handler: Rc::clone(&rule.handler),
                    });
                }
            }
        }
        Ok(out)
    }

    /// Number of (rule, node) pairs already dispatched.
    pub fn dispatched_count(&self) -> usize {
        self.processed.len()
    }

    /// Drops dispatch bookkeeping for nodes no longer in the document.
    pub fn forget_disconnected(&mut self, dom: &Dom) {
        self.processed.retain(|(_, node)| dom.is_connected(*node));
    }

    /// Initial scan of the whole document.
    pub fn scan(&mut self, dom: &Dom) -> Result<Vec<Dispatch<C>>> {
        let roots = dom.children(dom.root()).to_vec();
        self.notify_inserted(dom, &roots)
    }
}
