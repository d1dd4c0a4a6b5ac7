use std::collections::VecDeque;

use crate::Result;
use crate::config::{FormsConfig, TraceConfig};
use crate::dom::{Dom, NodeId};

/// Deferred work run after the current action completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Microtask {
    /// Re-run the form-level summary of one form.
    FormUpdate(NodeId),
}

#[derive(Debug, Clone)]
pub(crate) struct TraceState {
    pub(crate) enabled: bool,
    pub(crate) to_stderr: bool,
    pub(crate) logs: VecDeque<String>,
    pub(crate) log_limit: usize,
}

impl From<&TraceConfig> for TraceState {
    fn from(config: &TraceConfig) -> Self {
        Self {
            enabled: config.enabled,
            to_stderr: config.to_stderr,
            logs: VecDeque::new(),
            log_limit: config.log_limit.max(1),
        }
    }
}

/// The browser-side world the enhancers act on: document, focus, scroll
/// position, title and the microtask queue.
#[derive(Debug)]
pub(crate) struct Page {
    pub(crate) dom: Dom,
    pub(crate) config: FormsConfig,
    pub(crate) title: String,
    pub(crate) active_element: Option<NodeId>,
    pub(crate) scroll_log: Vec<NodeId>,
    pub(crate) microtasks: VecDeque<Microtask>,
    pub(crate) trace_state: TraceState,
}

impl Page {
    pub(crate) fn new(dom: Dom, config: FormsConfig) -> Self {
        let title = dom
            .all_element_nodes()
            .into_iter()
            .find(|node| dom.has_tag(*node, "title"))
            .map(|node| dom.text_content(node).trim().to_string())
            .unwrap_or_default();
        let trace_state = TraceState::from(&config.trace);
        Self {
            dom,
            config,
            title,
            active_element: None,
            scroll_log: Vec::new(),
            microtasks: VecDeque::new(),
            trace_state,
        }
    }

    pub(crate) fn trace(&mut self, line: String) {
        tracing::debug!(target: "tw_forms", "{line}");
        if !self.trace_state.enabled {
            return;
        }
        if self.trace_state.to_stderr {
            eprintln!("{line}");
        }
        if self.trace_state.logs.len() >= self.trace_state.log_limit {
            self.trace_state.logs.pop_front();
        }
        self.trace_state.logs.push_back(line);
    }

    pub(crate) fn focus(&mut self, node: NodeId) {
        self.active_element = Some(node);
        let label = self.dom.node_label(node);
        self.trace(format!("[focus] {label}"));
    }

    /// Records a scroll target, dropping the oldest beyond the configured limit.
    pub(crate) fn scroll_into_view(&mut self, node: NodeId) {
        let limit = self.config.scroll_log_limit.max(1);
        if self.scroll_log.len() >= limit {
            let excess = self.scroll_log.len() + 1 - limit;
            self.scroll_log.drain(..excess);
        }
        self.scroll_log.push(node);
    }

    /// Queues a summary refresh for `form`; one pending refresh per form.
    pub(crate) fn queue_form_update(&mut self, form: NodeId) {
        let task = Microtask::FormUpdate(form);
        if !self.microtasks.contains(&task) {
            self.microtasks.push_back(task);
        }
    }

    /// Replaces `document.title`, mirroring it into `<title>` when present.
    pub(crate) fn set_title(&mut self, title: &str) -> Result<()> {
        if self.title == title {
            return Ok(());
        }
        self.title = title.to_string();
        if let Some(node) = self
            .dom
            .all_element_nodes()
            .into_iter()
            .find(|node| self.dom.has_tag(*node, "title"))
        {
            self.dom.set_text_content(node, title)?;
        }
        Ok(())
    }
}
