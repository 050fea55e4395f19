//! Argument rewriting from the resolved downstream chain.
//!
//! A placeholder token in the wrapped argv is replaced by the output of its registered
//! transform. The built-in transform pushes literal `grep PATTERN` stages down into the
//! upstream command's own query.
use std::collections::BTreeMap;

use tracing::debug;

use crate::meta::PipelineNode;

/// Replaced by the space-separated literals of pushable downstream `grep` stages.
pub const FILTER_PLACEHOLDER: &str = "{awsLogFilter}";

/// Filtering command recognized by the built-in pushdown.
pub const PUSHDOWN_COMMAND: &str = "grep";

pub type Transform = Box<dyn Fn(Option<&PipelineNode>) -> String + Send + Sync>;

pub struct Rewriter {
    transforms: BTreeMap<String, Transform>,
}

impl Rewriter {
    /// Rewriter with no placeholders registered.
    pub fn empty() -> Self {
        Self {
            transforms: BTreeMap::new(),
        }
    }

    pub fn register<F>(mut self, token: impl Into<String>, transform: F) -> Self
    where
        F: Fn(Option<&PipelineNode>) -> String + Send + Sync + 'static,
    {
        self.transforms.insert(token.into(), Box::new(transform));
        self
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.transforms.keys().map(String::as_str)
    }

    /// Replace every exact placeholder token; everything else passes through.
    pub fn substitute(&self, argv: &[String], downstream: Option<&PipelineNode>) -> Vec<String> {
        argv.iter()
            .map(|arg| match self.transforms.get(arg) {
                Some(transform) => {
                    let value = transform(downstream);
                    debug!(token = %arg, value = %value, "substituted placeholder");
                    value
                }
                None => arg.clone(),
            })
            .collect()
    }
}

impl Default for Rewriter {
    fn default() -> Self {
        Rewriter::empty().register(FILTER_PLACEHOLDER, grep_pushdown)
    }
}

pub fn grep_pushdown(downstream: Option<&PipelineNode>) -> String {
    filter_pushdown(PUSHDOWN_COMMAND, downstream)
}

/// Walk the chain nearest-first, collecting ` LITERAL` for every `<command> LITERAL` stage.
///
/// The first stage of any other shape (another command, or `command` with flags or more
/// arguments) stops accumulation for good: what it does to the stream is unknown. The walk
/// still visits the remaining stages so they show up in debug output.
pub fn filter_pushdown(command: &str, downstream: Option<&PipelineNode>) -> String {
    let mut filter = String::new();
    let mut can_push_down = true;
    for node in downstream.into_iter().flat_map(|n| n.iter()) {
        if node.program() != Some(command) {
            debug!(args = ?node.args, "cannot push down past unknown command");
            can_push_down = false;
            continue;
        }
        match node.args.as_slice() {
            [_, literal] if !literal.starts_with('-') && can_push_down => {
                filter.push(' ');
                filter.push_str(literal);
                debug!(args = ?node.args, "pushed down filter");
            }
            [_, literal] if !literal.starts_with('-') => {
                debug!(args = ?node.args, "filter not pushed down, an earlier stage blocks it");
            }
            _ => {
                debug!(args = ?node.args, "cannot push down filter of unknown shape");
                can_push_down = false;
            }
        }
    }
    filter
}
