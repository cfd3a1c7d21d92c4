//! Externally registered dialog fragments, run in registration order.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::trace;

use crate::dialog::Dialog;
use crate::error::DialogError;

/// Hook run when a player ends a conversation with `talk_end`
pub const END_CONVERSATION: &str = "end_conversation";

/// What a fragment yields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookResult {
    /// Run the next fragment
    Continue,
    /// Skip the remaining fragments and return to the conversation
    Break,
}

/// How a pipeline run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    /// Every fragment ran (or none were registered)
    Completed,
    /// A fragment yielded [`HookResult::Break`]
    ShortCircuited,
}

pub type HookFuture = BoxFuture<'static, Result<HookResult, DialogError>>;
pub type HookFragment = Arc<dyn Fn(Dialog) -> HookFuture + Send + Sync>;

/// Registration table of hook fragments keyed by (subject, hook name).
///
/// Built once at startup and shared read-only afterwards.
#[derive(Default)]
pub struct HookRegistry {
    fragments: HashMap<(String, String), Vec<HookFragment>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, subject: &str, hook: &str, fragment: F)
    where
        F: Fn(Dialog) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookResult, DialogError>> + Send + 'static,
    {
        let boxed: HookFragment =
            Arc::new(move |dialog: Dialog| -> HookFuture { Box::pin(fragment(dialog)) });
        self.fragments
            .entry((subject.to_string(), hook.to_string()))
            .or_default()
            .push(boxed);
    }

    /// Number of fragments registered under a key
    pub fn count(&self, subject: &str, hook: &str) -> usize {
        self.fragments(subject, hook).len()
    }

    pub fn fragments(&self, subject: &str, hook: &str) -> Vec<HookFragment> {
        self.fragments
            .get(&(subject.to_string(), hook.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Run every fragment for the key in order. A failing fragment stops the
    /// pipeline and its error propagates.
    pub async fn run(
        &self,
        subject: &str,
        hook: &str,
        dialog: &Dialog,
    ) -> Result<HookOutcome, DialogError> {
        for (index, fragment) in self.fragments(subject, hook).into_iter().enumerate() {
            if fragment(dialog.clone()).await? == HookResult::Break {
                trace!(target: "hooks", "{}/{} stopped at fragment {}", subject, hook, index);
                return Ok(HookOutcome::ShortCircuited);
            }
        }
        Ok(HookOutcome::Completed)
    }
}
