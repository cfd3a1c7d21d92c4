use crate::context::StepContext;

/// Result of advancing a step cursor once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Suspended; advance again on a later tick
    Pending,
    /// Finished; the cursor must not be advanced again
    Done,
}

impl StepStatus {
    pub fn is_done(self) -> bool {
        self == StepStatus::Done
    }
}

/// A running cursor over one action's suspension points.
///
/// Every call to [`Step::advance`] runs the action up to its next suspension
/// point. Cursors carry all per-run state (chosen wait target, wander
/// destination...) and are dropped once they report [`StepStatus::Done`] or
/// when their queue is cleared.
pub trait Step: Send {
    fn advance(&mut self, ctx: &mut StepContext<'_>) -> StepStatus;
}

impl<F> Step for F
where
    F: FnMut(&mut StepContext<'_>) -> StepStatus + Send,
{
    fn advance(&mut self, ctx: &mut StepContext<'_>) -> StepStatus {
        self(ctx)
    }
}

/// Box a closure as a step cursor
pub fn step_fn<F>(f: F) -> Box<dyn Step>
where
    F: FnMut(&mut StepContext<'_>) -> StepStatus + Send + 'static,
{
    Box::new(f)
}

/// Stateless template for a step sequence.
///
/// Templates can be enqueued many times (and shared between actors); each
/// [`Action::start`] produces a fresh cursor.
pub trait Action: Send + Sync {
    fn start(&self) -> Box<dyn Step>;

    /// Name used in logs
    fn name(&self) -> &'static str {
        "action"
    }
}

/// Closure-built actions, mostly for content one-offs and tests
pub struct FnAction<F> {
    name: &'static str,
    factory: F,
}

impl<F> FnAction<F>
where
    F: Fn() -> Box<dyn Step> + Send + Sync,
{
    pub fn new(name: &'static str, factory: F) -> Self {
        Self { name, factory }
    }
}

impl<F> Action for FnAction<F>
where
    F: Fn() -> Box<dyn Step> + Send + Sync,
{
    fn start(&self) -> Box<dyn Step> {
        (self.factory)()
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
