//! The contract every pipeline stage implements.
//!
//! A task is a description of work, not a result. Each call to
//! [`ComposableTask::run`] or [`ComposableTask::run_with`] evaluates the
//! whole chain from its root again, including every backend call; nothing is
//! cached between calls. Callers that need a result twice should keep the
//! first one.
use async_trait::async_trait;

use crate::shared::cancellation::CancellationToken;
use crate::tasks::error::TaskError;

#[async_trait]
pub trait ComposableTask: Send + Sync {
    type Output: Send;

    /// Runs the chain, checking `cancel` before each backend call and
    /// forwarding it to the backends.
    async fn run_with(&self, cancel: &CancellationToken) -> Result<Self::Output, TaskError>;

    /// Runs the chain with a token nobody can cancel.
    async fn run(&self) -> Result<Self::Output, TaskError> {
        self.run_with(&CancellationToken::new()).await
    }
}

/// Appends a synchronous transform to any task.
pub trait ComposableTaskExt: ComposableTask + Sized {
    fn map<F, T>(self, f: F) -> MapTask<Self, F>
    where
        F: Fn(Self::Output) -> T + Send + Sync,
        T: Send + 'static,
    {
        MapTask { parent: self, f }
    }
}

impl<T: ComposableTask> ComposableTaskExt for T {}

/// Awaits its parent, then transforms the parent's output.
pub struct MapTask<P, F> {
    parent: P,
    f: F,
}

#[async_trait]
impl<P, F, T> ComposableTask for MapTask<P, F>
where
    P: ComposableTask,
    F: Fn(P::Output) -> T + Send + Sync,
    T: Send + 'static,
{
    type Output = T;

    async fn run_with(&self, cancel: &CancellationToken) -> Result<T, TaskError> {
        let parent_output = self.parent.run_with(cancel).await?;
        Ok((self.f)(parent_output))
    }
}
