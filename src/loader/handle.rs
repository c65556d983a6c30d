//! The shared engine handle.
//!
//! One deferred value per engine version per process: every consumer clones
//! the same [`EngineHandle`] and observes the same eventual resolution or
//! rejection. The inner future (script injection completing) runs at most
//! once no matter how many consumers await; late subscribers see the cached
//! outcome immediately.

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};

use crate::engine::Engine;
use crate::error::LoadFailure;

/// Outcome of engine loading.
pub type EngineResult = Result<Engine, LoadFailure>;

type SharedEngineFuture = Shared<LocalBoxFuture<'static, EngineResult>>;

/// The shared deferred "engine, once loaded" value.
///
/// Created at most once per version, never recreated, never torn down -
/// it lives for the process. Clones share the same underlying future.
#[derive(Clone)]
pub struct EngineHandle {
    inner: SharedEngineFuture,
}

impl EngineHandle {
    /// Wrap a load-completion future. The future is driven the first time
    /// any consumer awaits the handle.
    pub(crate) fn new(fut: LocalBoxFuture<'static, EngineResult>) -> Self {
        Self { inner: fut.shared() }
    }

    /// A handle that is already settled - used when no injection can ever
    /// happen (no document context) or in tests.
    pub(crate) fn settled(result: EngineResult) -> Self {
        Self::new(futures::future::ready(result).boxed_local())
    }

    /// Wait for the engine to finish loading. Resolves to the same shared
    /// outcome for every caller; suspends without blocking the thread.
    pub async fn engine(&self) -> EngineResult {
        self.inner.clone().await
    }

    /// The cached outcome, if the handle has already settled.
    pub fn peek(&self) -> Option<EngineResult> {
        self.inner.peek().cloned()
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.inner.peek() {
            None => "pending",
            Some(Ok(_)) => "resolved",
            Some(Err(_)) => "rejected",
        };
        f.debug_struct("EngineHandle").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineV2, TaskQueue};
    use crate::node::NodeHandle;
    use std::cell::Cell;
    use std::rc::Rc;

    struct NoopV2;

    impl EngineV2 for NoopV2 {
        fn hub_queue(&self) -> Rc<TaskQueue> {
            Rc::new(TaskQueue::new())
        }

        fn typeset_node(&self, _node: &NodeHandle) {}
    }

    #[test]
    fn test_all_clones_observe_same_engine() {
        let engine: Rc<dyn EngineV2> = Rc::new(NoopV2);
        let handle = EngineHandle::settled(Ok(Engine::V2(engine.clone())));
        let other = handle.clone();

        let a = futures::executor::block_on(handle.engine()).unwrap();
        let b = futures::executor::block_on(other.engine()).unwrap();

        let (Engine::V2(a), Engine::V2(b)) = (a, b) else {
            panic!("expected v2 engines");
        };
        assert!(Rc::ptr_eq(&a, &b));
        assert!(Rc::ptr_eq(&a, &engine));
    }

    #[test]
    fn test_inner_future_runs_once() {
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        let handle = EngineHandle::new(
            async move {
                counter.set(counter.get() + 1);
                Err(LoadFailure::NoDocument)
            }
            .boxed_local(),
        );

        for _ in 0..3 {
            let outcome = futures::executor::block_on(handle.clone().engine());
            assert!(matches!(outcome, Err(LoadFailure::NoDocument)));
        }
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_peek_before_and_after() {
        let handle = EngineHandle::new(
            async { Err(LoadFailure::injection("network error")) }.boxed_local(),
        );
        assert!(handle.peek().is_none());

        let _ = futures::executor::block_on(handle.engine());
        assert!(matches!(handle.peek(), Some(Err(LoadFailure::Injection { .. }))));
    }
}
