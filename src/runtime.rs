//! Runtime abstraction layer for async operations
//!
//! Thumbnail fetches are the only asynchronous work the engine starts. They
//! are spawned through [`AsyncSpawner`] so the crate does not hard-wire one
//! executor: tokio when the `tokio-runtime` feature is enabled, or the inline
//! spawner (drives the future to completion on the calling thread) for hosts
//! and tests without a runtime.

use crate::prelude::{Future, Pin};

/// A trait for spawning async tasks (object-safe version)
pub trait AsyncSpawner: Send + Sync + 'static {
    /// Spawn a future and return a handle to it
    fn spawn_boxed(
        &self,
        future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
    ) -> Box<dyn AsyncHandle>;
}

/// Handle to a spawned async task
pub trait AsyncHandle: Send + Sync {
    /// Check if the task is finished
    fn is_finished(&self) -> bool;

    /// Cancel the task
    fn cancel(&self);
}

/// Runs futures to completion on the calling thread
pub struct InlineSpawner;

struct CompletedHandle;

impl AsyncHandle for CompletedHandle {
    fn is_finished(&self) -> bool {
        true
    }

    fn cancel(&self) {}
}

impl AsyncSpawner for InlineSpawner {
    fn spawn_boxed(
        &self,
        future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
    ) -> Box<dyn AsyncHandle> {
        futures::executor::block_on(future);
        Box::new(CompletedHandle)
    }
}

#[cfg(feature = "tokio-runtime")]
pub mod tokio_impl {
    use super::*;
    use ::tokio::{runtime::Handle, task::JoinHandle};

    /// Tokio-based async spawner bound to one runtime handle
    pub struct TokioSpawner {
        handle: Handle,
    }

    impl TokioSpawner {
        pub fn new(handle: Handle) -> Self {
            Self { handle }
        }

        /// Spawner for the runtime the caller is running in, if any
        pub fn current() -> Option<Self> {
            Handle::try_current().ok().map(Self::new)
        }
    }

    impl AsyncSpawner for TokioSpawner {
        fn spawn_boxed(
            &self,
            future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
        ) -> Box<dyn AsyncHandle> {
            Box::new(TokioHandle(self.handle.spawn(future)))
        }
    }

    struct TokioHandle(JoinHandle<()>);

    impl AsyncHandle for TokioHandle {
        fn is_finished(&self) -> bool {
            self.0.is_finished()
        }

        fn cancel(&self) {
            self.0.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    #[test]
    fn test_inline_spawner_runs_immediately() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let handle = InlineSpawner.spawn_boxed(Box::pin(async move {
            flag.store(true, Ordering::SeqCst);
        }));

        assert!(handle.is_finished());
        assert!(ran.load(Ordering::SeqCst));
    }

    #[cfg(feature = "tokio-runtime")]
    #[::tokio::test]
    async fn test_tokio_spawner() {
        let spawner = tokio_impl::TokioSpawner::current().unwrap();
        let handle = spawner.spawn_boxed(Box::pin(async {
            ::tokio::time::sleep(::tokio::time::Duration::from_millis(10)).await;
        }));

        assert!(!handle.is_finished());

        ::tokio::time::sleep(::tokio::time::Duration::from_millis(50)).await;
        assert!(handle.is_finished());
    }
}
