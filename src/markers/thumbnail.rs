//! Lazy thumbnail loading
//!
//! The pool never fetches anything itself. It hands a [`ThumbnailRequest`]
//! to a [`ThumbnailLoader`] together with a sender, and the loader reports a
//! [`ThumbnailCompletion`] on that channel whenever it is done, from any
//! thread. The pool drains the channel on the event-loop thread and checks
//! each completion against the handle before applying it.

use crate::{
    data::store::{PointId, ThumbnailRef},
    markers::handle::LoadTicket,
    runtime::{AsyncHandle, AsyncSpawner},
    traits::ThumbnailSource,
    Result,
};
use crossbeam_channel::Sender;
use lru::LruCache;
use std::{cell::RefCell, collections::VecDeque, num::NonZeroUsize, rc::Rc, sync::Arc};

/// Decoded-or-not image bytes for one marker
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub reference: ThumbnailRef,
    pub bytes: Arc<Vec<u8>>,
}

impl Thumbnail {
    pub fn new(reference: ThumbnailRef, bytes: Vec<u8>) -> Self {
        Self {
            reference,
            bytes: Arc::new(bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailRequest {
    pub point_id: PointId,
    /// Point-set generation the request was issued for
    pub generation: u64,
    pub ticket: LoadTicket,
    pub thumbnail: ThumbnailRef,
}

#[derive(Debug)]
pub struct ThumbnailCompletion {
    pub point_id: PointId,
    pub generation: u64,
    pub ticket: LoadTicket,
    pub result: Result<Thumbnail>,
}

impl ThumbnailCompletion {
    pub fn new(request: &ThumbnailRequest, result: Result<Thumbnail>) -> Self {
        Self {
            point_id: request.point_id,
            generation: request.generation,
            ticket: request.ticket,
            result,
        }
    }
}

pub type CompletionSender = Sender<ThumbnailCompletion>;

/// Starts thumbnail loads. Fire-and-forget: the only way back is `done`.
pub trait ThumbnailLoader {
    fn schedule(&self, request: ThumbnailRequest, done: CompletionSender);

    /// Abandons in-flight work; completions that still arrive are discarded
    /// by the pool's liveness check anyway
    fn cancel_all(&self) {}
}

/// Spawns one async fetch per request through an [`AsyncSpawner`]
pub struct TaskThumbnailLoader<S: ThumbnailSource> {
    source: Arc<S>,
    spawner: Arc<dyn AsyncSpawner>,
    in_flight: RefCell<Vec<Box<dyn AsyncHandle>>>,
}

impl<S: ThumbnailSource> TaskThumbnailLoader<S> {
    pub fn new(source: S, spawner: Arc<dyn AsyncSpawner>) -> Self {
        Self {
            source: Arc::new(source),
            spawner,
            in_flight: RefCell::new(Vec::new()),
        }
    }

    pub fn in_flight(&self) -> usize {
        let mut handles = self.in_flight.borrow_mut();
        handles.retain(|h| !h.is_finished());
        handles.len()
    }
}

impl<S: ThumbnailSource> ThumbnailLoader for TaskThumbnailLoader<S> {
    fn schedule(&self, request: ThumbnailRequest, done: CompletionSender) {
        let source = Arc::clone(&self.source);
        let handle = self.spawner.spawn_boxed(Box::pin(async move {
            let result = source.fetch(&request.thumbnail).await;
            if done.send(ThumbnailCompletion::new(&request, result)).is_err() {
                log::trace!("thumbnail for point {} finished after pool shut down", request.point_id);
            }
        }));

        let mut handles = self.in_flight.borrow_mut();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    fn cancel_all(&self) {
        for handle in self.in_flight.borrow_mut().drain(..) {
            handle.cancel();
        }
    }
}

/// Loader that only queues requests; the host (or a test) completes them
/// explicitly. Clones share the queue.
#[derive(Clone, Default)]
pub struct QueuedThumbnailLoader {
    queue: Rc<RefCell<VecDeque<(ThumbnailRequest, CompletionSender)>>>,
    scheduled: Rc<RefCell<usize>>,
}

impl QueuedThumbnailLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests waiting for completion
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Total requests ever scheduled
    pub fn scheduled(&self) -> usize {
        *self.scheduled.borrow()
    }

    pub fn requests(&self) -> Vec<ThumbnailRequest> {
        self.queue.borrow().iter().map(|(r, _)| r.clone()).collect()
    }

    /// Completes the oldest request with `result`
    pub fn complete_next(&self, result: Result<Thumbnail>) -> Option<ThumbnailRequest> {
        let (request, done) = self.queue.borrow_mut().pop_front()?;
        let _ = done.send(ThumbnailCompletion::new(&request, result));
        Some(request)
    }

    /// Completes every queued request using `fetch`
    pub fn complete_all<F>(&self, mut fetch: F) -> usize
    where
        F: FnMut(&ThumbnailRequest) -> Result<Thumbnail>,
    {
        let drained: Vec<_> = self.queue.borrow_mut().drain(..).collect();
        for (request, done) in &drained {
            let _ = done.send(ThumbnailCompletion::new(request, fetch(request)));
        }
        drained.len()
    }

    /// Completes every queued request with a small synthetic image
    pub fn succeed_all(&self) -> usize {
        self.complete_all(|request| {
            Ok(Thumbnail::new(
                request.thumbnail.clone(),
                request.point_id.to_le_bytes().to_vec(),
            ))
        })
    }
}

impl ThumbnailLoader for QueuedThumbnailLoader {
    fn schedule(&self, request: ThumbnailRequest, done: CompletionSender) {
        *self.scheduled.borrow_mut() += 1;
        self.queue.borrow_mut().push_back((request, done));
    }

    fn cancel_all(&self) {
        self.queue.borrow_mut().clear();
    }
}

/// Recently released thumbnails, keyed by reference, with LRU eviction
#[derive(Debug)]
pub struct ThumbnailCache {
    cache: Option<LruCache<ThumbnailRef, Thumbnail>>,
}

impl ThumbnailCache {
    /// A capacity of 0 disables caching
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    pub fn get(&mut self, reference: &ThumbnailRef) -> Option<Thumbnail> {
        self.cache.as_mut()?.get(reference).cloned()
    }

    pub fn put(&mut self, thumbnail: Thumbnail) {
        if let Some(cache) = self.cache.as_mut() {
            cache.put(thumbnail.reference.clone(), thumbnail);
        }
    }

    pub fn clear(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.cache.as_ref().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
