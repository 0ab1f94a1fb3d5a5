//! Builder for the four stage variants.

use super::engine::{SinkStage, Stage, StageFn};
use crate::config::StageOptions;
use crate::core::StageKind;
use crate::errors::{Result, StageError};
use crate::events::{EventSink, NoOpEventSink};
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;

/// Builder for creating stages.
#[derive(Clone)]
pub struct StageBuilder {
    /// The stage name.
    name: String,
    /// Queue and worker settings.
    options: StageOptions,
    /// Where lifecycle events go.
    events: Arc<dyn EventSink>,
}

impl StageBuilder {
    /// Creates a new stage builder with default options.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: StageOptions::default(),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the queue and worker settings.
    #[must_use]
    pub fn with_options(mut self, options: StageOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the event sink for lifecycle events.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Builds a passthrough buffer. Concurrency is always 1.
    ///
    /// # Errors
    ///
    /// Returns `StageError::Config` for zero capacities.
    pub fn buffer<T>(self) -> Result<Stage<T, T>>
    where
        T: Send + 'static,
    {
        let options = self.options.with_concurrency(1);
        let func: StageFn<T, T> =
            Arc::new(|item| async move { Ok::<_, StageError>(vec![item]) }.boxed());
        Stage::spawn(self.name, StageKind::Buffer, options, self.events, func, true)
    }

    /// Builds a one-to-one transform.
    ///
    /// # Errors
    ///
    /// Returns `StageError::Config` for zero capacities or concurrency.
    pub fn transform<I, O, F, Fut>(self, f: F) -> Result<Stage<I, O>>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        let func: StageFn<I, O> = Arc::new(move |item| {
            let fut = f(item);
            async move { fut.await.map(|output| vec![output]) }.boxed()
        });
        Stage::spawn(self.name, StageKind::Transform, self.options, self.events, func, true)
    }

    /// Builds a one-to-many transform; each output is forwarded on its own.
    ///
    /// # Errors
    ///
    /// Returns `StageError::Config` for zero capacities or concurrency.
    pub fn transform_many<I, O, F, Fut>(self, f: F) -> Result<Stage<I, O>>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<O>>> + Send + 'static,
    {
        let func: StageFn<I, O> = Arc::new(move |item| f(item).boxed());
        Stage::spawn(self.name, StageKind::TransformMany, self.options, self.events, func, true)
    }

    /// Builds a terminal stage. Its completion is the pipeline's completion.
    ///
    /// # Errors
    ///
    /// Returns `StageError::Config` for zero capacities or concurrency.
    pub fn sink<I, F, Fut>(self, f: F) -> Result<SinkStage<I>>
    where
        I: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let func: StageFn<I, std::convert::Infallible> = Arc::new(move |item| {
            let fut = f(item);
            async move { fut.await.map(|()| Vec::new()) }.boxed()
        });
        Stage::spawn(self.name, StageKind::Sink, self.options, self.events, func, false)
    }
}

impl std::fmt::Debug for StageBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageBuilder")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageState;
    use crate::events::{event_types, CollectingEventSink};
    use parking_lot::Mutex;

    #[tokio::test]
    async fn test_buffer_forces_single_worker() {
        let buffer = StageBuilder::new("buffer")
            .with_options(StageOptions::new().with_capacity(3).with_concurrency(8))
            .buffer::<u32>()
            .unwrap();
        assert_eq!(buffer.kind(), StageKind::Buffer);
        assert_eq!(buffer.name(), "buffer");
    }

    #[tokio::test]
    async fn test_zero_capacity_rejected() {
        let result = StageBuilder::new("bad")
            .with_options(StageOptions::new().with_capacity(0))
            .transform(|x: u32| async move { Ok(x) });
        assert!(matches!(result, Err(StageError::Config(_))));
    }

    #[tokio::test]
    async fn test_transform_many_emits_each_output() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let split = StageBuilder::new("split")
            .transform_many(|n: u32| async move { Ok((0..n).collect::<Vec<_>>()) })
            .unwrap();
        let sink = {
            let seen = Arc::clone(&seen);
            StageBuilder::new("collect")
                .sink(move |x: u32| {
                    let seen = Arc::clone(&seen);
                    async move {
                        seen.lock().push(x);
                        Ok(())
                    }
                })
                .unwrap()
        };
        split.link_to(&sink).unwrap();

        split.accept(3).await.unwrap();
        split.accept(0).await.unwrap();
        split.accept(2).await.unwrap();
        split.drain();
        sink.completion().await.unwrap();

        assert_eq!(*seen.lock(), vec![0, 1, 2, 0, 1]);
        assert_eq!(split.metrics().emitted(), 5);
        assert_eq!(split.metrics().processed(), 3);
    }

    #[tokio::test]
    async fn test_lifecycle_events_emitted() {
        let events = Arc::new(CollectingEventSink::new());
        let sink = StageBuilder::new("quiet")
            .with_events(events.clone())
            .sink(|_: u32| async move { Ok(()) })
            .unwrap();

        sink.accept(1).await.unwrap();
        sink.drain();
        sink.completion().await.unwrap();

        assert_eq!(sink.state(), StageState::Completed);
        assert_eq!(events.events_of_type(event_types::STAGE_DRAINED).len(), 1);
        let completed = events.events_of_type(event_types::STAGE_COMPLETED);
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].1.as_ref().unwrap()["metrics"]["processed"], 1);
    }
}
