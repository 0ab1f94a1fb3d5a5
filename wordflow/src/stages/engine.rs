//! Stage state machine, inbound queue and worker loop.

use crate::config::StageOptions;
use crate::core::{StageKind, StageMetrics, StageState};
use crate::errors::{Fault, Result, StageError};
use crate::events::{event_types, EventSink};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::{debug, warn};

/// The transformation applied by a stage's workers.
pub(crate) type StageFn<I, O> =
    Arc<dyn Fn(I) -> BoxFuture<'static, Result<Vec<O>>> + Send + Sync>;

/// A stage that consumes items and produces nothing.
pub type SinkStage<I> = Stage<I, Infallible>;

/// An accepted item together with the capacity slot it occupies.
///
/// The slot is released once the item has been processed and its outputs
/// pushed, so capacity counts in-flight work as well as queued items.
struct Envelope<I> {
    item: I,
    slot: OwnedSemaphorePermit,
}

/// Error returned by [`Stage::try_accept`].
#[derive(Debug)]
pub enum TryAcceptError<I> {
    /// The stage is at capacity; the item is handed back.
    Full(I),
    /// The stage no longer accepts input.
    Rejected(StageError),
}

/// The input side of a stage, shared by its handle, workers and upstream link.
pub(crate) struct Inbound<I> {
    pub(crate) name: String,
    pub(crate) kind: StageKind,
    state: watch::Sender<StageState>,
    /// First fault wins; the state turns `Faulted` once workers have stopped.
    fault: Mutex<Option<Fault>>,
    slots: Arc<Semaphore>,
    sender: Mutex<Option<mpsc::UnboundedSender<Envelope<I>>>>,
    pub(crate) has_upstream: AtomicBool,
    pub(crate) metrics: StageMetrics,
    events: Arc<dyn EventSink>,
}

impl<I: Send + 'static> Inbound<I> {
    pub(crate) async fn accept(&self, item: I) -> Result<()> {
        self.check_open()?;

        let slot = match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(slot) => slot,
            Err(TryAcquireError::NoPermits) => {
                self.metrics.record_blocked();
                Arc::clone(&self.slots)
                    .acquire_owned()
                    .await
                    .map_err(|_| self.rejection())?
            }
            Err(TryAcquireError::Closed) => return Err(self.rejection()),
        };

        self.enqueue(item, slot)
    }

    fn try_accept(&self, item: I) -> std::result::Result<(), TryAcceptError<I>> {
        if let Err(error) = self.check_open() {
            return Err(TryAcceptError::Rejected(error));
        }

        match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(slot) => self.enqueue(item, slot).map_err(TryAcceptError::Rejected),
            Err(TryAcquireError::NoPermits) => Err(TryAcceptError::Full(item)),
            Err(TryAcquireError::Closed) => Err(TryAcceptError::Rejected(self.rejection())),
        }
    }

    fn enqueue(&self, item: I, slot: OwnedSemaphorePermit) -> Result<()> {
        let sender = self.sender.lock();
        let Some(tx) = sender.as_ref() else {
            return Err(self.rejection());
        };
        tx.send(Envelope { item, slot })
            .map_err(|_| self.rejection())?;
        self.metrics.record_accept();
        Ok(())
    }

    /// Stops taking input; queued items are still processed.
    pub(crate) fn drain(&self) {
        if self.fault.lock().is_some() {
            return;
        }

        let changed = self.state.send_if_modified(|state| {
            if state.is_open() {
                *state = StageState::Draining;
                true
            } else {
                false
            }
        });

        if changed {
            self.close_input();
            debug!(stage = %self.name, "Stage draining");
            self.events.try_emit(
                event_types::STAGE_DRAINED,
                Some(serde_json::json!({ "stage": self.name, "kind": self.kind })),
            );
        }
    }

    /// Faults the stage: input is closed, queued items are abandoned and
    /// running workers stop after their current item.
    pub(crate) fn fault(&self, fault: Fault) {
        {
            let mut pending = self.fault.lock();
            if pending.is_some() || self.state.borrow().is_terminal() {
                return;
            }
            warn!(stage = %self.name, fault = %fault, "Stage faulted");
            *pending = Some(fault);
        }
        self.close_input();
    }

    pub(crate) fn state(&self) -> StageState {
        self.state.borrow().clone()
    }

    pub(crate) fn fault_reason(&self) -> Option<Fault> {
        self.fault.lock().clone()
    }

    pub(crate) async fn completion(&self) -> Result<()> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(StageState::is_terminal)
            .await
            .map_err(|_| StageError::Internal(format!("stage '{}' state lost", self.name)))?
            .clone();

        match state {
            StageState::Faulted(fault) => Err(StageError::faulted(&self.name, fault)),
            _ => Ok(()),
        }
    }

    fn is_faulting(&self) -> bool {
        self.fault.lock().is_some()
    }

    fn check_open(&self) -> Result<()> {
        let open = self.state.borrow().is_open();
        if open && !self.is_faulting() {
            Ok(())
        } else {
            Err(self.rejection())
        }
    }

    fn rejection(&self) -> StageError {
        if let Some(fault) = self.fault_reason() {
            return StageError::faulted(&self.name, fault);
        }
        let state = self.state();
        match state {
            StageState::Faulted(fault) => StageError::faulted(&self.name, fault),
            _ => StageError::closed(&self.name),
        }
    }

    fn close_input(&self) {
        self.sender.lock().take();
        self.slots.close();
    }

    /// Called by the last worker to exit.
    fn finish(&self) {
        // Held until the state is published so a late fault cannot slip in.
        let pending = self.fault.lock();
        let final_state = pending
            .clone()
            .map_or(StageState::Completed, StageState::Faulted);
        self.close_input();

        let metrics = self.metrics.snapshot();
        match &final_state {
            StageState::Faulted(fault) => {
                debug!(stage = %self.name, fault = %fault, "Stage stopped after fault");
                self.events.try_emit(
                    event_types::STAGE_FAULTED,
                    Some(serde_json::json!({
                        "stage": self.name,
                        "kind": self.kind,
                        "origin": fault.origin,
                        "message": fault.message,
                        "metrics": metrics.to_dict(),
                    })),
                );
            }
            _ => {
                debug!(
                    stage = %self.name,
                    processed = metrics.processed,
                    emitted = metrics.emitted,
                    "Stage completed"
                );
                self.events.try_emit(
                    event_types::STAGE_COMPLETED,
                    Some(serde_json::json!({
                        "stage": self.name,
                        "kind": self.kind,
                        "metrics": metrics.to_dict(),
                    })),
                );
            }
        }

        // Published after the event: whoever wakes in `completion` sees it.
        self.state.send_replace(final_state);
        drop(pending);
    }
}

/// A bounded, concurrent processing stage from `I` to `O`.
///
/// The handle exposes the inbound side (`accept`, `drain`, `completion`);
/// outputs leave through a single link created with [`Stage::link_to`].
/// Stages must be created inside a Tokio runtime.
pub struct Stage<I, O> {
    pub(crate) inbound: Arc<Inbound<I>>,
    pub(crate) outbound: Mutex<Option<mpsc::Receiver<O>>>,
}

impl<I, O> Stage<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Starts the workers of a new stage.
    pub(crate) fn spawn(
        name: String,
        kind: StageKind,
        options: StageOptions,
        events: Arc<dyn EventSink>,
        func: StageFn<I, O>,
        has_output: bool,
    ) -> Result<Self> {
        options.validate(&name)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(StageState::Open);
        let inbound = Arc::new(Inbound {
            name,
            kind,
            state,
            fault: Mutex::new(None),
            slots: Arc::new(Semaphore::new(options.capacity)),
            sender: Mutex::new(Some(tx)),
            has_upstream: AtomicBool::new(false),
            metrics: StageMetrics::default(),
            events,
        });

        let (out_tx, out_rx) = if has_output {
            let (tx, rx) = mpsc::channel(options.output_capacity);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let receiver = Arc::new(tokio::sync::Mutex::new(rx));
        let active = Arc::new(AtomicUsize::new(options.concurrency));
        for _ in 0..options.concurrency {
            tokio::spawn(run_worker(
                Arc::clone(&inbound),
                Arc::clone(&receiver),
                Arc::clone(&func),
                out_tx.clone(),
                Arc::clone(&active),
            ));
        }

        debug!(
            stage = %inbound.name,
            kind = %kind,
            capacity = options.capacity,
            concurrency = options.concurrency,
            "Stage started"
        );

        Ok(Self {
            inbound,
            outbound: Mutex::new(out_rx),
        })
    }

    /// Offers an item, waiting while the stage is at capacity.
    ///
    /// # Errors
    ///
    /// `StageError::Closed` once the stage is draining, `StageError::Faulted`
    /// once it has faulted (also while waiting for capacity).
    pub async fn accept(&self, item: I) -> Result<()> {
        self.inbound.accept(item).await
    }

    /// Offers an item without waiting; a full stage hands the item back.
    pub fn try_accept(&self, item: I) -> std::result::Result<(), TryAcceptError<I>> {
        self.inbound.try_accept(item)
    }

    /// Signals that no more input will arrive. Idempotent.
    pub fn drain(&self) {
        self.inbound.drain();
    }

    /// Faults the stage with `fault`. The first fault wins.
    pub fn fault(&self, fault: Fault) {
        self.inbound.fault(fault);
    }

    /// Waits until the stage has completed or faulted.
    ///
    /// # Errors
    ///
    /// `StageError::Faulted` carrying the fault that stopped the stage.
    pub async fn completion(&self) -> Result<()> {
        self.inbound.completion().await
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> StageState {
        self.inbound.state()
    }

    /// Returns the fault recorded for this stage, even if workers are
    /// still winding down.
    pub fn fault_reason(&self) -> Option<Fault> {
        self.inbound.fault_reason()
    }

    /// Returns the stage name.
    pub fn name(&self) -> &str {
        &self.inbound.name
    }

    /// Returns the stage variant.
    pub fn kind(&self) -> StageKind {
        self.inbound.kind
    }

    /// Returns the stage counters.
    pub fn metrics(&self) -> &StageMetrics {
        &self.inbound.metrics
    }
}

impl<I, O> fmt::Debug for Stage<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.inbound.name)
            .field("kind", &self.inbound.kind)
            .field("state", &*self.inbound.state.borrow())
            .field("linked", &self.outbound.lock().is_none())
            .finish()
    }
}

async fn run_worker<I, O>(
    inbound: Arc<Inbound<I>>,
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Envelope<I>>>>,
    func: StageFn<I, O>,
    outbound: Option<mpsc::Sender<O>>,
    active: Arc<AtomicUsize>,
) where
    I: Send + 'static,
    O: Send + 'static,
{
    loop {
        if inbound.is_faulting() {
            break;
        }

        let next = receiver.lock().await.recv().await;
        let Some(Envelope { item, slot }) = next else {
            break;
        };

        // No new dequeues after a fault.
        if inbound.is_faulting() {
            inbound.metrics.record_discard();
            break;
        }

        match func(item).await {
            Ok(outputs) => {
                inbound.metrics.record_processed();
                if let Some(tx) = &outbound {
                    for output in outputs {
                        if tx.send(output).await.is_ok() {
                            inbound.metrics.record_emitted(1);
                        } else {
                            inbound.metrics.record_dropped_output();
                        }
                    }
                }
            }
            Err(error) => {
                warn!(stage = %inbound.name, error = %error, "Stage transformation failed");
                inbound.metrics.record_discard();
                inbound.fault(Fault::from_error(&inbound.name, &error));
            }
        }

        drop(slot);
    }

    if active.fetch_sub(1, Ordering::SeqCst) == 1 {
        if inbound.is_faulting() {
            let mut queue = receiver.lock().await;
            queue.close();
            while let Ok(abandoned) = queue.try_recv() {
                drop(abandoned);
                inbound.metrics.record_discard();
            }
        }
        inbound.finish();
    }
    // `outbound` drops here, after `finish`, so the link observes a terminal
    // state once the outbound queue closes.
    drop(outbound);
}

#[cfg(test)]
mod tests {
    use crate::config::StageOptions;
    use crate::core::StageState;
    use crate::errors::{Fault, StageError};
    use crate::stages::{StageBuilder, TryAcceptError};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    fn gated_sink(
        name: &str,
        capacity: usize,
        gate: Arc<Semaphore>,
        seen: Arc<Mutex<Vec<u32>>>,
    ) -> crate::stages::SinkStage<u32> {
        StageBuilder::new(name)
            .with_options(StageOptions::new().with_capacity(capacity))
            .sink(move |x: u32| {
                let gate = Arc::clone(&gate);
                let seen = Arc::clone(&seen);
                async move {
                    gate.acquire()
                        .await
                        .map_err(|e| StageError::Internal(e.to_string()))?
                        .forget();
                    seen.lock().push(x);
                    Ok::<(), StageError>(())
                }
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_sink_processes_all_items_then_completes() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = gated_sink("sink", 4, Arc::new(Semaphore::new(100)), Arc::clone(&seen));

        for i in 0..10 {
            sink.accept(i).await.unwrap();
        }
        sink.drain();
        sink.completion().await.unwrap();

        assert_eq!(*seen.lock(), (0..10).collect::<Vec<_>>());
        assert_eq!(sink.state(), StageState::Completed);
        assert_eq!(sink.metrics().processed(), 10);
        assert_eq!(sink.metrics().accepted(), 10);
    }

    #[tokio::test]
    async fn test_accept_blocks_when_capacity_reached() {
        let gate = Arc::new(Semaphore::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = gated_sink("sink", 2, Arc::clone(&gate), Arc::clone(&seen));

        sink.accept(1).await.unwrap();
        sink.accept(2).await.unwrap();

        // Both slots are taken: one item in process, one queued.
        let blocked = tokio::time::timeout(Duration::from_millis(50), sink.accept(3)).await;
        assert!(blocked.is_err());
        assert!(matches!(sink.try_accept(3), Err(TryAcceptError::Full(3))));

        gate.add_permits(1);
        tokio::time::timeout(Duration::from_secs(5), sink.accept(3))
            .await
            .unwrap()
            .unwrap();
        assert!(sink.metrics().blocked_accepts() >= 1);

        gate.add_permits(10);
        sink.drain();
        sink.completion().await.unwrap();
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_accept_after_drain_is_closed() {
        let sink = gated_sink("sink", 2, Arc::new(Semaphore::new(10)), Arc::default());
        sink.drain();
        sink.drain();

        let err = sink.accept(1).await.unwrap_err();
        assert!(matches!(err, StageError::Closed { ref stage } if stage == "sink"));
        assert!(matches!(sink.try_accept(1), Err(TryAcceptError::Rejected(StageError::Closed { .. }))));

        sink.completion().await.unwrap();
        assert_eq!(sink.state(), StageState::Completed);
    }

    #[tokio::test]
    async fn test_drain_keeps_queued_items() {
        let gate = Arc::new(Semaphore::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = gated_sink("sink", 8, Arc::clone(&gate), Arc::clone(&seen));

        for i in 0..5 {
            sink.accept(i).await.unwrap();
        }
        sink.drain();
        assert_eq!(sink.state(), StageState::Draining);

        gate.add_permits(5);
        sink.completion().await.unwrap();
        assert_eq!(seen.lock().len(), 5);
    }

    #[tokio::test]
    async fn test_transformation_error_faults_stage() {
        let sink = StageBuilder::new("checker")
            .sink(|x: u32| async move {
                if x == 3 {
                    Err(StageError::Internal("three is not allowed".to_string()))
                } else {
                    Ok(())
                }
            })
            .unwrap();

        for i in 0..3 {
            sink.accept(i + 1).await.unwrap();
        }

        let err = sink.completion().await.unwrap_err();
        let fault = err.fault().cloned().unwrap();
        assert_eq!(fault.origin, "checker");
        assert!(fault.message.contains("three is not allowed"));
        assert!(matches!(sink.state(), StageState::Faulted(_)));

        let err = sink.accept(4).await.unwrap_err();
        assert!(matches!(err, StageError::Faulted { .. }));
    }

    #[tokio::test]
    async fn test_blocked_accept_fails_when_stage_faults() {
        let gate = Arc::new(Semaphore::new(0));
        let sink = {
            let gate = Arc::clone(&gate);
            StageBuilder::new("sink")
                .with_options(StageOptions::new().with_capacity(1))
                .sink(move |_: u32| {
                    let gate = Arc::clone(&gate);
                    async move {
                        let _permit = gate.acquire().await;
                        Err(StageError::Internal("boom".to_string()))
                    }
                })
                .unwrap()
        };
        let sink = Arc::new(sink);

        sink.accept(1).await.unwrap();
        let waiter = {
            let sink = Arc::clone(&sink);
            tokio::spawn(async move { sink.accept(2).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        gate.add_permits(1);
        let result = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(StageError::Faulted { .. })));
        assert!(sink.completion().await.is_err());
    }

    #[tokio::test]
    async fn test_external_fault_first_reason_wins() {
        let gate = Arc::new(Semaphore::new(0));
        let sink = gated_sink("sink", 4, Arc::clone(&gate), Arc::default());

        sink.fault(Fault::new("upstream", "first"));
        sink.fault(Fault::new("upstream", "second"));
        sink.drain();

        assert_eq!(sink.fault_reason().map(|f| f.message), Some("first".to_string()));
        let err = sink.completion().await.unwrap_err();
        assert_eq!(err.fault().map(|f| f.message.as_str()), Some("first"));
    }

    #[tokio::test]
    async fn test_concurrent_workers_process_everything() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            StageBuilder::new("parallel")
                .with_options(StageOptions::new().with_capacity(8).with_concurrency(4))
                .sink(move |x: u32| {
                    let seen = Arc::clone(&seen);
                    async move {
                        tokio::time::sleep(Duration::from_millis(u64::from(x % 3))).await;
                        seen.lock().push(x);
                        Ok(())
                    }
                })
                .unwrap()
        };

        for i in 0..50 {
            sink.accept(i).await.unwrap();
        }
        sink.drain();
        sink.completion().await.unwrap();

        let mut seen = seen.lock().clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_fault_accounts_for_every_accepted_item() {
        let gate = Arc::new(Semaphore::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = gated_sink("sink", 8, Arc::clone(&gate), Arc::clone(&seen));

        for i in 0..5 {
            sink.accept(i).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        sink.fault(Fault::new("driver", "stop"));
        gate.add_permits(10);
        assert!(sink.completion().await.is_err());

        let metrics = sink.metrics().snapshot();
        assert_eq!(metrics.accepted, 5);
        assert!(metrics.processed <= 1);
        assert_eq!(metrics.processed + metrics.discarded, metrics.accepted);
        assert_eq!(sink.metrics().in_flight(), 0);
        assert_eq!(seen.lock().len() as u64, metrics.processed);
    }

    #[tokio::test]
    async fn test_failed_item_counted_as_discarded() {
        let sink = StageBuilder::new("checker")
            .sink(|x: u32| async move {
                if x == 3 {
                    Err(StageError::Internal("three is not allowed".to_string()))
                } else {
                    Ok(())
                }
            })
            .unwrap();

        for i in 0..8 {
            if sink.accept(i).await.is_err() {
                break;
            }
        }
        assert!(sink.completion().await.is_err());

        let metrics = sink.metrics().snapshot();
        assert_eq!(metrics.processed, 3);
        assert!(metrics.discarded >= 1);
        assert_eq!(metrics.processed + metrics.discarded, metrics.accepted);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_terminal_event_visible_once_completion_returns() {
        use crate::events::{event_types, CollectingEventSink};

        for round in 0..20_u32 {
            let events = Arc::new(CollectingEventSink::new());
            let sink = StageBuilder::new("sink")
                .with_events(events.clone())
                .sink(|_: u32| async move { Ok(()) })
                .unwrap();
            let failing = StageBuilder::new("failing")
                .with_events(events.clone())
                .sink(|_: u32| async move { Err(StageError::Internal("no".to_string())) })
                .unwrap();

            sink.accept(round).await.unwrap();
            sink.drain();
            sink.completion().await.unwrap();
            assert_eq!(events.events_of_type(event_types::STAGE_COMPLETED).len(), 1);

            failing.accept(round).await.unwrap();
            assert!(failing.completion().await.is_err());
            assert_eq!(events.events_of_type(event_types::STAGE_FAULTED).len(), 1);
        }
    }
}
