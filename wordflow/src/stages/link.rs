//! Linking stages and propagating completion.

use super::engine::{Inbound, Stage};
use crate::core::StageState;
use crate::errors::{Result, StageError};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

impl<I, O> Stage<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Links this stage's output to `target`'s input.
    ///
    /// Every output is offered to `target.accept`. Once this stage has
    /// stopped and its outputs are forwarded, `target` is drained if this
    /// stage completed, or faulted with the same fault if it faulted.
    ///
    /// # Errors
    ///
    /// Returns `StageError::Link` if this stage is a sink or already linked,
    /// if `target` already has an upstream, or if `target` is this stage.
    pub fn link_to<X>(&self, target: &Stage<O, X>) -> Result<()>
    where
        X: Send + 'static,
    {
        let same_stage = std::ptr::eq(
            Arc::as_ptr(&self.inbound).cast::<()>(),
            Arc::as_ptr(&target.inbound).cast::<()>(),
        );
        if same_stage {
            return Err(self.link_error("a stage cannot be linked to itself"));
        }

        let mut outbound = self.outbound.lock();
        if outbound.is_none() {
            return Err(self.link_error("stage has no unlinked output"));
        }
        if target.inbound.has_upstream.swap(true, Ordering::SeqCst) {
            return Err(self.link_error(&format!(
                "target '{}' already has an upstream stage",
                target.name()
            )));
        }
        let Some(receiver) = outbound.take() else {
            return Err(self.link_error("stage has no unlinked output"));
        };

        debug!(source = %self.name(), target = %target.name(), "Linking stages");
        tokio::spawn(forward(
            Arc::clone(&self.inbound),
            receiver,
            Arc::clone(&target.inbound),
        ));
        Ok(())
    }

    fn link_error(&self, reason: &str) -> StageError {
        StageError::Link {
            stage: self.name().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Moves outputs from `source` into `target`, then hands over the source's
/// terminal state.
async fn forward<I, O>(
    source: Arc<Inbound<I>>,
    mut outputs: mpsc::Receiver<O>,
    target: Arc<Inbound<O>>,
) where
    I: Send + 'static,
    O: Send + 'static,
{
    let mut rejected = false;
    while let Some(output) = outputs.recv().await {
        if rejected {
            source.metrics.record_dropped_output();
            continue;
        }
        if let Err(error) = target.accept(output).await {
            // Faults never travel upstream: keep draining so the source can finish.
            warn!(
                source = %source.name,
                target = %target.name,
                error = %error,
                "Downstream rejected output, discarding remaining outputs"
            );
            source.metrics.record_dropped_output();
            rejected = true;
        }
    }

    match source.state() {
        StageState::Faulted(fault) => {
            debug!(source = %source.name, target = %target.name, "Propagating fault");
            target.fault(fault);
        }
        StageState::Completed => {
            debug!(source = %source.name, target = %target.name, "Propagating completion");
            target.drain();
        }
        state => {
            // The outbound queue only closes after the last worker finished.
            warn!(source = %source.name, state = %state, "Outbound closed before terminal state");
            target.drain();
        }
    }
}
