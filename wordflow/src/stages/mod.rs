//! The generic stage engine.
//!
//! A [`Stage`] is a group of worker tasks pulling items from a bounded
//! inbound queue, applying a transformation and pushing the results into a
//! bounded outbound queue. Stages are created through [`StageBuilder`] in one
//! of four variants (buffer, transform, transform-many, sink) and joined with
//! [`Stage::link_to`], which forwards outputs and then propagates completion
//! or faults to the next stage.
//!
//! ```rust,ignore
//! let buffer = StageBuilder::new("buffer").buffer::<u32>()?;
//! let double = StageBuilder::new("double").transform(|x: u32| async move { Ok(x * 2) })?;
//! let print = StageBuilder::new("print").sink(|x: u32| async move {
//!     println!("{x}");
//!     Ok(())
//! })?;
//!
//! buffer.link_to(&double)?;
//! double.link_to(&print)?;
//!
//! buffer.accept(21).await?;
//! buffer.drain();
//! print.completion().await?;
//! ```

mod builder;
mod engine;
mod link;

pub use builder::StageBuilder;
pub use engine::{SinkStage, Stage, TryAcceptError};
