//! `linkwheel-scheduler` — trigger loop and per-tick dispatch pipeline.
//!
//! # Overview
//!
//! The [`engine::DispatchEngine`] owns the trigger: it computes the next
//! fire instant from its [`Schedule`], sleeps until then, and runs one
//! dispatch cycle. A cycle checks the transport session, resolves the
//! [`DispatchTarget`] to a concrete chat, advances the rotation store, and
//! sends with a hard deadline. Every failure is terminal for its tick and
//! absorbed by the loop; only shutdown stops the engine.
//!
//! # Tick pipeline
//!
//! | Step             | Early exit                         |
//! |------------------|------------------------------------|
//! | check connection | `SkippedDisconnected`              |
//! | resolve target   | `TargetNotFound` / `ResolveFailed` |
//! | fetch link       | `NoLinks` / `RotationFailed`       |
//! | bounded send     | `SendFailed` / `SendTimeout`       |

pub mod engine;
pub mod error;
pub mod schedule;
pub mod target;
pub mod types;

pub use engine::{DispatchEngine, EngineConfig};
pub use error::{DispatchError, Result};
pub use schedule::Schedule;
pub use target::DispatchTarget;
pub use types::TickOutcome;
