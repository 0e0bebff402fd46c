//! Observability subsystem.
//!
//! All settings events are emitted through `tracing`; `logging.rs` installs a
//! subscriber for hosts that do not configure one.

pub mod logging;
