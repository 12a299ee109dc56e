// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running commands, using
//! `tokio::process::Command`, and capturing what they print.
//!
//! - [`launcher`] owns [`LaunchSpec`], the [`Launcher`] trait and the
//!   production [`ShellLauncher`].
//! - [`observer`] defines per-line callbacks ([`LineObserver`]).
//! - [`record`] holds the captured data types.
//! - [`terminate`] implements terminate-then-kill cleanup for timed out or
//!   stopped processes.

pub mod launcher;
pub mod observer;
pub mod record;
pub mod terminate;

pub use launcher::{LaunchSpec, Launcher, ShellLauncher};
pub use observer::{BoxedObserver, JobLineLogger, LineObserver};
pub use record::{LaunchOutput, LineRecord, Stream, Termination, digit_ratio};
pub use terminate::DEFAULT_TERMINATE_GRACE;
