// src/exec/mod.rs

//! Process supervision layer.
//!
//! This module is responsible for actually running external tools, using
//! `tokio::process::Command`, and turning each run into exactly one
//! [`ProcessResult`].
//!
//! - [`launch`] defines the [`LaunchSpec`] and the [`Output`] lines a process
//!   produces.
//! - [`backend`] provides the `ProcessManager` trait and the concrete
//!   `TokioProcessManager`, which tests can replace with a scripted fake.
//! - [`runner`] drives one manager through start, output streaming, waiting
//!   with timeout/cancellation, and termination.

pub mod backend;
pub mod launch;
pub mod runner;

pub use backend::{
    wait_for_exit, wait_for_exit_async, BoxFuture, ProcessManager, TokioProcessManager, WaitError,
    OUTPUT_BUFFER,
};
pub use launch::{LaunchSpec, Output};
pub use runner::{
    ConsoleOutputWriter, OutputHandler, OutputWriter, ProcessResult, ProcessRunner, ProcessState,
    RunOptions,
};
