//! devloop - human-gated orchestration of a markdown issue backlog.
//!
//! An issues document (see [`devloop_issues`]) is the single source of truth.
//! devloop picks the next eligible issue, moves it through
//! `Backlog -> Ready -> In Progress -> In Review -> Done`, runs an
//! implementation agent, and waits at the Review Gate for a human to approve,
//! reject with feedback, or skip. Status changes can be mirrored to an
//! external tracker.
//!
//! This crate provides both the `devloop` CLI and a library:
//!
//! - [`storage`]: Backlog Store over a [`storage::DocumentBackend`]
//! - [`resolver`]: Eligibility Resolver and blocked diagnostics
//! - [`transition`]: Status Transition Engine
//! - [`review`]: Review Gate
//! - [`sync`]: Sync Bridge to external trackers
//! - [`dev_loop`]: the loop tying them together

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod agent;
pub mod dev_loop;
pub mod domain;
pub mod error;
pub mod resolver;
pub mod review;
pub mod storage;
pub mod sync;
pub mod transition;
pub mod vcs;

// Application context and CLI (needed by binary)
pub mod app;
pub mod cli;
pub mod commands;
pub mod output;
