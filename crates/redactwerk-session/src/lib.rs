// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// redactwerk-session — Document session, save sinks, and the autosave timer.
//
// `DocumentSession` owns one document's compositor and history and is driven
// from a single thread. The autosave timer runs on Tokio and only signals that
// thread; it never touches document state.

pub mod autosave;
pub mod session;
pub mod sink;

pub use autosave::{AutosaveSignal, AutosaveTimer, SaveGuard, SaveToken};
pub use session::DocumentSession;
pub use sink::{FileSink, SaveSink};
