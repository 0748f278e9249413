//! Peer approval.
//!
//! Peers introduce themselves with an identity string of their own
//! choosing. [`AuthRegistry`] remembers which strings were approved in
//! this process; [`Approver`] decides about strings seen for the first
//! time.
//!
//! The identity string is not bound to the connection in any way, so a
//! peer that knows an approved string skips approval.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use dashmap::DashSet;
use parking_lot::Mutex;
use tracing::warn;

use crate::config::ApprovalMode;

/// Set of approved peer identity strings.
///
/// Grows for the lifetime of the process and is never persisted.
#[derive(Debug, Clone, Default)]
pub struct AuthRegistry {
    approved: Arc<DashSet<String>>,
}

impl AuthRegistry {
    pub fn new() -> Self {
        AuthRegistry::default()
    }

    pub fn is_approved(&self, identity: &str) -> bool {
        self.approved.contains(identity)
    }

    pub fn approve(&self, identity: &str) {
        self.approved.insert(identity.to_string());
    }

    pub fn len(&self) -> usize {
        self.approved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.approved.is_empty()
    }
}

/// Decides whether a not-yet-approved peer may connect.
///
/// Called from a blocking thread; implementations may block for as
/// long as a human takes to answer.
pub trait Approver: Send + Sync + 'static {
    fn approve(&self, identity: &str) -> bool;
}

impl<F> Approver for F
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    fn approve(&self, identity: &str) -> bool {
        self(identity)
    }
}

/// Asks the operator on stdin. One question at a time.
#[derive(Debug, Default)]
pub struct ConsolePrompt {
    lock: Mutex<()>,
}

impl Approver for ConsolePrompt {
    fn approve(&self, identity: &str) -> bool {
        let _guard = self.lock.lock();

        let mut stderr = io::stderr();
        let _ = write!(stderr, "Allow remote connection for {}? [y/N] ", identity);
        let _ = stderr.flush();

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"),
            Err(e) => {
                warn!(error = %e, "could not read approval answer, denying");
                false
            }
        }
    }
}

/// Build the approver selected by configuration.
pub fn approver_for(mode: ApprovalMode) -> Arc<dyn Approver> {
    match mode {
        ApprovalMode::Prompt => Arc::new(ConsolePrompt::default()),
        ApprovalMode::Allow => Arc::new(|_: &str| true),
        ApprovalMode::Deny => Arc::new(|_: &str| false),
    }
}
