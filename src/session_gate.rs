//! Admin flag for the current browsing session.
//!
//! This is a convenience gate for the moderation view, not an access-control
//! boundary. The flag is either present (true) or absent.

use actix_session::Session;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

pub const ADMIN_FLAG_KEY: &str = "is_admin";

#[derive(Error, Debug)]
pub enum SessionGateError {
    #[error("Failed to write the session flag: {0}")]
    Insert(#[from] actix_session::SessionInsertError),
}

pub trait SessionGate {
    fn mark_authenticated(&self) -> Result<(), SessionGateError>;
    fn is_authenticated(&self) -> bool;
    fn clear(&self);
}

impl SessionGate for Session {
    fn mark_authenticated(&self) -> Result<(), SessionGateError> {
        self.insert(ADMIN_FLAG_KEY, true)?;
        Ok(())
    }

    fn is_authenticated(&self) -> bool {
        match self.get::<bool>(ADMIN_FLAG_KEY) {
            Ok(flag) => flag.unwrap_or(false),
            Err(e) => {
                log::warn!("Unreadable admin flag in session, treating as absent: {}", e);
                false
            }
        }
    }

    fn clear(&self) {
        self.remove(ADMIN_FLAG_KEY);
    }
}

/// Process-local gate for callers without a cookie session.
#[derive(Debug, Default)]
pub struct MemorySessionGate {
    flag: AtomicBool,
}

impl MemorySessionGate {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionGate for MemorySessionGate {
    fn mark_authenticated(&self) -> Result<(), SessionGateError> {
        self.flag.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_authenticated(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_session::SessionExt;
    use actix_web::test::TestRequest;

    fn exercise(gate: &dyn SessionGate) {
        assert!(!gate.is_authenticated());
        gate.mark_authenticated().unwrap();
        assert!(gate.is_authenticated());
        gate.clear();
        assert!(!gate.is_authenticated());
        gate.clear();
        assert!(!gate.is_authenticated());
    }

    #[test]
    fn memory_gate_set_check_clear() {
        exercise(&MemorySessionGate::new());
    }

    #[test]
    fn cookie_session_gate_set_check_clear() {
        let request = TestRequest::default().to_http_request();
        exercise(&request.get_session());
    }

    #[test]
    fn malformed_flag_reads_as_absent() {
        let request = TestRequest::default().to_http_request();
        let session = request.get_session();
        session.insert(ADMIN_FLAG_KEY, "yes").unwrap();

        assert!(!session.is_authenticated());
    }
}
