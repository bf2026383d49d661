//! Failure injection for the in-memory stores.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

use chama_auth::{AuthError, AuthResult};

/// Per-operation failures to return instead of touching the store.
///
/// A fault stays armed until [`clear`](Self::clear)ed unless it was armed
/// with [`fail_once`](Self::fail_once).
#[derive(Debug)]
pub struct Faults<Op> {
    armed: Mutex<HashMap<Op, (AuthError, bool)>>,
}

impl<Op> Default for Faults<Op> {
    fn default() -> Self {
        Self {
            armed: Mutex::new(HashMap::new()),
        }
    }
}

impl<Op> Faults<Op>
where
    Op: Copy + Eq + Hash,
{
    pub fn fail(&self, op: Op, error: AuthError) {
        if let Ok(mut armed) = self.armed.lock() {
            armed.insert(op, (error, false));
        }
    }

    pub fn fail_once(&self, op: Op, error: AuthError) {
        if let Ok(mut armed) = self.armed.lock() {
            armed.insert(op, (error, true));
        }
    }

    pub fn clear(&self, op: Op) {
        if let Ok(mut armed) = self.armed.lock() {
            armed.remove(&op);
        }
    }

    pub fn clear_all(&self) {
        if let Ok(mut armed) = self.armed.lock() {
            armed.clear();
        }
    }

    /// `Err` with the armed failure for `op`, if any.
    pub fn check(&self, op: Op) -> AuthResult<()> {
        let mut armed = self
            .armed
            .lock()
            .map_err(|_| AuthError::remote("fault table lock poisoned"))?;

        match armed.get(&op).cloned() {
            None => Ok(()),
            Some((error, once)) => {
                if once {
                    armed.remove(&op);
                }
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Op {
        Read,
        Write,
    }

    #[test]
    fn armed_fault_persists_until_cleared() {
        let faults = Faults::default();
        faults.fail(Op::Read, AuthError::remote("down"));
        assert!(faults.check(Op::Read).is_err());
        assert!(faults.check(Op::Read).is_err());
        assert!(faults.check(Op::Write).is_ok());

        faults.clear(Op::Read);
        assert!(faults.check(Op::Read).is_ok());
    }

    #[test]
    fn one_shot_fault_fires_once() {
        let faults = Faults::default();
        faults.fail_once(Op::Write, AuthError::InvalidCredentials);
        assert_eq!(faults.check(Op::Write), Err(AuthError::InvalidCredentials));
        assert!(faults.check(Op::Write).is_ok());
    }
}
