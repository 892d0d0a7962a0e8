use std::{collections::VecDeque, sync::Mutex};

/// A bounded cache of anti-replay nonces harvested from `Replay-Nonce` headers.
///
/// Every response from the ACME server carries a fresh nonce; keeping a small pool
/// avoids a round-trip to the newNonce endpoint before each signed request.
#[derive(Debug)]
pub(crate) struct Pool {
    pool: Mutex<VecDeque<String>>,
    max: usize,
}

impl Pool {
    pub fn new(max: usize) -> Self {
        Pool {
            pool: Mutex::default(),
            max,
        }
    }

    /// Take a cached nonce, if any remain
    pub fn take(&self) -> Option<String> {
        self.pool.lock().unwrap().pop_front()
    }

    /// Stash a nonce harvested from a response
    pub fn stash(&self, nonce: String) {
        let mut pool = self.pool.lock().unwrap();
        pool.push_back(nonce);

        // Prevent the pool from growing unnecessarily large
        if pool.len() > self.max {
            pool.pop_front();
        }
    }
}
