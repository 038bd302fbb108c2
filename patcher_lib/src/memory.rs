//! The two token-indexed maps threaded through every patch in a run.
//!
//! Grounded on SPEC_FULL.md §3/§4.3: `mem2da: token → string` and `memStr: token → int`,
//! write-once-per-token-per-run (later writes overwrite silently), lookups against a missing
//! token are fatal. No teacher analog — this is the spec's own flat side-table, built in the
//! teacher's plain-struct-plus-`getset` convention.

use std::collections::HashMap;

use getset::{Getters, MutGetters};

use crate::error::{PatcherError, Result};

#[derive(Debug, Default, Getters, MutGetters)]
pub struct PatcherMemory {
    #[getset(get = "pub", get_mut = "pub")]
    mem_2da: HashMap<i32, String>,

    #[getset(get = "pub", get_mut = "pub")]
    mem_str: HashMap<i32, i32>,
}

impl PatcherMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store_2da(&mut self, token: i32, value: impl Into<String>) {
        self.mem_2da.insert(token, value.into());
    }

    pub fn store_str(&mut self, token: i32, value: i32) {
        self.mem_str.insert(token, value);
    }

    pub fn lookup_2da(&self, token: i32) -> Result<&str> {
        self.mem_2da
            .get(&token)
            .map(|s| s.as_str())
            .ok_or(PatcherError::TokenUndefined(token))
    }

    pub fn lookup_str(&self, token: i32) -> Result<i32> {
        self.mem_str
            .get(&token)
            .copied()
            .ok_or(PatcherError::TokenUndefined(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_once_per_token_last_writer_wins() {
        let mut mem = PatcherMemory::new();
        mem.store_str(5, 10);
        mem.store_str(5, 20);
        assert_eq!(mem.lookup_str(5).unwrap(), 20);
    }

    #[test]
    fn missing_token_is_fatal() {
        let mem = PatcherMemory::new();
        assert!(matches!(mem.lookup_2da(1), Err(PatcherError::TokenUndefined(1))));
    }
}
