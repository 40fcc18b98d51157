//! Fault-injecting backend for tests.
//!
//! `MockBackend` behaves like an in-memory tier until told otherwise. Faults
//! model the host failures the engine has to survive:
//!
//! | Fault | Effect |
//! |-------|--------|
//! | [`MockFault::Blocked`] | every call fails with `Unavailable` |
//! | [`MockFault::QuotaOnSet`] | the next `n` writes fail with a quota error |
//! | [`MockFault::DropWrites`] | writes report success but store nothing |
//! | [`MockFault::CorruptWrites`] | writes report success but store altered text |
//! | [`MockFault::FailReads`] | reads fail, writes still land |
//!
//! ```rust,ignore
//! let page = MockBackend::new(TierId::PagePrimary).with_value("NS_data", "[1,2,3]");
//! page.inject(MockFault::QuotaOnSet(1));
//! ```

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use super::{Backend, BackendError, BackendResult, QuotaEstimate, TierId};

/// Failure mode to inject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFault {
    Blocked,
    QuotaOnSet(u32),
    DropWrites,
    CorruptWrites,
    FailReads,
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<String, String>,
    blocked: bool,
    quota_failures: u32,
    drop_writes: bool,
    corrupt_writes: bool,
    fail_reads: bool,
    set_calls: HashMap<String, u32>,
    remove_calls: HashMap<String, u32>,
    get_calls: u32,
}

#[derive(Debug)]
pub struct MockBackend {
    tier: TierId,
    state: Mutex<MockState>,
}

impl MockBackend {
    #[must_use]
    pub fn new(tier: TierId) -> Self {
        Self {
            tier,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Pre-populate raw text without counting it as a write.
    #[must_use]
    pub fn with_value(self, key: &str, raw: &str) -> Self {
        self.put_raw(key, raw);
        self
    }

    #[must_use]
    pub fn with_fault(self, fault: MockFault) -> Self {
        self.inject(fault);
        self
    }

    pub fn inject(&self, fault: MockFault) {
        let mut state = self.state.lock();
        match fault {
            MockFault::Blocked => state.blocked = true,
            MockFault::QuotaOnSet(n) => state.quota_failures = n,
            MockFault::DropWrites => state.drop_writes = true,
            MockFault::CorruptWrites => state.corrupt_writes = true,
            MockFault::FailReads => state.fail_reads = true,
        }
    }

    /// Remove every injected fault.
    pub fn heal(&self) {
        let mut state = self.state.lock();
        state.blocked = false;
        state.quota_failures = 0;
        state.drop_writes = false;
        state.corrupt_writes = false;
        state.fail_reads = false;
    }

    /// Write directly, bypassing faults and counters. Models a writer
    /// outside the engine's control.
    pub fn put_raw(&self, key: &str, raw: &str) {
        self.state
            .lock()
            .entries
            .insert(key.to_string(), raw.to_string());
    }

    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.state.lock().entries.get(key).cloned()
    }

    /// Sorted copy of every stored entry.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    #[must_use]
    pub fn set_calls(&self, key: &str) -> u32 {
        self.state.lock().set_calls.get(key).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_set_calls(&self) -> u32 {
        self.state.lock().set_calls.values().sum()
    }

    #[must_use]
    pub fn remove_calls(&self, key: &str) -> u32 {
        self.state.lock().remove_calls.get(key).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn get_calls(&self) -> u32 {
        self.state.lock().get_calls
    }

    fn unavailable(&self) -> BackendError {
        BackendError::Unavailable {
            tier: self.tier,
            reason: "mock tier is blocked".to_string(),
        }
    }
}

impl Backend for MockBackend {
    fn tier(&self) -> TierId {
        self.tier
    }

    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        let mut state = self.state.lock();
        state.get_calls += 1;
        if state.blocked {
            return Err(self.unavailable());
        }
        if state.fail_reads {
            return Err(BackendError::Io(std::io::Error::other("mock read failure")));
        }
        Ok(state.entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> BackendResult<()> {
        let mut state = self.state.lock();
        *state.set_calls.entry(key.to_string()).or_default() += 1;
        if state.blocked {
            return Err(self.unavailable());
        }
        if state.quota_failures > 0 {
            state.quota_failures -= 1;
            return Err(BackendError::Io(std::io::Error::other(
                "QuotaExceededError: the quota has been exceeded",
            )));
        }
        if state.drop_writes {
            return Ok(());
        }
        let stored = if state.corrupt_writes {
            format!("{value}#corrupt")
        } else {
            value.to_string()
        };
        state.entries.insert(key.to_string(), stored);
        Ok(())
    }

    fn remove(&self, key: &str) -> BackendResult<()> {
        let mut state = self.state.lock();
        *state.remove_calls.entry(key.to_string()).or_default() += 1;
        if state.blocked {
            return Err(self.unavailable());
        }
        state.entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> BackendResult<()> {
        let mut state = self.state.lock();
        if state.blocked {
            return Err(self.unavailable());
        }
        state.entries.clear();
        Ok(())
    }

    fn estimate(&self) -> Option<QuotaEstimate> {
        let state = self.state.lock();
        let usage = state
            .entries
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum();
        Some(QuotaEstimate {
            usage_bytes: usage,
            quota_bytes: Some(1024 * 1024),
        })
    }
}
