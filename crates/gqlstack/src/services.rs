//! Example domain services: a per-request person provider and a shared
//! counter.

use std::sync::atomic::{AtomicI32, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::Capability;

/// Capability resolving the person provider. Registered as scoped.
pub const PERSON: Capability<dyn PersonProvider> = Capability::new("person");

/// Capability resolving the counter. Registered as singleton.
pub const COUNTER: Capability<dyn CountProvider> = Capability::new("count");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub first_name: String,
    pub last_name: String,
}

pub trait PersonProvider: Send + Sync {
    fn person(&self) -> Person;
}

/// Always returns the same hard-coded person.
#[derive(Debug, Default)]
pub struct StaticPersonProvider;

impl PersonProvider for StaticPersonProvider {
    fn person(&self) -> Person {
        Person {
            first_name: "Mike".to_string(),
            last_name: "Gaffney".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CountError {
    #[error("Adding {delta} to {current} overflows the counter")]
    Overflow { current: i32, delta: i32 },
}

pub trait CountProvider: Send + Sync {
    /// Adds `delta` and returns the new total.
    fn add(&self, delta: i32) -> Result<i32, CountError>;

    fn current(&self) -> i32;
}

/// Lock-free in-memory counter.
#[derive(Debug, Default)]
pub struct InMemoryCounter {
    value: AtomicI32,
}

impl InMemoryCounter {
    #[must_use]
    pub fn new(start: i32) -> Self {
        Self {
            value: AtomicI32::new(start),
        }
    }
}

impl CountProvider for InMemoryCounter {
    fn add(&self, delta: i32) -> Result<i32, CountError> {
        self.value
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_add(delta)
            })
            .map(|previous| previous + delta)
            .map_err(|current| CountError::Overflow { current, delta })
    }

    fn current(&self) -> i32 {
        self.value.load(Ordering::SeqCst)
    }
}
