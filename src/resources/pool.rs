//! # Resource pool: linearizable slot counters per resource class.
//!
//! [`ResourcePool`] owns one `allocated` counter per class. All counters live behind a
//! single [`parking_lot::Mutex`], so every acquire/release is linearizable and no
//! interleaving can observe `allocated > capacity`.
//!
//! ## Rules
//! - `acquire(preferred)` tries `preferred` first, then every other class in priority order
//! - all classes full → [`AllocError::Exhausted`] (caller waits; not a permanent failure)
//! - `release(class)` must be called exactly once per successful acquire; [`Lease`]
//!   enforces this by releasing in `Drop`
//! - capacities are fixed at construction and never resized

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ResourceClassConfig;
use crate::error::AllocError;
use crate::resources::class::ResourceClass;

/// Point-in-time usage of one class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassUsage {
    /// Class name.
    pub name: String,
    /// Configured capacity.
    pub capacity: usize,
    /// Slots currently held.
    pub allocated: usize,
}

impl fmt::Display for ClassUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}/{}", self.name, self.allocated, self.capacity)
    }
}

/// Process-wide pool of hardware-encoder slots.
#[derive(Debug)]
pub struct ResourcePool {
    /// Classes in priority order.
    classes: Vec<ResourceClass>,
    /// `allocated[i]` belongs to `classes[i]`.
    allocated: Mutex<Vec<usize>>,
}

impl ResourcePool {
    /// Creates a pool; the iteration order is the fallback priority order.
    pub fn new(classes: impl IntoIterator<Item = ResourceClass>) -> Self {
        let classes: Vec<ResourceClass> = classes.into_iter().collect();
        let allocated = Mutex::new(vec![0; classes.len()]);
        Self { classes, allocated }
    }

    /// Creates a pool from configuration.
    pub fn from_config(classes: &[ResourceClassConfig]) -> Self {
        Self::new(classes.iter().map(ResourceClass::from))
    }

    /// Classes in priority order.
    pub fn classes(&self) -> &[ResourceClass] {
        &self.classes
    }

    /// Looks up a class by name.
    pub fn class(&self, name: &str) -> Option<&ResourceClass> {
        self.classes.iter().find(|c| c.name() == name)
    }

    /// Takes one slot, preferring `preferred` and falling back in priority order.
    pub fn acquire(&self, preferred: &str) -> Result<ResourceClass, AllocError> {
        let mut allocated = self.allocated.lock();

        let preferred_idx = self.index_of(preferred);
        let order = preferred_idx
            .into_iter()
            .chain((0..self.classes.len()).filter(|i| Some(*i) != preferred_idx));

        for idx in order {
            if allocated[idx] < self.classes[idx].capacity() {
                allocated[idx] += 1;
                return Ok(self.classes[idx].clone());
            }
        }

        Err(AllocError::Exhausted {
            preferred: preferred.to_string(),
        })
    }

    /// Returns one slot of `class` to the pool.
    ///
    /// Releasing a class with no outstanding slot is a caller bug; it is logged and
    /// ignored so the counter can never underflow.
    pub fn release(&self, class: &str) {
        let Some(idx) = self.index_of(class) else {
            tracing::warn!(class, "release of unknown resource class ignored");
            return;
        };

        let mut allocated = self.allocated.lock();
        if allocated[idx] == 0 {
            tracing::warn!(class, "release without matching acquire ignored");
            return;
        }
        allocated[idx] -= 1;
    }

    /// Takes one slot wrapped in a [`Lease`] that releases it on drop.
    pub fn lease(self: &Arc<Self>, preferred: &str) -> Result<Lease, AllocError> {
        let class = self.acquire(preferred)?;
        Ok(Lease {
            pool: Arc::clone(self),
            class,
        })
    }

    /// Slots currently held in `class` (0 for unknown classes).
    pub fn allocated(&self, class: &str) -> usize {
        self.index_of(class)
            .map(|idx| self.allocated.lock()[idx])
            .unwrap_or(0)
    }

    /// Total slots currently held across all classes.
    pub fn total_allocated(&self) -> usize {
        self.allocated.lock().iter().sum()
    }

    /// Consistent usage snapshot of every class (taken under one lock).
    pub fn snapshot(&self) -> Vec<ClassUsage> {
        let allocated = self.allocated.lock();
        self.classes
            .iter()
            .zip(allocated.iter())
            .map(|(class, used)| ClassUsage {
                name: class.name().to_string(),
                capacity: class.capacity(),
                allocated: *used,
            })
            .collect()
    }

    /// Human-readable usage summary, e.g. `nvenc: 6/6, vaapi: 2/6`.
    pub fn status(&self) -> String {
        self.snapshot()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.classes.iter().position(|c| c.name() == name)
    }
}

/// One held slot. Dropping the lease returns the slot to its pool.
#[derive(Debug)]
pub struct Lease {
    pool: Arc<ResourcePool>,
    class: ResourceClass,
}

impl Lease {
    /// The class this slot belongs to.
    pub fn class(&self) -> &ResourceClass {
        &self.class
    }

    /// Releases the slot now (same as dropping the lease).
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.pool.release(self.class.name());
    }
}
