//! Hardware-encoder resource governance.
//!
//! The fleet shares a small number of named resource classes (hardware encoder
//! families with fixed capacities). This module holds:
//!
//! - [`ResourceClass`] a named class with its capacity and encoder family
//! - [`ResourcePool`] the process-wide, lock-protected slot counters
//! - [`Lease`] an RAII slot: released exactly once, on drop
//! - [`ClassAssigner`] the coordinator's greedy, advisory preferred-class policy
//!
//! ## Wiring
//! ```text
//! Fleet::load_roster ──► ClassAssigner::assign() ──► preferred class per camera
//! WorkerActor (Starting) ──► ResourcePool::lease(preferred)
//!                               ├─ preferred has room        ─► Lease(preferred)
//!                               ├─ fallback in priority order ─► Lease(other)
//!                               └─ all full                  ─► AllocError::Exhausted (wait, uncounted)
//! WorkerActor (exit/stop) ──► drop(Lease) ──► ResourcePool::release(class)
//! ```

mod assign;
mod class;
mod pool;

pub use assign::ClassAssigner;
pub use class::ResourceClass;
pub use pool::{ClassUsage, Lease, ResourcePool};
