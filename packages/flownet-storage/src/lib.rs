//! Simulation artifact store
//!
//! Persistence layer for scenario-simulation records. A `Simulation` is an
//! immutable artifact: created once on a successful run, read under user
//! scope, deleted on request, never updated in place.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use flownet_storage::{Simulation, SimulationKind, SimulationStore, SqliteSimulationStore};
//!
//! let store = SqliteSimulationStore::open_in_memory()?;
//!
//! let record = Simulation::new("user-1", "friday-peak", SimulationKind::WhatIf);
//! let stored = store.create(&record).await?;
//!
//! let loaded = store.get_by_user_and_id("user-1", &stored.id).await?;
//! let (page, total) = store.list("user-1", None, Page::default()).await?;
//! store.delete(&stored.id).await?;
//! ```

pub mod domain;
pub mod error;

#[cfg(feature = "sqlite")]
pub mod infrastructure;

pub use error::{ErrorKind, Result, StorageError};

pub use domain::{Page, Simulation, SimulationKind, SimulationStore, SimulationSummary};

#[cfg(feature = "sqlite")]
pub use infrastructure::sqlite::SqliteSimulationStore;
