//! # Comanda Supervisor
//!
//! Owns the tenant processes of the control plane: one OS process per
//! active restaurant, bound to the restaurant's port.

pub mod error;
pub mod launcher;
pub mod reconcile;
pub mod registry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::SupervisorError;
pub use launcher::{CommandLauncher, Launcher, ProcessHandle};
pub use reconcile::ReconcileReport;
pub use registry::{InstanceHandle, InstanceRegistry, SupervisorOptions};
