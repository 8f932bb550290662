//! Per-cycle discovery of the CPUs and PCI devices held by running containers.
//!
//! The [`Scanner`] talks to the container runtime through the
//! [`RuntimeService`] seam, decodes each container's verbose info blob and reads
//! its cpuset from the cgroup filesystem.
mod error;
pub mod info;
mod runtime;
mod scanner;

pub use error::{ScanError, SkipReason, Skipped};
pub use runtime::{CriClient, RuntimeService};
pub use scanner::{
    PCI_DEVICE_ENV_PREFIX, ScanReport, Scanner, cpu_resource, pci_device_resources,
};
