//! OpenStack control-plane operator for Kubernetes

#![deny(missing_docs)]

/// Controller construction, one per managed kind
pub mod controller_runner;
/// CRD installation and printing
pub mod crds;
