//! Control-plane rollout for the OpenStack operator
//!
//! Provides the controller for OpenStackControlPlane CRDs. A control plane
//! rolls its children out tier by tier:
//!
//! Pending -> Infrastructure -> Identity -> CoreServices -> Compute -> Ready
//!
//! Each phase waits for the tier created by the previous one. A spec that
//! fails validation parks the control plane in Failed until it is edited.

pub mod controller;
pub mod defaults;
mod phases;

pub use controller::{error_policy, reconcile, Context};

// Re-export common error types
pub use openstack_common::{Error, Result};
