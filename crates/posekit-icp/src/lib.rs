#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod icp_vanilla;
pub use icp_vanilla::*;

mod ops;
pub use ops::{evaluate_registration, RegistrationMetrics};
