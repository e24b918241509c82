//! Multi-step checkout.
//!
//! The cursor is a 1-based position in the configured [`StepSequence`]. The
//! URL `step` parameter is a secondary source of truth applied on load and on
//! every parameter change; `next_step` does not write it back.
//!
//! [`StepSequence`]: marketstall_core::StepSequence

mod machine;

pub use machine::{CheckoutError, CheckoutMachine, CheckoutSession, StepParamSource};
