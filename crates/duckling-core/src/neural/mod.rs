//! Policy-facing data: observation layout and assembly, action history, policies
//!
//! The policy itself is a pure vector-to-vector function. This module defines
//! the fixed observation layout it was trained against and everything the
//! control loop needs to feed it.
//!
//! # Example
//!
//! ```
//! use duckling_core::neural::ObservationLayout;
//!
//! let layout = ObservationLayout::duck(14, 2);
//! assert_eq!(layout.total_dim(), 3 + 3 + 7 + 14 * 6 + 2 + 2);
//! ```

mod history;
mod observation;
#[cfg(feature = "onnx")]
mod onnx;
mod policy;
mod spaces;

pub use history::{Action, ActionHistory, HISTORY_DEPTH};
pub use observation::{Assembled, Observation, ObservationAssembler, ObservationInputs, SensorSource};
#[cfg(feature = "onnx")]
pub use onnx::OnnxPolicy;
pub use policy::{
    Activation, ConstantPolicy, DenseLayer, DenseMlpPolicy, FnPolicy, Policy, ZeroPolicy,
};
pub use spaces::{ObservationComponent, ObservationLayout, COMMAND_DIM, PHASE_DIM};
