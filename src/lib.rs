//! Scheme-agnostic tile layer for homomorphic computation.
//!
//! Applications work with [`CTile`] and [`PTile`] handles whose managed
//! operations keep chain indices, scales and relinearization state correct
//! regardless of the backend underneath. Backends plug in through the
//! [`backend::HeBackend`] seam; two ship with the crate, a value-carrying
//! cleartext backend for development and testing and a metadata-only mockup
//! for operation counting and runtime estimation.

pub mod backend;
pub mod bootstrap;
pub mod config;
pub mod context;
pub mod encoder;
pub mod error;
pub mod functions;
pub mod rotate;
pub mod save;
pub mod stats;
pub mod tile;
pub mod traits;

pub use backend::{BackendRegistry, Device, HeBackend};
pub use bootstrap::{BootstrapEvaluator, CkksBootstrapEvaluator};
pub use config::{BootstrapConfig, HeConfigRequirement, PublicFunctions, RotationSet};
pub use context::HeContext;
pub use encoder::Encoder;
pub use error::{HeError, HeResult};
pub use functions::{EvalType, FunctionEvaluator};
pub use rotate::RotateDependencyMapper;
pub use save::Saveable;
pub use stats::{OpType, RunStats};
pub use tile::{CTile, PTile, Tile};
pub use traits::{Capability, HeTraits};
