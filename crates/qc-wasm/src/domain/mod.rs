//! # Domain Layer (Inner Hexagon)
//!
//! Records, messages, the cost model and pure helpers.
//! NO I/O, NO async.
//!
//! Dependencies point INWARD only: the keeper and adapters depend on this
//! layer, never the reverse.

pub mod entities;
pub mod gas;
pub mod gas_meter;
pub mod invariants;
pub mod messages;
pub mod services;
pub mod value_objects;

pub use entities::*;
pub use gas::{GasRegister, GasRegisterConfig, WasmGasRegister};
pub use gas_meter::GasMeter;
pub use invariants::*;
pub use messages::*;
pub use services::*;
pub use value_objects::*;
