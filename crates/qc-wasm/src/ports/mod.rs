//! # Ports Layer (Middle Hexagon)
//!
//! Trait definitions between the runtime and the outside world.
//!
//! - **Driving Ports (Inbound)**: `ContractOps`, `ContractViews`, `ContractHost`,
//!   `Replyer`, `ContractQuerier`
//! - **Driven Ports (Outbound)**: `WasmEngine`, `Backend`, `Messenger`,
//!   `AccountKeeper`, `CoinTransferrer`, `BankView`, `PortKeeper`, `StakingView`,
//!   `AuthorizationPolicy`
//! - No concrete implementations in this module

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
