//! # Adapters Layer (Outer Hexagon)
//!
//! Concrete implementations of the driven ports.
//!
//! | Adapter | Port(s) | Notes |
//! |---------|---------|-------|
//! | `VmAdapter` | wraps `WasmEngine` | process-wide reentrant lock |
//! | `MockEngine` | `WasmEngine` | contracts as native Rust types |
//! | `StoreBank` | `AccountKeeper`, `CoinTransferrer`, `BankView` | balances in the store |
//! | `StorePortKeeper` | `PortKeeper` | IBC port bindings in the store |
//! | `StaticStaking` | `StakingView` | fixed validator set |
//! | `DefaultMessenger`, `MessageHandlerChain` | `Messenger` | bank and wasm messages |
//! | `DefaultAuthorizationPolicy`, `GovAuthorizationPolicy` | `AuthorizationPolicy` | |

pub mod authz;
pub mod bank;
pub mod messenger;
pub mod mock_engine;
pub mod staking;
pub mod vm;

pub use authz::{DefaultAuthorizationPolicy, GovAuthorizationPolicy};
pub use bank::{StoreBank, StorePortKeeper};
pub use messenger::{CustomMsgHandler, DefaultMessenger, MessageHandlerChain};
pub use mock_engine::{ContractLogic, Deps, MockEngine, MockGasCosts};
pub use staking::StaticStaking;
pub use vm::VmAdapter;
