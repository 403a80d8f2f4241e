//! # Integration Tests
//!
//! Whole-runtime scenarios run through the keeper and the service.
//!
//! | Module | Covers |
//! |--------|--------|
//! | `flows` | deposits, custom events, replies, submessage isolation |
//! | `recursion` | nested smart queries and the stack limit |
//! | `gas` | out-of-gas determinism, submessage gas limits |
//! | `concurrency` | queries and transactions through `WasmService` |

pub mod concurrency;
pub mod flows;
pub mod gas;
pub mod recursion;
