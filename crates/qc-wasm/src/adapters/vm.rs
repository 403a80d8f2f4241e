//! # VM Engine Adapter
//!
//! Serializes every call into the engine through one process-wide lock.
//!
//! The lock is reentrant: a contract that calls into another contract (or
//! queries one) re-enters the engine on the same thread without blocking.
//! Calls from other threads wait until the outermost call returns.

use crate::domain::entities::{AnalysisReport, Env, MessageInfo};
use crate::domain::messages::{Reply, Response};
use crate::domain::value_objects::Checksum;
use crate::errors::VmError;
use crate::ports::outbound::{Backend, VmOutput, WasmEngine};
use parking_lot::ReentrantMutex;
use std::fmt;
use std::sync::Arc;

/// Shared, serialized handle to the engine.
#[derive(Clone)]
pub struct VmAdapter {
    engine: Arc<ReentrantMutex<Box<dyn WasmEngine>>>,
}

impl fmt::Debug for VmAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmAdapter").finish_non_exhaustive()
    }
}

impl VmAdapter {
    /// Wraps `engine`.
    pub fn new(engine: impl WasmEngine + 'static) -> Self {
        Self {
            engine: Arc::new(ReentrantMutex::new(Box::new(engine))),
        }
    }

    /// Returns true if the current thread could take the lock right now.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.engine.try_lock().is_some()
    }

    /// See [`WasmEngine::create`].
    pub fn create(&self, code: &[u8]) -> Result<Checksum, VmError> {
        self.engine.lock().create(code)
    }

    /// See [`WasmEngine::analyze_code`].
    pub fn analyze_code(&self, checksum: &Checksum) -> Result<AnalysisReport, VmError> {
        self.engine.lock().analyze_code(checksum)
    }

    /// See [`WasmEngine::get_code`].
    pub fn get_code(&self, checksum: &Checksum) -> Result<Vec<u8>, VmError> {
        self.engine.lock().get_code(checksum)
    }

    /// See [`WasmEngine::pin`].
    pub fn pin(&self, checksum: &Checksum) -> Result<(), VmError> {
        self.engine.lock().pin(checksum)
    }

    /// See [`WasmEngine::unpin`].
    pub fn unpin(&self, checksum: &Checksum) -> Result<(), VmError> {
        self.engine.lock().unpin(checksum)
    }

    /// See [`WasmEngine::instantiate`].
    pub fn instantiate(
        &self,
        checksum: &Checksum,
        env: &Env,
        info: &MessageInfo,
        msg: &[u8],
        backend: &mut dyn Backend,
        gas_limit: u64,
    ) -> VmOutput<Response> {
        self.engine
            .lock()
            .instantiate(checksum, env, info, msg, backend, gas_limit)
    }

    /// See [`WasmEngine::execute`].
    pub fn execute(
        &self,
        checksum: &Checksum,
        env: &Env,
        info: &MessageInfo,
        msg: &[u8],
        backend: &mut dyn Backend,
        gas_limit: u64,
    ) -> VmOutput<Response> {
        self.engine
            .lock()
            .execute(checksum, env, info, msg, backend, gas_limit)
    }

    /// See [`WasmEngine::migrate`].
    pub fn migrate(
        &self,
        checksum: &Checksum,
        env: &Env,
        msg: &[u8],
        backend: &mut dyn Backend,
        gas_limit: u64,
    ) -> VmOutput<Response> {
        self.engine.lock().migrate(checksum, env, msg, backend, gas_limit)
    }

    /// See [`WasmEngine::sudo`].
    pub fn sudo(
        &self,
        checksum: &Checksum,
        env: &Env,
        msg: &[u8],
        backend: &mut dyn Backend,
        gas_limit: u64,
    ) -> VmOutput<Response> {
        self.engine.lock().sudo(checksum, env, msg, backend, gas_limit)
    }

    /// See [`WasmEngine::reply`].
    pub fn reply(
        &self,
        checksum: &Checksum,
        env: &Env,
        reply: &Reply,
        backend: &mut dyn Backend,
        gas_limit: u64,
    ) -> VmOutput<Response> {
        self.engine.lock().reply(checksum, env, reply, backend, gas_limit)
    }

    /// See [`WasmEngine::query`].
    pub fn query(
        &self,
        checksum: &Checksum,
        env: &Env,
        msg: &[u8],
        backend: &mut dyn Backend,
        gas_limit: u64,
    ) -> VmOutput<Vec<u8>> {
        self.engine.lock().query(checksum, env, msg, backend, gas_limit)
    }
}
