use std::{
    ffi::c_void,
    panic::{self, AssertUnwindSafe},
};

use log::warn;

use crate::collector::TensorCollector;

/// The two phases of a scheduler eval callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The engine asks whether the tensor should be observed.
    Ask,
    /// The tensor finished computing.
    Computed,
}

impl Phase {
    pub fn from_ask_flag(is_ask: bool) -> Self {
        if is_ask { Phase::Ask } else { Phase::Computed }
    }
}

/// Capability handed to an inference engine: called once per phase per evaluated tensor.
///
/// Returning `false` from [`Phase::Ask`] skips the tensor; returning `false` from
/// [`Phase::Computed`] stops the evaluation pass.
pub trait EvalCallback {
    fn on_eval(&self, tensor: usize, phase: Phase) -> bool;
}

impl<F> EvalCallback for F
where
    F: Fn(usize, Phase) -> bool,
{
    fn on_eval(&self, tensor: usize, phase: Phase) -> bool {
        self(tensor, phase)
    }
}

impl EvalCallback for TensorCollector {
    fn on_eval(&self, tensor: usize, phase: Phase) -> bool {
        self.record_tensor(tensor, phase == Phase::Ask)
    }
}

/// Signature of the native scheduler eval callback.
pub type NativeEvalCallback = unsafe extern "C" fn(tensor: *mut c_void, ask: bool, user_data: *mut c_void) -> bool;

/// Formats an engine tensor pointer as the opaque address used in captures.
pub fn format_address(tensor: usize) -> String {
    format!("tensor_{tensor:016x}")
}

/// User data pointer to register next to [`eval_callback`].
///
/// The collector must outlive every evaluation that may invoke the callback.
pub fn collector_user_data(collector: &TensorCollector) -> *mut c_void {
    collector as *const TensorCollector as *mut c_void
}

/// Native entry point forwarding engine callbacks to a [`TensorCollector`].
///
/// Always returns `true`: a fault while recording must never abort inference.
///
/// # Safety
/// `user_data` must be null or a pointer obtained from [`collector_user_data`] whose
/// collector is still alive.
pub unsafe extern "C" fn eval_callback(tensor: *mut c_void, ask: bool, user_data: *mut c_void) -> bool {
    if user_data.is_null() {
        return true;
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: the caller guarantees user_data points to a live TensorCollector,
        // which is only ever accessed through its internal lock.
        let collector = unsafe { &*(user_data as *const TensorCollector) };
        collector.record_tensor(tensor as usize, ask)
    }));

    outcome.unwrap_or_else(|_| {
        warn!("Tensor observation panicked; continuing inference");
        true
    })
}
