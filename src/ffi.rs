//!
//! C ABI over the kernel registry.
//!
//! # FFI Safety
//!
//! - Every entry point runs inside `catch_unwind`; a panic is reported as a
//!   status code (or a null/NaN return) and never unwinds into the host.
//! - Handles are validated against the registry before use. Stale, forged or
//!   failed-Init handles yield `InvalidHandle` and are never dereferenced.
//! - Pointers returned by `GSSK_GetState` and `GSSK_GetNodeID` stay valid
//!   until `GSSK_Free` on that handle. The pointer from
//!   `GSSK_GetErrorDescription` stays valid until the next call on that handle.
//! - The process-wide registry lock is held only while a handle is resolved.
//!   Each kernel then has its own lock, so calls on different handles run in
//!   parallel and calls on the same handle are serialised.

#![allow(unsafe_code, non_snake_case, non_camel_case_types)]

use std::ffi::{c_char, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::analysis::{CalibrationOptions, NodeObservations, Observation};
use crate::error::{KernelError, Status};
use crate::kernel::Kernel;
use crate::model::ModelSpec;
use crate::registry::{lock_instance, Entry, Instance, KernelHandle, Registry, SharedInstance};

static REGISTRY: Mutex<Registry> = Mutex::new(Registry::new());

static INVALID_HANDLE_MSG: &[u8] = b"Invalid kernel handle\0";

/// Envelopes returned by `GSSK_EnsembleForecast`, laid out
/// `[sample * node_count + slot]`. Release with `GSSK_FreeEnsembleResult`.
#[repr(C)]
#[derive(Debug)]
pub struct GSSK_EnsembleResult {
    pub min_envelope: *mut f64,
    pub max_envelope: *mut f64,
    pub mean_envelope: *mut f64,
    /// State Vector slots per sample.
    pub node_count: usize,
    /// Samples per run.
    pub step_count: usize,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GSSK_Observation {
    pub time: f64,
    pub value: f64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GSSK_NodeObservations {
    pub node_id: *const c_char,
    pub data: *const GSSK_Observation,
    pub count: usize,
}

fn registry() -> MutexGuard<'static, Registry> {
    // A panic while holding the lock leaves the registry structurally intact.
    REGISTRY.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lookup(handle: u32) -> Result<SharedInstance, KernelError> {
    registry().instance(KernelHandle::from_raw(handle))
}

/// Runs `f` with the instance behind `handle` locked. The registry lock is
/// already released when `f` runs.
fn with_instance<T>(handle: u32, f: impl FnOnce(&mut Instance) -> T) -> Result<T, KernelError> {
    let shared = lookup(handle)?;
    let mut inst = lock_instance(&shared);
    Ok(f(&mut *inst))
}

fn with_kernel<T>(handle: u32, f: impl FnOnce(&mut Kernel) -> T) -> Result<T, KernelError> {
    with_instance(handle, |inst| f(&mut inst.kernel))
}

fn try_with_kernel<T>(
    handle: u32,
    f: impl FnOnce(&mut Kernel) -> Result<T, KernelError>,
) -> Result<T, KernelError> {
    with_kernel(handle, f)?
}

fn guard<T>(fallback: T, body: impl FnOnce() -> T) -> T {
    catch_unwind(AssertUnwindSafe(body)).unwrap_or(fallback)
}

fn status_of(result: Result<(), KernelError>) -> i32 {
    match result {
        Ok(()) => Status::Success.code(),
        Err(e) => e.status().code(),
    }
}

/// Builds and registers a kernel, returning the status and the handle to
/// hand back. Failures still register an error-only handle.
fn init_from_bytes(bytes: &[u8]) -> (i32, u32) {
    let built = ModelSpec::from_slice(bytes).and_then(|spec| spec.build());
    let mut reg = registry();
    let (inserted, status) = match built {
        Ok(kernel) => (reg.insert_kernel(kernel), Status::Success),
        Err(e) => {
            let status = e.status();
            (reg.insert_failure(&e), status)
        }
    };
    match inserted {
        Ok(handle) => (status.code(), handle.into_raw()),
        Err(e) => (e.status().code(), KernelHandle::NULL.into_raw()),
    }
}

/// Builds a kernel from a NUL-terminated JSON document.
///
/// A handle is written to `out` even on failure; it then only answers
/// `GSSK_GetErrorDescription` and must still be released with `GSSK_Free`.
///
/// # Safety
/// `json` must be null or a valid NUL-terminated string. `out` must be null
/// or valid for a `u32` write.
#[no_mangle]
pub unsafe extern "C" fn GSSK_Init(json: *const c_char, out: *mut u32) -> i32 {
    guard(Status::InvalidArgument.code(), || {
        if json.is_null() || out.is_null() {
            return Status::InvalidArgument.code();
        }
        // SAFETY: non-null and NUL-terminated per the contract above.
        let bytes = unsafe { CStr::from_ptr(json) }.to_bytes();
        let (status, handle) = init_from_bytes(bytes);
        // SAFETY: `out` is non-null and writable per the contract above.
        unsafe { *out = handle };
        status
    })
}

/// Same as `GSSK_Init` for a buffer that need not be NUL-terminated.
///
/// # Safety
/// `ptr` must be valid for `len` bytes of reads. `out` must be null or valid
/// for a `u32` write.
#[no_mangle]
pub unsafe extern "C" fn GSSK_InitWithLength(ptr: *const u8, len: usize, out: *mut u32) -> i32 {
    guard(Status::InvalidArgument.code(), || {
        if ptr.is_null() || out.is_null() {
            return Status::InvalidArgument.code();
        }
        // SAFETY: the caller guarantees `len` readable bytes at `ptr`.
        let bytes = unsafe { std::slice::from_raw_parts(ptr, len) };
        let (status, handle) = init_from_bytes(bytes);
        // SAFETY: `out` is non-null and writable per the contract above.
        unsafe { *out = handle };
        status
    })
}

/// Advances the kernel by `dt` (non-positive or non-finite selects the
/// configured `dt`).
#[no_mangle]
pub extern "C" fn GSSK_Step(handle: u32, dt: f64) -> i32 {
    guard(Status::InvalidArgument.code(), || {
        status_of(try_with_kernel(handle, |k| k.step(dt).map(|_| ())))
    })
}

#[no_mangle]
pub extern "C" fn GSSK_Reset(handle: u32) -> i32 {
    guard(Status::InvalidArgument.code(), || {
        status_of(with_kernel(handle, |k| k.reset()))
    })
}

/// Pointer to the live State Vector, or null for an invalid handle.
#[no_mangle]
pub extern "C" fn GSSK_GetState(handle: u32) -> *const f64 {
    guard(ptr::null(), || {
        with_kernel(handle, |k| k.state_ptr()).unwrap_or(ptr::null())
    })
}

#[no_mangle]
pub extern "C" fn GSSK_GetStateSize(handle: u32) -> usize {
    guard(0, || {
        with_kernel(handle, |k| k.state_size()).unwrap_or(0)
    })
}

#[no_mangle]
pub extern "C" fn GSSK_GetNodeCount(handle: u32) -> usize {
    guard(0, || {
        with_kernel(handle, |k| k.node_count()).unwrap_or(0)
    })
}

/// External id of node `index`, or null when the handle or index is invalid.
#[no_mangle]
pub extern "C" fn GSSK_GetNodeID(handle: u32, index: usize) -> *const c_char {
    guard(ptr::null(), || {
        with_instance(handle, |inst| inst.node_id_c(index).map_or(ptr::null(), |s| s.as_ptr())).unwrap_or(ptr::null())
    })
}

/// Index of the node called `id`, or -1.
///
/// # Safety
/// `id` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn GSSK_FindNodeIdx(handle: u32, id: *const c_char) -> i32 {
    guard(-1, || {
        if id.is_null() {
            return -1;
        }
        // SAFETY: non-null and NUL-terminated per the contract above.
        let Ok(id) = unsafe { CStr::from_ptr(id) }.to_str() else { return -1 };
        with_kernel(handle, |k| k.find_node(id))
            .ok()
            .flatten()
            .and_then(|i| i32::try_from(i).ok())
            .unwrap_or(-1)
    })
}

fn time_query(handle: u32, read: impl FnOnce(&mut Kernel) -> f64) -> f64 {
    guard(f64::NAN, || with_kernel(handle, read).unwrap_or(f64::NAN))
}

#[no_mangle]
pub extern "C" fn GSSK_GetTStart(handle: u32) -> f64 {
    time_query(handle, |k| k.t_start())
}

#[no_mangle]
pub extern "C" fn GSSK_GetTEnd(handle: u32) -> f64 {
    time_query(handle, |k| k.t_end())
}

/// The configured `dt`.
#[no_mangle]
pub extern "C" fn GSSK_GetDt(handle: u32) -> f64 {
    time_query(handle, |k| k.dt())
}

#[no_mangle]
pub extern "C" fn GSSK_GetTCurrent(handle: u32) -> f64 {
    time_query(handle, |k| k.t_current())
}

#[no_mangle]
pub extern "C" fn GSSK_GetEdgeCount(handle: u32) -> usize {
    guard(0, || {
        with_kernel(handle, |k| k.edge_count()).unwrap_or(0)
    })
}

/// Coefficient `k` of edge `index`, NaN when the handle or index is invalid.
#[no_mangle]
pub extern "C" fn GSSK_GetEdgeK(handle: u32, index: usize) -> f64 {
    guard(f64::NAN, || {
        try_with_kernel(handle, |k| k.edge_k(index)).unwrap_or(f64::NAN)
    })
}

#[no_mangle]
pub extern "C" fn GSSK_SetEdgeK(handle: u32, index: usize, k: f64) -> i32 {
    guard(Status::InvalidArgument.code(), || {
        status_of(try_with_kernel(handle, |kernel| kernel.set_edge_k(index, k)))
    })
}

/// Text of the handle's Error Record (empty if nothing failed yet).
#[no_mangle]
pub extern "C" fn GSSK_GetErrorDescription(handle: u32) -> *const c_char {
    guard(INVALID_HANDLE_MSG.as_ptr().cast(), || {
        let shared = match registry().entry(KernelHandle::from_raw(handle)) {
            Some(Entry::Live(inst)) => Arc::clone(inst),
            // Failed entries are immutable until freed.
            Some(Entry::Failed(msg)) => return msg.as_ptr(),
            None => return INVALID_HANDLE_MSG.as_ptr().cast(),
        };
        let mut inst = lock_instance(&shared);
        inst.error_c().as_ptr()
    })
}

fn into_raw_buffer(values: Vec<f64>) -> *mut f64 {
    Box::into_raw(values.into_boxed_slice()).cast()
}

/// Runs a perturbed ensemble. Returns null on failure; the reason is in the
/// Error Record.
#[no_mangle]
pub extern "C" fn GSSK_EnsembleForecast(
    handle: u32,
    runs: u32,
    perturbation: f64,
    seed: u64,
) -> *mut GSSK_EnsembleResult {
    guard(ptr::null_mut(), || {
        match try_with_kernel(handle, |k| k.ensemble_forecast(runs as usize, perturbation, seed)) {
            Ok(res) => Box::into_raw(Box::new(GSSK_EnsembleResult {
                min_envelope: into_raw_buffer(res.min),
                max_envelope: into_raw_buffer(res.max),
                mean_envelope: into_raw_buffer(res.mean),
                node_count: res.state_size,
                step_count: res.sample_count,
            })),
            Err(_) => ptr::null_mut(),
        }
    })
}

/// # Safety
/// `result` must be null or a pointer returned by `GSSK_EnsembleForecast`
/// that has not been freed yet.
#[no_mangle]
pub unsafe extern "C" fn GSSK_FreeEnsembleResult(result: *mut GSSK_EnsembleResult) {
    guard((), || {
        if result.is_null() {
            return;
        }
        // SAFETY: produced by Box::into_raw in GSSK_EnsembleForecast.
        let res = unsafe { Box::from_raw(result) };
        let len = res.node_count * res.step_count;
        for buf in [res.min_envelope, res.max_envelope, res.mean_envelope] {
            if !buf.is_null() {
                // SAFETY: each buffer is a boxed slice of exactly `len` values.
                drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(buf, len)) });
            }
        }
    })
}

/// Copies host observation series into owned Rust values.
///
/// # Safety
/// See `GSSK_Calibrate`.
unsafe fn read_observations(
    obs: *const GSSK_NodeObservations,
    count: usize,
) -> Result<Vec<NodeObservations>, KernelError> {
    let invalid = |reason: &str| KernelError::InvalidParameter { name: "observations".into(), reason: reason.into() };
    if obs.is_null() {
        return Err(invalid("null pointer"));
    }
    // SAFETY: the caller guarantees `count` readable entries.
    let series = unsafe { std::slice::from_raw_parts(obs, count) };
    let mut owned = Vec::with_capacity(count);
    for s in series {
        if s.node_id.is_null() || (s.data.is_null() && s.count > 0) {
            return Err(invalid("null node id or data pointer"));
        }
        // SAFETY: non-null and NUL-terminated per the contract.
        let node_id = unsafe { CStr::from_ptr(s.node_id) }
            .to_str()
            .map_err(|_| invalid("node id is not UTF-8"))?
            .to_string();
        let data = if s.count == 0 {
            Vec::new()
        } else {
            // SAFETY: the caller guarantees `s.count` readable observations.
            unsafe { std::slice::from_raw_parts(s.data, s.count) }
                .iter()
                .map(|o| Observation { time: o.time, value: o.value })
                .collect()
        };
        owned.push(NodeObservations { node_id, data });
    }
    Ok(owned)
}

/// Fits every edge `k` to the observations and resets the kernel.
///
/// # Safety
/// `obs` must point to `count` entries; each `node_id` must be a valid
/// NUL-terminated string and each `data` valid for `count` observations.
#[no_mangle]
pub unsafe extern "C" fn GSSK_Calibrate(
    handle: u32,
    obs: *const GSSK_NodeObservations,
    count: usize,
    iterations: u32,
    seed: u64,
) -> i32 {
    guard(Status::InvalidArgument.code(), || {
        let shared = match lookup(handle) {
            Ok(shared) => shared,
            Err(e) => return e.status().code(),
        };
        // SAFETY: forwarded caller contract.
        let observations = unsafe { read_observations(obs, count) };
        // Only this kernel stays locked for the whole fit.
        let mut inst = lock_instance(&shared);
        let observations = match observations {
            Ok(o) => o,
            Err(e) => {
                inst.kernel.record_error(&e);
                return e.status().code();
            }
        };
        let options = CalibrationOptions { iterations: iterations as usize, seed, ..CalibrationOptions::default() };
        status_of(inst.kernel.calibrate(&observations, &options).map(|_| ()))
    })
}

/// Releases a handle. Unknown or already-freed handles are ignored.
#[no_mangle]
pub extern "C" fn GSSK_Free(handle: u32) {
    guard((), || {
        registry().remove(KernelHandle::from_raw(handle));
    })
}
