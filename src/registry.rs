//! Generation-tagged slot arena mapping opaque `u32` handles to kernels.
//!
//! Handle layout: low 16 bits hold `slot + 1`, high 16 bits the slot's
//! generation. Freeing a slot bumps its generation, so stale handles are
//! detected instead of aliasing a newer kernel. `0` is never issued.
//!
//! Each live kernel sits behind its own lock. Callers resolve a handle to a
//! [`SharedInstance`] and release the registry before touching the kernel.

use std::ffi::CString;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::KernelError;
use crate::kernel::Kernel;

const SLOT_BITS: u32 = 16;
const SLOT_MASK: u32 = (1 << SLOT_BITS) - 1;
/// Maximum number of live handles.
pub const MAX_SLOTS: usize = SLOT_MASK as usize;

/// Opaque kernel handle as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelHandle(u32);

impl KernelHandle {
    pub const NULL: KernelHandle = KernelHandle(0);

    pub fn from_raw(raw: u32) -> Self {
        KernelHandle(raw)
    }

    pub fn into_raw(self) -> u32 {
        self.0
    }

    fn compose(slot: usize, generation: u16) -> Self {
        KernelHandle(((generation as u32) << SLOT_BITS) | (slot as u32 + 1))
    }

    fn slot(self) -> Option<usize> {
        (self.0 & SLOT_MASK).checked_sub(1).map(|s| s as usize)
    }

    fn generation(self) -> u16 {
        (self.0 >> SLOT_BITS) as u16
    }
}

/// A built kernel plus the C strings handed out for it.
#[derive(Debug)]
pub struct Instance {
    pub kernel: Kernel,
    node_ids: Vec<CString>,
    error: CString,
}

impl Instance {
    fn new(kernel: Kernel) -> Self {
        let node_ids = kernel
            .graph()
            .nodes()
            .iter()
            .map(|n| to_c_string(&n.external_id))
            .collect();
        Instance { kernel, node_ids, error: CString::default() }
    }

    pub fn node_id_c(&self, index: usize) -> Option<&CString> {
        self.node_ids.get(index)
    }

    /// Refreshes and returns the C copy of the kernel's Error Record.
    pub fn error_c(&mut self) -> &CString {
        self.error = to_c_string(self.kernel.error_description().unwrap_or(""));
        &self.error
    }
}

/// A live instance, shared between the registry and in-flight calls.
pub type SharedInstance = Arc<Mutex<Instance>>;

/// Locks an instance. A call that panicked mid-step never committed, so a
/// poisoned instance is still consistent.
pub fn lock_instance(shared: &Mutex<Instance>) -> MutexGuard<'_, Instance> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Contents of an occupied slot.
#[derive(Debug)]
pub enum Entry {
    Live(SharedInstance),
    /// Result of a failed Init: only the error description is available.
    Failed(CString),
}

#[derive(Debug)]
struct Slot {
    generation: u16,
    entry: Option<Entry>,
}

#[derive(Debug, Default)]
pub struct Registry {
    slots: Vec<Slot>,
    free: Vec<usize>,
}

impl Registry {
    pub const fn new() -> Self {
        Registry { slots: Vec::new(), free: Vec::new() }
    }

    pub fn insert_kernel(&mut self, kernel: Kernel) -> Result<KernelHandle, KernelError> {
        self.insert(Entry::Live(Arc::new(Mutex::new(Instance::new(kernel)))))
    }

    pub fn insert_failure(&mut self, err: &KernelError) -> Result<KernelHandle, KernelError> {
        self.insert(Entry::Failed(to_c_string(&err.to_string())))
    }

    fn insert(&mut self, entry: Entry) -> Result<KernelHandle, KernelError> {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None if self.slots.len() < MAX_SLOTS => {
                self.slots.push(Slot { generation: 1, entry: None });
                self.slots.len() - 1
            }
            None => {
                return Err(KernelError::InvalidParameter {
                    name: "handle".into(),
                    reason: format!("registry is full ({} live kernels)", MAX_SLOTS),
                })
            }
        };
        let s = &mut self.slots[slot];
        s.entry = Some(entry);
        Ok(KernelHandle::compose(slot, s.generation))
    }

    pub fn entry(&self, handle: KernelHandle) -> Option<&Entry> {
        let slot = self.slots.get(handle.slot()?)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.entry.as_ref()
    }

    /// The live instance behind `handle`. Failed-Init handles are invalid here.
    ///
    /// The returned instance outlives a concurrent `remove` of the handle.
    pub fn instance(&self, handle: KernelHandle) -> Result<SharedInstance, KernelError> {
        match self.entry(handle) {
            Some(Entry::Live(inst)) => Ok(Arc::clone(inst)),
            _ => Err(KernelError::InvalidHandle),
        }
    }

    /// Releases the slot. Returns `false` for unknown or stale handles.
    pub fn remove(&mut self, handle: KernelHandle) -> bool {
        let Some(index) = handle.slot() else { return false };
        let Some(slot) = self.slots.get_mut(index) else { return false };
        if slot.generation != handle.generation() || slot.entry.is_none() {
            return false;
        }
        slot.entry = None;
        // Generation 0 is skipped so a recycled handle can never be 0.
        slot.generation = match slot.generation.wrapping_add(1) {
            0 => 1,
            g => g,
        };
        self.free.push(index);
        true
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }
}

/// Interior NULs cannot cross the boundary; they are replaced.
fn to_c_string(s: &str) -> CString {
    CString::new(s.replace('\0', "\u{FFFD}")).unwrap_or_default()
}
