use gc::{Gc, GcCell, Trace};
use std::cell::Cell;
use std::mem;

pub type GcShared<T> = Gc<GcCell<T>>;

thread_local! {
    static ALLOCATED: Cell<u64> = Cell::new(0);
}

/// Header the collector keeps next to every allocation, roughly.
const BOX_OVERHEAD: usize = 3 * mem::size_of::<usize>();

pub(crate) fn shared<T: Trace + 'static>(x: T) -> GcShared<T> {
    count_bytes(BOX_OVERHEAD + mem::size_of::<GcCell<T>>());
    Gc::new(GcCell::new(x))
}

pub(crate) fn boxed<T: Trace + 'static>(x: T) -> Gc<T> {
    count_bytes(BOX_OVERHEAD + mem::size_of::<T>());
    Gc::new(x)
}

/// Accounts for memory owned by a value outside of its box, e.g. the
/// elements of a vector.
pub(crate) fn count_bytes(n: usize) {
    ALLOCATED.with(|total| total.set(total.get().wrapping_add(n as u64)));
}

/// Bytes allocated on this thread's heap since it started.
pub fn bytes_allocated() -> u64 {
    ALLOCATED.with(|total| total.get())
}

/// Identity comparison of two heap handles.
pub fn same<T: Trace + 'static>(a: &Gc<T>, b: &Gc<T>) -> bool {
    std::ptr::eq(&**a, &**b)
}

/// A stable address for a heap handle, for use in visited sets.
pub fn address<T: Trace + 'static>(x: &Gc<T>) -> usize {
    &**x as *const T as usize
}
