use std::cell::UnsafeCell;
use std::sync::{Arc, OnceLock};

use dispatch2::{DispatchQoS, DispatchQueue, DispatchQueueAttr, DispatchRetained};
use objc2::rc::Retained;

/// The serial dispatch queue all CoreBluetooth managers and delegates run on
pub(crate) fn queue() -> &'static DispatchQueue {
    static CELL: OnceLock<DispatchRetained<DispatchQueue>> = OnceLock::new();
    CELL.get_or_init(|| {
        let utility =
            DispatchQueue::global_queue(dispatch2::GlobalQueueIdentifier::QualityOfService(DispatchQoS::Utility));
        DispatchQueue::new_with_target("PassBy", DispatchQueueAttr::SERIAL, Some(&utility))
    })
}

/// Restricts access to an Objective-C object to the context of [`queue()`].
///
/// This allows !Send / !Sync Objective-C types to be owned by Rust types that move between threads.
#[derive(Debug)]
pub(crate) struct Dispatched<T>(UnsafeCell<Retained<T>>);

unsafe impl<T> Send for Dispatched<T> {}
unsafe impl<T> Sync for Dispatched<T> {}

impl<T: 'static> Dispatched<T> {
    /// # Safety
    ///
    /// - It must be safe to access `value` from the context of [`queue()`].
    /// - After calling `new`, `value` must only be accessed from within the context of `queue()`.
    pub unsafe fn new(value: Retained<T>) -> Self {
        Self(UnsafeCell::new(value))
    }

    /// Runs `f` on the queue without waiting for it.
    ///
    /// Never blocks, so it is safe to call from delegate callbacks that already run on the queue.
    pub fn dispatch_async<F>(self: &Arc<Self>, f: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        let this = Arc::clone(self);
        queue().exec_async(move || f(unsafe { this.get() }));
    }

    /// # Safety
    ///
    /// This method must only be called from within the context of `queue()`.
    unsafe fn get(&self) -> &T {
        &*self.0.get()
    }
}
