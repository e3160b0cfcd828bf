/// This test should FAIL to compile
/// A callback guard must be released on the thread that acquired it

use std::thread;

use gilbridge::{ContextGuard, Handle, Runtime};

fn main() {
    let runtime: &'static _ = Box::leak(Box::new(Runtime::new()));
    let handle: &'static _ = Box::leak(Box::new(Handle::new(runtime)));

    let guard = ContextGuard::acquire(&**handle);

    // This should fail: the guard is !Send and cannot leave this thread
    thread::spawn(move || {
        drop(guard);
    });
}
