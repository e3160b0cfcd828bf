/// This test should FAIL to compile
/// A finished blocking section cannot be used again

use gilbridge::{BlockingSection, Handle, Runtime};

fn main() {
    let runtime = Runtime::new();
    let context = runtime.attach_thread();
    let handle = Handle::new(&runtime);

    runtime.execution_lock().acquire(&context);
    let section = BlockingSection::enter(&*handle, &context).expect("enter failed");

    // Resuming consumes the section
    section.finish();

    // This should fail: the section was moved and can no longer be used
    let _ = section.context();
}
