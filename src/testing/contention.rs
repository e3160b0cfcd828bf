/// Contention proofs for the coordination layer.
///
/// Two suites: one hammers a single share handle's category locks from many
/// threads and checks mutual exclusion plus clean lock handoff; the other
/// runs the full suspend/callback/resume protocol on independent handles
/// over one runtime and checks that nothing leaks a held lock or a stale
/// context slot.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::unbounded;

use crate::handles::easy::Handle;
use crate::handles::share::{ShareAccess, ShareHandle};
use crate::locks::share_array::ShareCategory;
use crate::runtime::guard::{BlockingSection, ContextGuard};
use crate::runtime::lock::Runtime;

/// Contention proof configuration
#[derive(Debug, Clone)]
pub struct ContentionProofConfig {
    /// Worker threads to run concurrently
    pub threads: usize,

    /// Lock/unlock iterations per worker
    pub iterations: usize,

    /// Upper bound for random pre-lock jitter, in microseconds
    pub max_jitter_us: u64,

    /// Share data category to contend on
    pub category: ShareCategory,
}

impl Default for ContentionProofConfig {
    fn default() -> Self {
        ContentionProofConfig {
            threads: 4,
            iterations: 50,
            max_jitter_us: 200,
            category: ShareCategory::Dns,
        }
    }
}

/// Contention proof result
#[derive(Debug, Clone)]
pub struct ContentionProofResult {
    /// Total iterations across all workers
    pub iterations: usize,

    /// Critical-section entries observed
    pub entries: usize,

    /// Mutual-exclusion violations (two workers inside at once)
    pub exclusion_violations: Vec<String>,

    /// Handoff violations (lock or slot state wrong at a boundary)
    pub handoff_violations: Vec<String>,
}

impl ContentionProofResult {
    pub fn new(iterations: usize) -> Self {
        ContentionProofResult {
            iterations,
            entries: 0,
            exclusion_violations: Vec::new(),
            handoff_violations: Vec::new(),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.exclusion_violations.is_empty() && self.handoff_violations.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionEvent {
    Enter(usize),
    Exit(usize),
}

/// Hammer one share category lock from `config.threads` workers.
///
/// Each worker loops: jitter, lock the category, record entry, record exit,
/// unlock. An occupancy counter catches overlapping entries directly; the
/// event stream, sent from inside the critical section, is replayed
/// afterwards to check strict enter/exit alternation.
pub fn run_share_contention_proof(config: &ContentionProofConfig) -> ContentionProofResult {
    let total = config.threads * config.iterations;
    let mut result = ContentionProofResult::new(total);

    log::info!(
        "Starting share contention proof: {} threads x {} iterations on {}",
        config.threads,
        config.iterations,
        config.category.as_str()
    );

    let share = match ShareHandle::new() {
        Ok(share) => share,
        Err(err) => {
            result
                .handoff_violations
                .push(format!("share handle construction failed: {}", err));
            return result;
        }
    };

    let occupancy = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = unbounded();

    let mut workers = Vec::with_capacity(config.threads);
    for worker_idx in 0..config.threads {
        let share = Arc::clone(&share);
        let occupancy = Arc::clone(&occupancy);
        let overlaps = Arc::clone(&overlaps);
        let tx = tx.clone();
        let category = config.category;
        let iterations = config.iterations;
        let max_jitter_us = config.max_jitter_us;

        workers.push(thread::spawn(move || {
            for _ in 0..iterations {
                if max_jitter_us > 0 {
                    thread::sleep(Duration::from_micros(fastrand::u64(0..=max_jitter_us)));
                }

                share.lock_hook(category, ShareAccess::Exclusive);

                // Inside the critical section: the occupancy counter must
                // have been zero, and both events land on the channel in
                // lock order.
                let prev = occupancy.fetch_add(1, Ordering::SeqCst);
                if prev != 0 {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                let _ = tx.send(SectionEvent::Enter(worker_idx));
                let _ = tx.send(SectionEvent::Exit(worker_idx));
                occupancy.fetch_sub(1, Ordering::SeqCst);

                share.unlock_hook(category);
            }
        }));
    }
    drop(tx);

    for worker in workers {
        if worker.join().is_err() {
            result
                .handoff_violations
                .push("share contention worker panicked".to_string());
        }
    }

    let overlap_count = overlaps.load(Ordering::SeqCst);
    if overlap_count > 0 {
        result.exclusion_violations.push(format!(
            "{} overlapping critical-section entries on {}",
            overlap_count,
            config.category.as_str()
        ));
    }

    // Replay the event stream: every Enter must be followed by the same
    // worker's Exit before the next Enter.
    let mut inside: Option<usize> = None;
    for event in rx {
        match event {
            SectionEvent::Enter(worker) => {
                if let Some(current) = inside {
                    result.handoff_violations.push(format!(
                        "worker {} entered while worker {} was still inside",
                        worker, current
                    ));
                }
                inside = Some(worker);
                result.entries += 1;
            }
            SectionEvent::Exit(worker) => {
                if inside != Some(worker) {
                    result
                        .handoff_violations
                        .push(format!("worker {} exited a section it did not enter", worker));
                }
                inside = None;
            }
        }
    }
    if let Some(worker) = inside {
        result
            .handoff_violations
            .push(format!("worker {} never exited its last section", worker));
    }

    if share.lock_array().is_held(config.category) {
        result.handoff_violations.push(format!(
            "{} lock still held after all workers finished",
            config.category.as_str()
        ));
    }

    log::info!(
        "Share contention proof complete: {} entries, pass={}",
        result.entries,
        result.is_pass()
    );

    result
}

/// Run the full suspend/callback/resume protocol on independent handles.
///
/// Every worker attaches to the same runtime, then per iteration: acquire
/// the execution lock, open a handle, enter a blocking section (which
/// releases the lock so the other workers can run), take a callback guard
/// through the handle, finish the section, and release the lock. Workers
/// suspend concurrently; only the guard-held region is exclusive.
pub fn run_handle_independence_proof(config: &ContentionProofConfig) -> ContentionProofResult {
    let total = config.threads * config.iterations;
    let mut result = ContentionProofResult::new(total);

    log::info!(
        "Starting handle independence proof: {} threads x {} iterations",
        config.threads,
        config.iterations
    );

    let runtime = Runtime::new();
    let occupancy = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let entries = Arc::new(AtomicUsize::new(0));
    let enter_failures = Arc::new(AtomicUsize::new(0));
    let guard_denials = Arc::new(AtomicUsize::new(0));
    let stale_slots = Arc::new(AtomicUsize::new(0));

    let mut workers = Vec::with_capacity(config.threads);
    for _ in 0..config.threads {
        let runtime = Arc::clone(&runtime);
        let occupancy = Arc::clone(&occupancy);
        let overlaps = Arc::clone(&overlaps);
        let entries = Arc::clone(&entries);
        let enter_failures = Arc::clone(&enter_failures);
        let guard_denials = Arc::clone(&guard_denials);
        let stale_slots = Arc::clone(&stale_slots);
        let iterations = config.iterations;
        let max_jitter_us = config.max_jitter_us;

        workers.push(thread::spawn(move || {
            let context = runtime.attach_thread();
            for _ in 0..iterations {
                runtime.execution_lock().acquire(&context);
                let handle = Handle::new(&runtime);

                let section = match BlockingSection::enter(&*handle, &context) {
                    Ok(section) => section,
                    Err(_) => {
                        enter_failures.fetch_add(1, Ordering::SeqCst);
                        runtime.execution_lock().release(&context);
                        continue;
                    }
                };

                // Suspended: the lock is free here. Pretend to block in
                // native code, then come back in as a callback would.
                if max_jitter_us > 0 {
                    thread::sleep(Duration::from_micros(fastrand::u64(0..=max_jitter_us)));
                }

                match ContextGuard::acquire(&*handle) {
                    Some(guard) => {
                        let prev = occupancy.fetch_add(1, Ordering::SeqCst);
                        if prev != 0 {
                            overlaps.fetch_add(1, Ordering::SeqCst);
                        }
                        entries.fetch_add(1, Ordering::SeqCst);
                        occupancy.fetch_sub(1, Ordering::SeqCst);
                        guard.release();
                    }
                    None => {
                        guard_denials.fetch_add(1, Ordering::SeqCst);
                    }
                }

                section.finish();
                if handle.current_context().is_some() {
                    stale_slots.fetch_add(1, Ordering::SeqCst);
                }
                runtime.execution_lock().release(&context);
            }
        }));
    }

    for worker in workers {
        if worker.join().is_err() {
            result
                .handoff_violations
                .push("handle independence worker panicked".to_string());
        }
    }

    result.entries = entries.load(Ordering::SeqCst);

    let overlap_count = overlaps.load(Ordering::SeqCst);
    if overlap_count > 0 {
        result.exclusion_violations.push(format!(
            "{} overlapping guard-held regions",
            overlap_count
        ));
    }

    let failure_count = enter_failures.load(Ordering::SeqCst);
    if failure_count > 0 {
        result.handoff_violations.push(format!(
            "{} blocking-section entries rejected on fresh handles",
            failure_count
        ));
    }

    // The slot was set for the whole section, so every guard must resolve.
    let denial_count = guard_denials.load(Ordering::SeqCst);
    if denial_count > 0 {
        result.handoff_violations.push(format!(
            "{} callback guards denied while a section was open",
            denial_count
        ));
    }

    let stale_count = stale_slots.load(Ordering::SeqCst);
    if stale_count > 0 {
        result.handoff_violations.push(format!(
            "{} context slots left set after their section finished",
            stale_count
        ));
    }

    if runtime.execution_lock().is_held() {
        result
            .handoff_violations
            .push("execution lock still held after all workers finished".to_string());
    }

    log::info!(
        "Handle independence proof complete: {} guard entries, pass={}",
        result.entries,
        result.is_pass()
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contention_config_default() {
        let config = ContentionProofConfig::default();
        assert_eq!(config.threads, 4);
        assert_eq!(config.iterations, 50);
        assert_eq!(config.category, ShareCategory::Dns);
    }

    #[test]
    fn test_contention_result_pass_logic() {
        let mut result = ContentionProofResult::new(10);
        assert!(result.is_pass());

        result.exclusion_violations.push("overlap".to_string());
        assert!(!result.is_pass());

        let mut result = ContentionProofResult::new(10);
        result.handoff_violations.push("stale".to_string());
        assert!(!result.is_pass());
    }

    #[test]
    fn test_share_contention_proof_small_run() {
        let config = ContentionProofConfig {
            threads: 2,
            iterations: 10,
            max_jitter_us: 50,
            category: ShareCategory::Cookie,
        };
        let result = run_share_contention_proof(&config);
        assert!(result.is_pass(), "violations: {:?}", result);
        assert_eq!(result.entries, 20);
    }

    #[test]
    fn test_handle_independence_proof_small_run() {
        let config = ContentionProofConfig {
            threads: 2,
            iterations: 10,
            max_jitter_us: 50,
            category: ShareCategory::Dns,
        };
        let result = run_handle_independence_proof(&config);
        assert!(result.is_pass(), "violations: {:?}", result);
        assert_eq!(result.entries, 20);
    }
}
