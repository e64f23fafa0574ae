//! Background work with cancellation and supersede semantics.
//!
//! Each task runs on its own thread and reports back over an `mpsc`
//! channel. Tasks are keyed by name: spawning under a name that already has
//! a running task cancels the older one, and completions from superseded
//! generations are dropped in [`TaskSupervisor::drain_completed`]. Results
//! are only ever applied on the thread that owns the supervisor. A task that
//! panics completes with a [`TaskFailure`] instead of an output.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct TaskHandle {
    generation: u64,
    token: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub reason: String,
}

impl TaskFailure {
    fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "task panicked".to_string());
        Self { reason }
    }
}

#[derive(Debug)]
pub struct Completion<T> {
    pub name: String,
    pub generation: u64,
    pub output: Result<T, TaskFailure>,
}

pub struct TaskSupervisor<T> {
    sender: Sender<Completion<T>>,
    receiver: Receiver<Completion<T>>,
    running: HashMap<String, TaskHandle>,
    next_generation: u64,
}

impl<T: Send + 'static> Default for TaskSupervisor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> TaskSupervisor<T> {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            running: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Start `work` under `name`, cancelling any task already running under
    /// that name. `work` should check the token at convenient points; its
    /// output is not reported once the token is cancelled.
    pub fn spawn<F>(&mut self, name: &str, work: F) -> u64
    where
        F: FnOnce(&CancellationToken) -> T + Send + 'static,
    {
        if let Some(previous) = self.running.remove(name) {
            previous.token.cancel();
            tracing::debug!(task = name, generation = previous.generation, "task superseded");
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let tx = self.sender.clone();
        let task_name = name.to_string();

        let thread = thread::spawn(move || {
            let output = panic::catch_unwind(AssertUnwindSafe(|| work(&worker_token)))
                .map_err(|payload| TaskFailure::from_panic(payload.as_ref()));
            if worker_token.is_cancelled() {
                return;
            }
            // The receiver only goes away with the supervisor.
            let _ = tx.send(Completion {
                name: task_name,
                generation,
                output,
            });
        });

        self.running.insert(
            name.to_string(),
            TaskHandle {
                generation,
                token,
                thread: Some(thread),
            },
        );
        generation
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.running.contains_key(name)
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn cancel(&mut self, name: &str) -> bool {
        match self.running.remove(name) {
            Some(handle) => {
                handle.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Completions of current generations, oldest first. Stale completions
    /// are discarded.
    pub fn drain_completed(&mut self) -> Vec<Completion<T>> {
        let mut done = Vec::new();
        while let Ok(completion) = self.receiver.try_recv() {
            let current = self
                .running
                .get(&completion.name)
                .is_some_and(|h| h.generation == completion.generation);
            if current {
                self.running.remove(&completion.name);
                done.push(completion);
            } else {
                tracing::debug!(
                    task = %completion.name,
                    generation = completion.generation,
                    "stale completion discarded"
                );
            }
        }
        done
    }

    /// Block until every running task's thread has finished. Completions
    /// stay queued for [`TaskSupervisor::drain_completed`]; a thread that
    /// died without reporting queues a failed completion.
    pub fn wait_idle(&mut self) {
        for (name, handle) in self.running.iter_mut() {
            let Some(thread) = handle.thread.take() else {
                continue;
            };
            if let Err(payload) = thread.join() {
                let failure = TaskFailure::from_panic(payload.as_ref());
                tracing::error!(
                    task = %name,
                    generation = handle.generation,
                    reason = %failure.reason,
                    "background task panicked"
                );
                let _ = self.sender.send(Completion {
                    name: name.clone(),
                    generation: handle.generation,
                    output: Err(failure),
                });
            }
        }
    }
}

impl<T> TaskSupervisor<T> {
    pub fn cancel_all(&mut self) {
        for (_, handle) in self.running.drain() {
            handle.token.cancel();
        }
    }
}

impl<T> Drop for TaskSupervisor<T> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::time::Duration;

    #[test]
    fn completion_is_delivered_once() {
        let mut supervisor = TaskSupervisor::new();
        supervisor.spawn("sum", |_| 2 + 2);
        supervisor.wait_idle();
        let done = supervisor.drain_completed();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].output, Ok(4));
        assert!(!supervisor.is_running("sum"));
        assert!(supervisor.drain_completed().is_empty());
    }

    #[test]
    fn newer_task_supersedes_older() {
        let mut supervisor = TaskSupervisor::new();
        let (release_tx, release_rx) = channel::<()>();

        let first = supervisor.spawn("load", move |_| {
            release_rx.recv_timeout(Duration::from_secs(5)).ok();
            "old"
        });
        let second = supervisor.spawn("load", |_| "new");
        assert!(second > first);

        release_tx.send(()).ok();
        supervisor.wait_idle();
        // The superseded thread may still be finishing; give it a moment.
        thread::sleep(Duration::from_millis(50));

        let done = supervisor.drain_completed();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].output, Ok("new"));
        assert_eq!(done[0].generation, second);
    }

    #[test]
    fn cancelled_task_reports_nothing() {
        let mut supervisor = TaskSupervisor::new();
        let (started_tx, started_rx) = channel::<CancellationToken>();
        supervisor.spawn("slow", move |token| {
            started_tx.send(token.clone()).ok();
            while !token.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            1
        });
        let token = started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(supervisor.cancel("slow"));
        assert!(token.is_cancelled());
        thread::sleep(Duration::from_millis(20));
        assert!(supervisor.drain_completed().is_empty());
        assert!(!supervisor.cancel("slow"));
    }

    #[test]
    fn independent_names_run_side_by_side() {
        let mut supervisor = TaskSupervisor::new();
        supervisor.spawn("a", |_| 1);
        supervisor.spawn("b", |_| 2);
        assert_eq!(supervisor.running_count(), 2);
        supervisor.wait_idle();
        let mut outputs: Vec<i32> = supervisor
            .drain_completed()
            .into_iter()
            .map(|c| c.output.unwrap())
            .collect();
        outputs.sort();
        assert_eq!(outputs, vec![1, 2]);
    }

    #[test]
    fn panicking_task_completes_with_failure() {
        let mut supervisor: TaskSupervisor<i32> = TaskSupervisor::new();
        supervisor.spawn("boom", |_| panic!("feed closed"));
        supervisor.wait_idle();
        assert!(supervisor.is_running("boom"));

        let done = supervisor.drain_completed();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].name, "boom");
        assert_eq!(
            done[0].output,
            Err(TaskFailure {
                reason: "feed closed".to_string()
            })
        );
        assert!(!supervisor.is_running("boom"));
    }

    #[test]
    fn cancel_all_clears_running() {
        let mut supervisor = TaskSupervisor::new();
        supervisor.spawn("a", |token: &CancellationToken| {
            while !token.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            1
        });
        supervisor.spawn("b", |_| 2);
        supervisor.cancel_all();
        assert_eq!(supervisor.running_count(), 0);
        thread::sleep(Duration::from_millis(20));
        assert!(supervisor.drain_completed().is_empty());
    }
}
