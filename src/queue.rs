//! Ordered queue of named asynchronous tasks.
//!
//! A [`TaskQueue`] runs its tasks one after another in insertion order: task
//! `i + 1` is only started after task `i` has finished. Once the last task is
//! done the completion listeners fire, exactly once. A queue never runs twice.
use std::collections::VecDeque;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::oneshot;

use crate::error::{QueueError, TaskResult};

/// Boxed future returned by a task action.
pub type TaskFuture = Pin<Box<dyn Future<Output = TaskResult> + Send + 'static>>;

type Action = Box<dyn FnOnce() -> TaskFuture + Send>;

type Listener = Box<dyn FnOnce() + Send>;

/// A single named unit of work.
pub struct Task {
    name: String,
    action: Action,
}

impl Task {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task({})", self.name)
    }
}

/// Continuation handed to callback-style actions.
///
/// Consuming it advances the queue. Dropping it without calling any of its
/// methods fails the task with [`QueueError::Abandoned`].
#[derive(Debug)]
pub struct Next(oneshot::Sender<TaskResult>);

impl Next {
    /// Signal success.
    pub fn done(self) {
        self.finish(Ok(()))
    }

    /// Signal failure, the queue stops after this task.
    pub fn fail(self, err: impl Into<anyhow::Error>) {
        self.finish(Err(err.into()))
    }

    pub fn finish(self, result: TaskResult) {
        // The receiver only goes away if the queue itself was dropped.
        let _ = self.0.send(result);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Running,
    Completed,
    Failed,
}

struct Inner {
    state: QueueState,
    tasks: VecDeque<Task>,
    listeners: Vec<Listener>,
}

pub struct TaskQueue {
    name: String,
    inner: Mutex<Inner>,
}

impl TaskQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                state: QueueState::Idle,
                tasks: VecDeque::new(),
                listeners: Vec::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Listeners and actions never run under the lock, so a poisoned
        // mutex still holds consistent data.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> QueueState {
        self.lock().state
    }

    /// Number of tasks not yet started.
    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the tasks not yet started, in execution order.
    pub fn task_names(&self) -> Vec<String> {
        self.lock().tasks.iter().map(|t| t.name.clone()).collect()
    }

    /// Append a task whose action returns a future. The action is invoked
    /// only when the task's turn comes.
    pub fn add<F, Fut>(&self, name: impl Into<String>, action: F) -> Result<&Self, QueueError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        let name = name.into();
        let mut inner = self.lock();

        if inner.state != QueueState::Idle {
            return Err(QueueError::Sealed(name));
        }

        inner.tasks.push_back(Task {
            name,
            action: Box::new(move || Box::pin(action())),
        });

        Ok(self)
    }

    /// Append a callback-style task. The action receives a [`Next`] and
    /// must consume it once its work is done, possibly from another task.
    pub fn add_with_next<F>(&self, name: impl Into<String>, action: F) -> Result<&Self, QueueError>
    where
        F: FnOnce(Next) + Send + 'static,
    {
        let name = name.into();
        let label = name.clone();

        self.add(name, move || async move {
            let (tx, rx) = oneshot::channel();
            action(Next(tx));

            match rx.await {
                Ok(result) => result,
                Err(_) => Err(QueueError::Abandoned(label).into()),
            }
        })
    }

    /// Register a listener fired once after the last task completes. When
    /// the queue has already completed the listener fires right away. A
    /// failed queue never completes, so the listener is dropped unused.
    pub fn on_complete(&self, listener: impl FnOnce() + Send + 'static) {
        let mut inner = self.lock();

        match inner.state {
            QueueState::Completed => {
                drop(inner);
                listener();
            }
            QueueState::Failed => {}
            QueueState::Idle | QueueState::Running => inner.listeners.push(Box::new(listener)),
        }
    }

    /// Run every task in order. Stops at the first failing task.
    pub async fn run(&self) -> Result<(), QueueError> {
        {
            let mut inner = self.lock();
            match inner.state {
                QueueState::Idle => inner.state = QueueState::Running,
                QueueState::Running => return Err(QueueError::AlreadyRunning),
                QueueState::Completed | QueueState::Failed => {
                    return Err(QueueError::AlreadyCompleted);
                }
            }
        }

        let s = Instant::now();

        loop {
            let next = self.lock().tasks.pop_front();
            let Some(Task { name, action }) = next else {
                break;
            };

            tracing::debug!(queue = %self.name, task = %name, "starting task");

            if let Err(source) = action().await {
                let mut inner = self.lock();
                inner.state = QueueState::Failed;
                inner.tasks.clear();
                inner.listeners.clear();

                return Err(QueueError::Task { name, source });
            }
        }

        let listeners = {
            let mut inner = self.lock();
            inner.state = QueueState::Completed;
            std::mem::take(&mut inner.listeners)
        };

        tracing::debug!(
            queue = %self.name,
            "queue completed {}",
            crate::utils::as_overhead(s)
        );

        for listener in listeners {
            listener();
        }

        Ok(())
    }
}

impl Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("TaskQueue")
            .field("name", &self.name)
            .field("state", &inner.state)
            .field("tasks", &inner.tasks)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    fn push(log: &Log, entry: impl Into<String>) {
        log.lock().unwrap().push(entry.into());
    }

    fn delayed(queue: &TaskQueue, log: &Log, name: &'static str, millis: u64) {
        let log = log.clone();
        queue
            .add_with_next(name, move |next| {
                push(&log, format!("start {name}"));
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(millis)).await;
                    push(&log, format!("done {name}"));
                    next.done();
                });
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_sequential_with_delays() {
        let log: Log = Default::default();
        let queue = TaskQueue::new("test");

        delayed(&queue, &log, "A", 30);
        delayed(&queue, &log, "B", 1);
        delayed(&queue, &log, "C", 15);

        let on_done = log.clone();
        queue.on_complete(move || push(&on_done, "complete"));

        queue.run().await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "start A", "done A", "start B", "done B", "start C", "done C", "complete"
            ]
        );
        assert_eq!(queue.state(), QueueState::Completed);
    }

    #[tokio::test]
    async fn test_empty_queue_completes_immediately() {
        let fired = Arc::new(AtomicUsize::new(0));
        let queue = TaskQueue::new("empty");

        let counter = fired.clone();
        queue.on_complete(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        queue.run().await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_completion_fires_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let queue = TaskQueue::new("once");
        queue.add("noop", || async { Ok(()) }).unwrap();

        for _ in 0..2 {
            let counter = fired.clone();
            queue.on_complete(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        queue.run().await.unwrap();
        assert!(matches!(queue.run().await, Err(QueueError::AlreadyCompleted)));
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        // late listener fires immediately
        let counter = fired.clone();
        queue.on_complete(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_reentrant_run_is_rejected() {
        let queue = Arc::new(TaskQueue::new("reentrant"));
        let seen = Arc::new(Mutex::new(None));

        let inner_queue = queue.clone();
        let inner_seen = seen.clone();
        queue
            .add("reenter", move || async move {
                let result = inner_queue.run().await;
                *inner_seen.lock().unwrap() = Some(matches!(result, Err(QueueError::AlreadyRunning)));
                Ok(())
            })
            .unwrap();

        queue.run().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_failure_stops_queue() {
        let log: Log = Default::default();
        let queue = TaskQueue::new("failing");

        let l = log.clone();
        queue
            .add("first", move || async move {
                push(&l, "first");
                Ok(())
            })
            .unwrap();
        queue
            .add("broken", || async { Err(anyhow::anyhow!("boom")) })
            .unwrap();
        let l = log.clone();
        queue
            .add("never", move || async move {
                push(&l, "never");
                Ok(())
            })
            .unwrap();

        let l = log.clone();
        queue.on_complete(move || push(&l, "complete"));

        let err = queue.run().await.unwrap_err();
        assert!(matches!(&err, QueueError::Task { name, .. } if name == "broken"));
        assert_eq!(*log.lock().unwrap(), vec!["first"]);
        assert_eq!(queue.state(), QueueState::Failed);
    }

    #[tokio::test]
    async fn test_listener_on_failed_queue_is_dropped() {
        let queue = TaskQueue::new("failed");
        queue
            .add("broken", || async { Err(anyhow::anyhow!("boom")) })
            .unwrap();
        queue.run().await.unwrap_err();

        let log: Log = Default::default();
        let l = log.clone();
        queue.on_complete(move || push(&l, "complete"));

        assert!(log.lock().unwrap().is_empty());
        // the listener, and its clone of the log, are gone
        assert_eq!(Arc::strong_count(&log), 1);
    }

    #[tokio::test]
    async fn test_abandoned_continuation() {
        let queue = TaskQueue::new("abandon");
        queue.add_with_next("dropper", drop).unwrap();

        let err = queue.run().await.unwrap_err();
        let QueueError::Task { name, source } = err else {
            panic!("expected task error");
        };
        assert_eq!(name, "dropper");
        assert!(matches!(
            source.downcast_ref::<QueueError>(),
            Some(QueueError::Abandoned(_))
        ));
    }

    #[tokio::test]
    async fn test_continuation_error_passes_through() {
        let queue = TaskQueue::new("fail-next");
        queue
            .add_with_next("io", |next| {
                next.fail(std::io::Error::other("disk full"))
            })
            .unwrap();

        let err = queue.run().await.unwrap_err();
        let QueueError::Task { source, .. } = err else {
            panic!("expected task error");
        };
        assert!(source.downcast_ref::<std::io::Error>().is_some());
    }

    #[tokio::test]
    async fn test_nested_queue() {
        let log: Log = Default::default();
        let root = TaskQueue::new("root");

        let l = log.clone();
        root.add("outer", move || async move {
            let child = TaskQueue::new("child");
            for i in 0..3 {
                let l = l.clone();
                child.add(format!("child {i}"), move || async move {
                    push(&l, format!("child {i}"));
                    Ok(())
                })?;
            }
            child.run().await?;
            push(&l, "outer done");
            Ok(())
        })
        .unwrap();

        let l = log.clone();
        root.add("after", move || async move {
            push(&l, "after");
            Ok(())
        })
        .unwrap();

        root.run().await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["child 0", "child 1", "child 2", "outer done", "after"]
        );
    }

    #[tokio::test]
    async fn test_add_after_start_is_sealed() {
        let queue = TaskQueue::new("sealed");
        queue.run().await.unwrap();
        let err = queue.add("late", || async { Ok(()) }).unwrap_err();
        assert!(matches!(err, QueueError::Sealed(name) if name == "late"));
    }

    #[test]
    fn test_task_names_keep_insertion_order() {
        let queue = TaskQueue::new("names");
        queue.add("a", || async { Ok(()) }).unwrap();
        queue.add("b", || async { Ok(()) }).unwrap();
        queue.add("a", || async { Ok(()) }).unwrap();
        assert_eq!(queue.task_names(), vec!["a", "b", "a"]);
        assert_eq!(queue.len(), 3);
    }
}
