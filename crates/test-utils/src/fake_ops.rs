#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use loadgraph::{AttemptContext, Task, TaskBuilder};
use tokio::time::Instant;

/// What a fake operation does on each attempt.
#[derive(Debug, Clone, Copy)]
pub enum Behaviour {
    /// Wait `latency`, then succeed.
    Succeed { latency: Duration },
    /// Fail the first `times` attempts, then succeed. Every attempt waits
    /// `latency` first.
    FailTimes { times: u32, latency: Duration },
    /// Wait `latency`, then fail.
    AlwaysFail { latency: Duration },
    /// Never finish on its own; only a timeout or abort ends it.
    Hang,
    /// Wait for the run's cancellation token, then fail.
    HangUntilCancelled,
    /// Panic inside the operation.
    Panic,
}

/// One thing a fake operation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpEvent {
    Started { task: String, attempt: u32 },
    Succeeded { task: String, attempt: u32 },
    Failed { task: String, attempt: u32 },
}

#[derive(Debug, Default)]
struct RecorderState {
    events: Vec<OpEvent>,
    attempt_starts: HashMap<String, Vec<Instant>>,
    active: usize,
    max_active: usize,
}

/// Builds instrumented fake tasks and records what their operations did.
///
/// Values produced by successful attempts look like `"<id>@<attempt>"`.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    inner: Arc<Mutex<RecorderState>>,
}

/// Decrements the active-operation count when the operation ends, including
/// when it is aborted.
struct ActiveGuard {
    inner: Arc<Mutex<RecorderState>>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let mut state = self.inner.lock().unwrap();
        state.active -= 1;
    }
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a task whose operation follows `behaviour`.
    pub fn task(&self, builder: TaskBuilder, behaviour: Behaviour) -> Task<String> {
        let recorder = self.clone();
        let id = builder.id().to_string();

        builder.build(move |ctx: AttemptContext| {
            let recorder = recorder.clone();
            let id = id.clone();
            async move {
                let _active = recorder.enter(&id, ctx.attempt);
                let attempt = ctx.attempt;

                let result = match behaviour {
                    Behaviour::Succeed { latency } => {
                        tokio::time::sleep(latency).await;
                        Ok(format!("{id}@{attempt}"))
                    }
                    Behaviour::FailTimes { times, latency } => {
                        tokio::time::sleep(latency).await;
                        if attempt <= times {
                            Err(anyhow!("{id} failed on attempt {attempt}"))
                        } else {
                            Ok(format!("{id}@{attempt}"))
                        }
                    }
                    Behaviour::AlwaysFail { latency } => {
                        tokio::time::sleep(latency).await;
                        Err(anyhow!("{id} failed on attempt {attempt}"))
                    }
                    Behaviour::Hang => {
                        std::future::pending::<()>().await;
                        Err(anyhow!("{id} stopped hanging"))
                    }
                    Behaviour::HangUntilCancelled => {
                        ctx.cancel.cancelled().await;
                        Err(anyhow!("{id} observed cancellation"))
                    }
                    Behaviour::Panic => panic!("{id} exploded"),
                };

                recorder.finish(&id, attempt, result.is_ok());
                result
            }
        })
    }

    pub fn succeed(&self, builder: TaskBuilder, latency: Duration) -> Task<String> {
        self.task(builder, Behaviour::Succeed { latency })
    }

    pub fn fail_times(&self, builder: TaskBuilder, times: u32, latency: Duration) -> Task<String> {
        self.task(builder, Behaviour::FailTimes { times, latency })
    }

    pub fn always_fail(&self, builder: TaskBuilder, latency: Duration) -> Task<String> {
        self.task(builder, Behaviour::AlwaysFail { latency })
    }

    pub fn hang(&self, builder: TaskBuilder) -> Task<String> {
        self.task(builder, Behaviour::Hang)
    }

    pub fn hang_until_cancelled(&self, builder: TaskBuilder) -> Task<String> {
        self.task(builder, Behaviour::HangUntilCancelled)
    }

    pub fn panic(&self, builder: TaskBuilder) -> Task<String> {
        self.task(builder, Behaviour::Panic)
    }

    /// Everything the operations did, in order.
    pub fn events(&self) -> Vec<OpEvent> {
        self.inner.lock().unwrap().events.clone()
    }

    /// Number of times the operation of `task` was invoked.
    pub fn calls(&self, task: &str) -> u32 {
        self.inner
            .lock()
            .unwrap()
            .attempt_starts
            .get(task)
            .map_or(0, |starts| starts.len() as u32)
    }

    pub fn was_invoked(&self, task: &str) -> bool {
        self.calls(task) > 0
    }

    /// Ids in the order their first attempt started.
    pub fn start_order(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                OpEvent::Started { task, attempt: 1 } => Some(task),
                _ => None,
            })
            .collect()
    }

    /// Instants at which each attempt of `task` started.
    pub fn attempt_starts(&self, task: &str) -> Vec<Instant> {
        self.inner
            .lock()
            .unwrap()
            .attempt_starts
            .get(task)
            .cloned()
            .unwrap_or_default()
    }

    /// Highest number of operations that were executing at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.inner.lock().unwrap().max_active
    }

    /// Position of an event in the timeline, if it happened.
    pub fn position(&self, event: &OpEvent) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    fn enter(&self, task: &str, attempt: u32) -> ActiveGuard {
        let mut state = self.inner.lock().unwrap();
        state.events.push(OpEvent::Started {
            task: task.to_string(),
            attempt,
        });
        state
            .attempt_starts
            .entry(task.to_string())
            .or_default()
            .push(Instant::now());
        state.active += 1;
        state.max_active = state.max_active.max(state.active);
        ActiveGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    fn finish(&self, task: &str, attempt: u32, ok: bool) {
        let task = task.to_string();
        let event = if ok {
            OpEvent::Succeeded { task, attempt }
        } else {
            OpEvent::Failed { task, attempt }
        };
        self.inner.lock().unwrap().events.push(event);
    }
}
