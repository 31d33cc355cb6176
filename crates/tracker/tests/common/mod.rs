//! Shared test helpers: a scripted in-memory [`JobService`].

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cmdwatch_core::{CommandResponse, CommandResult, CorrelationId};
use cmdwatch_tracker::{JobService, JobServiceError};
use serde_json::Value;
use tokio::sync::Semaphore;

/// One scripted answer to a poll.
pub enum Step {
    Respond(CommandResponse),
    /// Transport failure with the given HTTP status.
    Fail(u16),
}

/// A [`JobService`] whose answers are queued up front.
///
/// Polls for an id whose script is exhausted report the command as still
/// pending. With a gate installed, every poll is recorded and then blocks
/// until the test releases a permit.
#[derive(Default)]
pub struct ScriptedService {
    launches: Mutex<VecDeque<Result<CommandResponse, u16>>>,
    polls: Mutex<HashMap<CorrelationId, VecDeque<Step>>>,
    poll_calls: Mutex<Vec<CorrelationId>>,
    launch_calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every poll until a permit is added to the returned semaphore.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let service = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::default()
        };
        (service, gate)
    }

    pub fn on_launch(&self, answer: Result<CommandResponse, u16>) -> &Self {
        self.launches.lock().unwrap().push_back(answer);
        self
    }

    pub fn on_poll(&self, id: &str, step: Step) -> &Self {
        self.polls
            .lock()
            .unwrap()
            .entry(id.into())
            .or_default()
            .push_back(step);
        self
    }

    pub fn poll_count(&self) -> usize {
        self.poll_calls.lock().unwrap().len()
    }

    pub fn polls_for(&self, id: &str) -> usize {
        self.poll_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == id)
            .count()
    }

    pub fn launch_count(&self) -> usize {
        self.launch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobService for ScriptedService {
    async fn launch(&self, _path: &str, _body: &Value) -> Result<CommandResponse, JobServiceError> {
        self.launch_calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.launches.lock().unwrap().pop_front();
        match answer {
            Some(Ok(response)) => Ok(response),
            Some(Err(status)) => Err(unavailable(status)),
            None => panic!("unexpected launch"),
        }
    }

    async fn poll(&self, id: &CorrelationId) -> Result<CommandResponse, JobServiceError> {
        self.poll_calls.lock().unwrap().push(id.clone());

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        let step = self
            .polls
            .lock()
            .unwrap()
            .get_mut(id)
            .and_then(VecDeque::pop_front);
        match step {
            Some(Step::Respond(response)) => Ok(response),
            Some(Step::Fail(status)) => Err(unavailable(status)),
            None => Ok(pending(id.as_str())),
        }
    }
}

fn unavailable(status: u16) -> JobServiceError {
    JobServiceError::ApiError {
        status,
        body: "service unavailable".into(),
    }
}

pub fn pending(id: &str) -> CommandResponse {
    CommandResponse::ok(CommandResult {
        id: id.into(),
        is_done: false,
        failed: false,
        results: vec![],
    })
}

pub fn succeeded(id: &str, results: Vec<Value>) -> CommandResponse {
    CommandResponse::ok(CommandResult {
        id: id.into(),
        is_done: true,
        failed: false,
        results,
    })
}

pub fn failed(id: &str, results: Vec<Value>) -> CommandResponse {
    CommandResponse::ok(CommandResult {
        id: id.into(),
        is_done: true,
        failed: true,
        results,
    })
}

/// Records every callback invocation.
#[derive(Clone, Default)]
pub struct CallbackLog {
    successes: Arc<Mutex<Vec<CommandResponse>>>,
    failures: Arc<Mutex<Vec<CommandResponse>>>,
}

impl CallbackLog {
    pub fn on_success(&self) -> impl FnOnce(CommandResponse) + Send + 'static {
        let log = Arc::clone(&self.successes);
        move |response| log.lock().unwrap().push(response)
    }

    pub fn on_failure(&self) -> impl FnOnce(CommandResponse) + Send + 'static {
        let log = Arc::clone(&self.failures);
        move |response| log.lock().unwrap().push(response)
    }

    pub fn successes(&self) -> Vec<CommandResponse> {
        self.successes.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<CommandResponse> {
        self.failures.lock().unwrap().clone()
    }

    pub fn total(&self) -> usize {
        self.successes.lock().unwrap().len() + self.failures.lock().unwrap().len()
    }
}
