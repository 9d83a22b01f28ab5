//! Scripted generation backend for tests.
//!
//! Responses are keyed by stage name ("architect", "engineer_2", ...). Every
//! request is recorded so tests can assert what each stage was sent.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{GenerationRequest, GenerationService};
use crate::error::StageError;

#[derive(Debug, Clone)]
pub(crate) enum Script {
    /// Return this text
    Reply(String),
    /// Fail with a transport error carrying this message
    Fail(String),
    /// Sleep, then play the inner script
    Delay(Duration, Box<Script>),
    /// Never complete
    Hang,
}

#[derive(Default)]
pub(crate) struct ScriptedService {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<GenerationRequest>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(mut self, stage: &str, script: Script) -> Self {
        self.scripts.insert(stage.to_string(), script);
        self
    }

    pub(crate) fn reply(self, stage: &str, text: impl Into<String>) -> Self {
        self.on(stage, Script::Reply(text.into()))
    }

    pub(crate) fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub(crate) fn calls_for(&self, stage: &str) -> Vec<GenerationRequest> {
        self.calls()
            .into_iter()
            .filter(|c| c.stage == stage)
            .collect()
    }

    pub(crate) fn engineer_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.stage.starts_with("engineer_"))
            .count()
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn generate(&self, request: GenerationRequest) -> Result<String, StageError> {
        let stage = request.stage.clone();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let mut script = self
            .scripts
            .get(&stage)
            .cloned()
            .unwrap_or_else(|| Script::Fail(format!("no script for stage '{}'", stage)));

        loop {
            match script {
                Script::Reply(text) => return Ok(text),
                Script::Fail(message) => return Err(StageError::transport(&stage, message)),
                Script::Delay(delay, next) => {
                    tokio::time::sleep(delay).await;
                    script = *next;
                }
                Script::Hang => std::future::pending::<()>().await,
            }
        }
    }
}
