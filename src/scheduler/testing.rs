//! Scripted in-memory resolver for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::probe::{ProbeError, Resolver};

/// One scripted attempt: how long it takes and what it returns.
#[derive(Debug, Clone)]
pub struct Step {
    delay: Duration,
    result: Result<String, String>,
}

impl Step {
    pub fn answer(delay_ms: u64, addr: &str) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            result: Ok(format!("answer.\t60\tIN\tA\t{}\n", addr)),
        }
    }

    pub fn fail(delay_ms: u64, message: &str) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            result: Err(message.to_string()),
        }
    }
}

/// Replays a per-server script; the last step repeats once the script runs out.
/// Servers without a script panic, which exercises job isolation.
#[derive(Default)]
pub struct ScriptedResolver {
    scripts: HashMap<String, Vec<Step>>,
    cursors: Mutex<HashMap<(String, String), usize>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, server: &str, steps: Vec<Step>) -> Self {
        self.scripts.insert(server.to_string(), steps);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_step(&self, domain: &str, server: &str) -> Step {
        let steps = match self.scripts.get(server) {
            Some(steps) if !steps.is_empty() => steps,
            _ => panic!("no script for server {}", server),
        };
        let mut cursors = self.cursors.lock().unwrap();
        let cursor = cursors
            .entry((domain.to_string(), server.to_string()))
            .or_insert(0);
        let step = steps[(*cursor).min(steps.len() - 1)].clone();
        *cursor += 1;
        step
    }
}

impl Resolver for ScriptedResolver {
    async fn resolve(&self, domain: &str, server: &str) -> Result<String, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.next_step(domain, server);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(step.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        step.result.map_err(ProbeError::Command)
    }
}
