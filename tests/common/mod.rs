//! Shared test transports.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use conduit::{Transport, TransportError, TransportRequest, TransportResponse};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// One scripted transport outcome.
#[derive(Debug, Clone)]
pub enum Step {
    /// Answer with a status and JSON body.
    Reply(u16, &'static str),
    /// Fail at the transport level.
    Fail(TransportError),
    /// Wait before answering with a status and body.
    Hang(Duration, u16, &'static str),
}

/// Transport replaying a script; the last step repeats once the script runs out.
#[derive(Clone)]
pub struct ScriptedTransport {
    steps: Arc<Mutex<Vec<Step>>>,
    calls: Arc<Mutex<Vec<(Instant, TransportRequest)>>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Self {
        assert!(!steps.is_empty());
        Self {
            steps: Arc::new(Mutex::new(steps)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn always(status: u16, body: &'static str) -> Self {
        Self::new(vec![Step::Reply(status, body)])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.calls.lock().iter().map(|(_, r)| r.clone()).collect()
    }

    /// Gaps between consecutive calls.
    pub fn gaps(&self) -> Vec<Duration> {
        let calls = self.calls.lock();
        calls
            .windows(2)
            .map(|pair| pair[1].0.duration_since(pair[0].0))
            .collect()
    }

    fn next_step(&self) -> Step {
        let mut steps = self.steps.lock();
        if steps.len() > 1 {
            steps.remove(0)
        } else {
            steps[0].clone()
        }
    }
}

fn reply(status: u16, body: &'static str) -> TransportResponse {
    TransportResponse {
        status,
        headers: HashMap::from([("content-type".to_string(), "application/json".to_string())]),
        body: Bytes::from_static(body.as_bytes()),
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn perform(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.lock().push((Instant::now(), request));

        match self.next_step() {
            Step::Reply(status, body) => Ok(reply(status, body)),
            Step::Fail(error) => Err(error),
            Step::Hang(delay, status, body) => {
                tokio::time::sleep(delay).await;
                Ok(reply(status, body))
            }
        }
    }
}

/// Shared log of middleware markers.
pub type Trace = Arc<Mutex<Vec<String>>>;

pub fn trace() -> Trace {
    Arc::new(Mutex::new(Vec::new()))
}
