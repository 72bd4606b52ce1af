//! In-process [`DataServer`] for tests
//!
//! Records every call and answers with programmed responses, or empty
//! not-ready ones when nothing was programmed.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::data_server::DataServer;
use crate::error::QueryError;
use crate::health::HealthPillEvent;
use crate::lookup::{LookupRequest, LookupResponse};

/// A call received by a [`FakeDataServer`]
#[derive(Debug, Clone, PartialEq)]
pub enum FakeCall {
    Lookup(LookupRequest),
    HealthPills {
        run: String,
        node_names: Vec<String>,
        step: Option<i64>,
    },
}

#[derive(Debug, Default)]
pub struct FakeDataServer {
    responses: Mutex<HashMap<(String, String), LookupResponse>>,
    health_pills: Mutex<BTreeMap<String, Vec<HealthPillEvent>>>,
    calls: Mutex<Vec<FakeCall>>,
}

impl FakeDataServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer lookups of `response.run` / `response.tag` with `response`
    pub fn respond_with(&self, response: LookupResponse) {
        self.responses
            .lock()
            .insert((response.run.clone(), response.tag.clone()), response);
    }

    /// Serve `events` for `node_name` from every health pill request
    pub fn respond_with_health_pills(
        &self,
        node_name: impl Into<String>,
        events: Vec<HealthPillEvent>,
    ) {
        self.health_pills.lock().insert(node_name.into(), events);
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock().clone()
    }

    pub fn lookup_requests(&self) -> Vec<LookupRequest> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                FakeCall::Lookup(request) => Some(request.clone()),
                FakeCall::HealthPills { .. } => None,
            })
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl DataServer for FakeDataServer {
    async fn lookup(&self, request: &LookupRequest) -> Result<LookupResponse, QueryError> {
        self.calls.lock().push(FakeCall::Lookup(request.clone()));
        request.validate()?;

        let key = (request.run.clone(), request.tag.clone());
        Ok(self
            .responses
            .lock()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| LookupResponse::not_ready(request)))
    }

    async fn health_pills(
        &self,
        run: &str,
        node_names: &[String],
        step: Option<i64>,
    ) -> Result<BTreeMap<String, Vec<HealthPillEvent>>, QueryError> {
        self.calls.lock().push(FakeCall::HealthPills {
            run: run.to_string(),
            node_names: node_names.to_vec(),
            step,
        });

        let programmed = self.health_pills.lock();
        Ok(node_names
            .iter()
            .filter_map(|name| {
                let events: Vec<_> = programmed
                    .get(name)?
                    .iter()
                    .filter(|event| step.is_none_or(|s| event.step == s))
                    .cloned()
                    .collect();
                (!events.is_empty()).then(|| (name.clone(), events))
            })
            .collect())
    }
}
