//! Test doubles for the agent and store traits

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sysadm_core::config::AgentConfig;
use sysadm_core::{
    AgentEndpoint, AgentTransport, CommandHistoryRecord, CommandLogRecord, CommandRecord,
    CommandStatusCode, CommandStatusUpdate, CommandStore, CommandTransaction, DispatchError,
    DispatchResult, DispatchTarget, NewCommand, NewHost, StatusHistoryEntry,
};

/// A request the scripted transport received
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub host_id: i64,
    pub url: String,
    pub endpoint: AgentEndpoint,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Default)]
struct Script {
    queued: HashMap<AgentEndpoint, VecDeque<DispatchResult<Vec<u8>>>>,
    fallback: HashMap<AgentEndpoint, Vec<u8>>,
    requests: Vec<RecordedRequest>,
}

/// Replays queued replies per endpoint.
///
/// Queued replies are consumed first, then the endpoint's fallback reply if one
/// was set. Without either the call fails like an unreachable agent.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw reply body
    pub fn reply_raw(&self, endpoint: AgentEndpoint, body: impl Into<Vec<u8>>) -> &Self {
        self.script
            .lock()
            .unwrap()
            .queued
            .entry(endpoint)
            .or_default()
            .push_back(Ok(body.into()));
        self
    }

    /// Queue a reply serialized without validation, so malformed replies can be scripted
    pub fn reply<T: Serialize>(&self, endpoint: AgentEndpoint, message: &T) -> &Self {
        self.reply_raw(endpoint, serde_json::to_vec(message).unwrap())
    }

    /// Queue a failure
    pub fn fail(&self, endpoint: AgentEndpoint, error: DispatchError) -> &Self {
        self.script
            .lock()
            .unwrap()
            .queued
            .entry(endpoint)
            .or_default()
            .push_back(Err(error));
        self
    }

    /// Reply used once the queue for this endpoint is empty
    pub fn always<T: Serialize>(&self, endpoint: AgentEndpoint, message: &T) -> &Self {
        self.script
            .lock()
            .unwrap()
            .fallback
            .insert(endpoint, serde_json::to_vec(message).unwrap());
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, endpoint: AgentEndpoint) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.endpoint == endpoint)
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.script.lock().unwrap().requests.len()
    }
}

#[async_trait]
impl AgentTransport for ScriptedTransport {
    async fn send_request(
        &self,
        target: &DispatchTarget,
        endpoint: AgentEndpoint,
        body: Vec<u8>,
    ) -> DispatchResult<Vec<u8>> {
        let mut script = self.script.lock().unwrap();
        script.requests.push(RecordedRequest {
            host_id: target.host_id,
            url: target.url_for(endpoint),
            endpoint,
            body,
        });

        if let Some(reply) = script.queued.get_mut(&endpoint).and_then(VecDeque::pop_front) {
            return reply;
        }
        if let Some(body) = script.fallback.get(&endpoint) {
            return Ok(body.clone());
        }
        Err(DispatchError::Network(format!(
            "can not connect to agent {}: connection refused",
            target.agent_addr()
        )))
    }
}

/// Wraps a store so that every transaction fails on its `fail_on`-th log append.
///
/// Everything else is delegated, so a failed batch can be checked against the
/// wrapped store afterwards.
pub struct FailingLogStore {
    inner: Arc<dyn CommandStore>,
    fail_on: usize,
}

impl FailingLogStore {
    pub fn new(inner: Arc<dyn CommandStore>, fail_on: usize) -> Self {
        Self { inner, fail_on }
    }
}

#[async_trait]
impl CommandStore for FailingLogStore {
    async fn begin(&self) -> DispatchResult<Box<dyn CommandTransaction>> {
        Ok(Box::new(FailingLogTransaction {
            inner: self.inner.begin().await?,
            appended: 0,
            fail_on: self.fail_on,
        }))
    }

    async fn list_candidates(
        &self,
        statuses: &[CommandStatusCode],
        max_try_times: Option<i64>,
    ) -> DispatchResult<Vec<CommandRecord>> {
        self.inner.list_candidates(statuses, max_try_times).await
    }

    async fn resolve_target(
        &self,
        host_id: i64,
        defaults: &AgentConfig,
    ) -> DispatchResult<DispatchTarget> {
        self.inner.resolve_target(host_id, defaults).await
    }

    async fn command_parameters(&self, command_id: i64) -> DispatchResult<BTreeMap<String, String>> {
        self.inner.command_parameters(command_id).await
    }

    async fn find_command(&self, id: i64) -> DispatchResult<Option<CommandRecord>> {
        self.inner.find_command(id).await
    }

    async fn history_of(&self, command_id: i64) -> DispatchResult<Vec<CommandHistoryRecord>> {
        self.inner.history_of(command_id).await
    }

    async fn status_history_of(&self, command_id: i64) -> DispatchResult<Vec<StatusHistoryEntry>> {
        self.inner.status_history_of(command_id).await
    }

    async fn logs_of(&self, command_id: i64) -> DispatchResult<Vec<CommandLogRecord>> {
        self.inner.logs_of(command_id).await
    }

    async fn create_host(&self, host: &NewHost) -> DispatchResult<i64> {
        self.inner.create_host(host).await
    }

    async fn create_command(&self, command: NewCommand) -> DispatchResult<i64> {
        self.inner.create_command(command).await
    }
}

struct FailingLogTransaction {
    inner: Box<dyn CommandTransaction>,
    appended: usize,
    fail_on: usize,
}

#[async_trait]
impl CommandTransaction for FailingLogTransaction {
    async fn get_command(&mut self, id: i64) -> DispatchResult<Option<CommandRecord>> {
        self.inner.get_command(id).await
    }

    async fn update_status(&mut self, id: i64, update: &CommandStatusUpdate) -> DispatchResult<u64> {
        self.inner.update_status(id, update).await
    }

    async fn archive_command(
        &mut self,
        record: &CommandRecord,
        status: CommandStatusCode,
        status_msg: &str,
    ) -> DispatchResult<()> {
        self.inner.archive_command(record, status, status_msg).await
    }

    async fn overtime_commands(
        &mut self,
        sent_before: DateTime<Utc>,
    ) -> DispatchResult<Vec<CommandRecord>> {
        self.inner.overtime_commands(sent_before).await
    }

    async fn append_status_history(&mut self, entry: &StatusHistoryEntry) -> DispatchResult<()> {
        self.inner.append_status_history(entry).await
    }

    async fn append_log(&mut self, entry: &CommandLogRecord) -> DispatchResult<()> {
        self.appended += 1;
        if self.appended == self.fail_on {
            return Err(DispatchError::Internal(format!(
                "log {} rejected by test store",
                entry.log_seq
            )));
        }
        self.inner.append_log(entry).await
    }

    async fn commit(self: Box<Self>) -> DispatchResult<()> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> DispatchResult<()> {
        self.inner.rollback().await
    }
}
