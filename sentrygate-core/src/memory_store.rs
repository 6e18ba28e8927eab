// sentrygate-core/src/memory_store.rs
// ============================================================================
// Module: In-Memory Coordination Store
// Description: Single-process CoordinationStore implementation backed by
// a Mutex-guarded HashMap.
// Purpose: Let tests and single-instance deployments run without Redis.
// Dependencies: async-trait
// ============================================================================

//! ## Overview
//! This is not a production substitute for the Redis-backed store: it has
//! no cross-process visibility and no persistence. It exists so unit and
//! integration tests can exercise the governor, escalation, and queue
//! crates without a live Redis instance, matching the teacher's own
//! `InMemoryRunStateStore` pattern for its control-plane store. Pending
//! (read-but-unacked) stream entries are tracked so
//! [`CoordinationStore::claim_pending`] has something real to reclaim,
//! mirroring a Redis consumer group's pending-entries list closely enough
//! for the worker pool's redelivery path to be exercised in tests.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::identifiers::AuditId;
use crate::core::identifiers::RequestId;
use crate::core::identifiers::UserId;
use crate::core::model::ResponseMessage;
use crate::core::model::StaminaHeatState;
use crate::core::model::StreamMessage;
use crate::interfaces::CoordinationStore;
use crate::interfaces::CoordinationStoreError;

#[derive(Default)]
struct Inner {
    stamina_heat: HashMap<UserId, StaminaHeatState>,
    suspensions: HashMap<UserId, String>,
    misuse_events: HashMap<UserId, VecDeque<f64>>,
    blocklist: std::collections::HashSet<String>,
    dynamic_rules: HashMap<String, String>,
    stream: VecDeque<(String, StreamMessage)>,
    pending: HashMap<String, (StreamMessage, f64)>,
    responses: HashMap<RequestId, ResponseMessage>,
    audit_stream_len: u64,
    next_entry_id: u64,
}

/// Single-process, in-memory [`CoordinationStore`].
#[derive(Default)]
pub struct InMemoryCoordinationStore {
    inner: Mutex<Inner>,
}

impl InMemoryCoordinationStore {
    /// Builds an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CoordinationStore for InMemoryCoordinationStore {
    async fn update_stamina_heat(
        &self,
        user_id: &UserId,
        f: Box<dyn FnOnce(StaminaHeatState) -> StaminaHeatState + Send>,
    ) -> Result<StaminaHeatState, CoordinationStoreError> {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let mut inner = self.inner.lock().unwrap();
        let current = inner.stamina_heat.get(user_id).copied().unwrap_or(StaminaHeatState {
            stamina: 0.0,
            heat: 0.0,
            consecutive_safe: 0,
            last_check: 0.0,
            risk_score: 0.0,
            capacity_scale: 1.0,
        });
        let next = f(current);
        inner.stamina_heat.insert(user_id.clone(), next);
        Ok(next)
    }

    async fn is_suspended(&self, user_id: &UserId) -> Result<Option<String>, CoordinationStoreError> {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let inner = self.inner.lock().unwrap();
        Ok(inner.suspensions.get(user_id).cloned())
    }

    async fn suspend_user(
        &self,
        user_id: &UserId,
        reason: &str,
        audit_id: &AuditId,
        _ttl_seconds: u64,
    ) -> Result<(), CoordinationStoreError> {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let mut inner = self.inner.lock().unwrap();
        inner
            .suspensions
            .insert(user_id.clone(), format!("{reason}:{audit_id}"));
        Ok(())
    }

    async fn record_misuse_event(
        &self,
        user_id: &UserId,
        window_seconds: u64,
    ) -> Result<u64, CoordinationStoreError> {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let mut inner = self.inner.lock().unwrap();
        let now = now_seconds();
        let entry = inner.misuse_events.entry(user_id.clone()).or_default();
        entry.push_back(now);
        while let Some(front) = entry.front() {
            if *front <= now - window_seconds as f64 {
                entry.pop_front();
            } else {
                break;
            }
        }
        Ok(entry.len() as u64)
    }

    async fn blocklist_contains(&self, text_lower: &str) -> Result<bool, CoordinationStoreError> {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let inner = self.inner.lock().unwrap();
        Ok(inner.blocklist.contains(text_lower))
    }

    async fn blocklist_add(&self, text_lower: &str) -> Result<(), CoordinationStoreError> {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let mut inner = self.inner.lock().unwrap();
        inner.blocklist.insert(text_lower.to_string());
        Ok(())
    }

    async fn dynamic_rules(&self) -> Result<Vec<String>, CoordinationStoreError> {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let inner = self.inner.lock().unwrap();
        Ok(inner.dynamic_rules.values().cloned().collect())
    }

    async fn dynamic_rule_add(&self, rule_json: &str) -> Result<(), CoordinationStoreError> {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let mut inner = self.inner.lock().unwrap();
        let key: String = serde_json::from_str::<serde_json::Value>(rule_json)
            .ok()
            .and_then(|v| v.get("id").and_then(|id| id.as_str().map(str::to_string)))
            .unwrap_or_else(|| rule_json.to_string());
        inner.dynamic_rules.insert(key, rule_json.to_string());
        Ok(())
    }

    async fn publish(&self, message: StreamMessage) -> Result<(), CoordinationStoreError> {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_entry_id;
        inner.next_entry_id += 1;
        inner.stream.push_back((id.to_string(), message));
        Ok(())
    }

    async fn read_stream(
        &self,
        _consumer_group: &str,
        _consumer_name: &str,
        count: usize,
        _block_ms: u64,
    ) -> Result<Vec<(String, StreamMessage)>, CoordinationStoreError> {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let mut inner = self.inner.lock().unwrap();
        let now = now_seconds();
        let mut out = Vec::new();
        for _ in 0..count {
            let Some((id, message)) = inner.stream.pop_front() else {
                break;
            };
            inner.pending.insert(id.clone(), (message.clone(), now));
            out.push((id, message));
        }
        Ok(out)
    }

    async fn ack(&self, _consumer_group: &str, entry_id: &str) -> Result<(), CoordinationStoreError> {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let mut inner = self.inner.lock().unwrap();
        inner.pending.remove(entry_id);
        Ok(())
    }

    async fn claim_pending(
        &self,
        _consumer_group: &str,
        _new_consumer: &str,
        min_idle_ms: u64,
    ) -> Result<Vec<(String, StreamMessage)>, CoordinationStoreError> {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let mut inner = self.inner.lock().unwrap();
        let now = now_seconds();
        let min_idle = min_idle_ms as f64 / 1000.0;
        let stale: Vec<String> = inner
            .pending
            .iter()
            .filter(|(_, (_, since))| now - since >= min_idle)
            .map(|(id, _)| id.clone())
            .collect();
        let mut out = Vec::new();
        for id in stale {
            if let Some((message, _)) = inner.pending.get(&id).cloned() {
                inner.pending.insert(id.clone(), (message.clone(), now));
                out.push((id, message));
            }
        }
        Ok(out)
    }

    async fn queue_depth(&self) -> Result<u64, CoordinationStoreError> {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let inner = self.inner.lock().unwrap();
        Ok((inner.stream.len() + inner.pending.len()) as u64)
    }

    async fn publish_response(&self, message: ResponseMessage) -> Result<(), CoordinationStoreError> {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let mut inner = self.inner.lock().unwrap();
        inner.responses.insert(message.request_id.clone(), message);
        Ok(())
    }

    async fn get_response(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<ResponseMessage>, CoordinationStoreError> {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let inner = self.inner.lock().unwrap();
        Ok(inner.responses.get(request_id).cloned())
    }

    async fn append_audit_stream(&self, _event: &str, _user_id: &UserId) -> Result<(), CoordinationStoreError> {
        #[allow(clippy::unwrap_used, reason = "mutex poisoning indicates a prior panic, not a recoverable condition")]
        let mut inner = self.inner.lock().unwrap();
        inner.audit_stream_len += 1;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), CoordinationStoreError> {
        Ok(())
    }
}

fn now_seconds() -> f64 {
    use std::time::SystemTime;
    use std::time::UNIX_EPOCH;
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identifiers::RequestId;
    use crate::core::identifiers::TraceId;
    use crate::core::model::ResponseStatus;
    use crate::core::model::TrustTier;

    fn message(id: &str) -> StreamMessage {
        StreamMessage {
            request_id: RequestId::from(id),
            trace_id: TraceId::from("trace"),
            user_id: UserId::from("u1"),
            trust_tier: TrustTier::Standard,
            input_text: "hello".to_string(),
            metadata: std::collections::BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn unacked_entry_is_claimable_after_min_idle() {
        let store = InMemoryCoordinationStore::new();
        store.publish(message("r1")).await.expect("publish");
        let read = store
            .read_stream("g", "c1", 1, 0)
            .await
            .expect("read")
            .into_iter()
            .next()
            .expect("one entry");
        let claimed = store.claim_pending("g", "c2", 0).await.expect("claim");
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].0, read.0);
    }

    #[tokio::test]
    async fn acked_entry_is_not_claimable() {
        let store = InMemoryCoordinationStore::new();
        store.publish(message("r1")).await.expect("publish");
        let (entry_id, _) = store
            .read_stream("g", "c1", 1, 0)
            .await
            .expect("read")
            .into_iter()
            .next()
            .expect("one entry");
        store.ack("g", &entry_id).await.expect("ack");
        let claimed = store.claim_pending("g", "c2", 0).await.expect("claim");
        assert!(claimed.is_empty());
    }

    #[tokio::test]
    async fn queue_depth_counts_unacked_entries() {
        let store = InMemoryCoordinationStore::new();
        store.publish(message("r1")).await.expect("publish");
        store.publish(message("r2")).await.expect("publish");
        assert_eq!(store.queue_depth().await.expect("depth"), 2);
        let _ = store.read_stream("g", "c1", 1, 0).await.expect("read");
        assert_eq!(store.queue_depth().await.expect("depth"), 2);
    }

    #[tokio::test]
    async fn published_response_is_retrievable() {
        let store = InMemoryCoordinationStore::new();
        let request_id = RequestId::from("r1");
        store
            .publish_response(ResponseMessage {
                request_id: request_id.clone(),
                response: Some("hi".to_string()),
                status: ResponseStatus::Completed,
            })
            .await
            .expect("publish response");
        let response = store.get_response(&request_id).await.expect("get").expect("present");
        assert_eq!(response.response.as_deref(), Some("hi"));
    }
}
