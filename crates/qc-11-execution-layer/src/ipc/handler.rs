//! Per-message handler
//!
//! Turns one routed message into one deploy at position `(tx_index, msg_index)`
//! and waits until the block driver has executed and committed it.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::payloads::{ExecutionMsg, MessageResult, RawMessage};
use crate::application::service::{BlockContext, ExecutionLayerService};
use crate::domain::deploy::{DeployOutcome, DeployPayload};
use crate::domain::errors::ExecutionLayerError;
use crate::domain::value_objects::DeployKey;
use crate::ports::inbound::BlockLifecycleApi;
use crate::ports::outbound::KeyValueStore;

/// A decoded message, ready to queue.
struct Prepared {
    msg_type: &'static str,
    attributes: Vec<(String, String)>,
    context: BlockContext,
    payload: DeployPayload,
}

pub struct ExecutionLayerHandler<S: KeyValueStore + 'static> {
    service: Arc<ExecutionLayerService<S>>,
    completion_timeout: Duration,
}

impl<S: KeyValueStore + 'static> ExecutionLayerHandler<S> {
    pub fn new(service: Arc<ExecutionLayerService<S>>) -> Self {
        let completion_timeout = service.completion_timeout();
        Self {
            service,
            completion_timeout,
        }
    }

    pub fn service(&self) -> &Arc<ExecutionLayerService<S>> {
        &self.service
    }

    /// Announce transaction `tx_index` with its message count, then deliver
    /// every message concurrently. Results come back in message order.
    pub async fn handle_transaction(
        &self,
        tx_index: u32,
        messages: &[RawMessage],
    ) -> Vec<MessageResult> {
        let count = match u32::try_from(messages.len()) {
            Ok(count) => count,
            Err(_) => {
                let err = ExecutionLayerError::InvalidMessage("too many messages".into());
                return messages.iter().map(|_| MessageResult::failure(&err)).collect();
            }
        };
        if let Err(err) = self.service.expect_transaction(tx_index, count) {
            error!(tx_index, error = %err, "[qc-11] Transaction announcement rejected");
            return messages.iter().map(|_| MessageResult::failure(&err)).collect();
        }
        let deliveries = messages
            .iter()
            .zip(0u32..)
            .map(|(raw, msg_index)| self.deliver_message(raw, tx_index, msg_index));
        futures::future::join_all(deliveries).await
    }

    /// Handle one message. Resolves only after its deploy is terminal, or once
    /// the completion deadline passes and the deploy is withdrawn unexecuted.
    pub async fn deliver_message(
        &self,
        raw: &RawMessage,
        tx_index: u32,
        msg_index: u32,
    ) -> MessageResult {
        let key = DeployKey::new(tx_index, msg_index);
        match self.submit(raw, key).await {
            Ok((result, msg_type)) => {
                debug!(%key, msg_type, "[qc-11] Message executed");
                result
            }
            Err(err) => {
                warn!(%key, msg_type = %raw.msg_type, error = %err, "[qc-11] Message failed");
                MessageResult::failure(&err)
            }
        }
    }

    /// Decode and validate the message and build its deploy payload.
    fn prepare(&self, raw: &RawMessage) -> Result<Prepared, ExecutionLayerError> {
        let msg = ExecutionMsg::decode(raw)?;
        msg.validate_basic()?;

        let context = self
            .service
            .block_context()
            .ok_or(ExecutionLayerError::NoActiveBlock)?;
        let msg_type = msg.msg_type();
        let attributes = msg.attributes();
        let payload = DeployPayload::encode(&msg.into_deploy(context.block_time, &context.chain_name)?)?;
        Ok(Prepared {
            msg_type,
            attributes,
            context,
            payload,
        })
    }

    async fn submit(
        &self,
        raw: &RawMessage,
        key: DeployKey,
    ) -> Result<(MessageResult, &'static str), ExecutionLayerError> {
        let Prepared {
            msg_type,
            mut attributes,
            context,
            payload,
        } = match self.prepare(raw) {
            Ok(prepared) => prepared,
            Err(err) => {
                // The position never gets a deploy; release the ones after it.
                if let Err(skip_err) = self.service.skip_deploy(key) {
                    debug!(%key, error = %skip_err, "[qc-11] Position not skipped");
                }
                return Err(err);
            }
        };

        let mut completion = self.service.submit_deploy(key, payload)?;
        let received = match tokio::time::timeout(self.completion_timeout, &mut completion).await {
            Ok(received) => received,
            Err(_) => match self.service.cancel_deploy(key) {
                Ok(true) => {
                    return Err(ExecutionLayerError::CompletionTimeout(self.completion_timeout))
                }
                // Already running: report what it commits.
                Ok(false) | Err(_) => {
                    warn!(%key, "[qc-11] Completion deadline passed while deploy running");
                    completion.await
                }
            },
        };
        let outcome: DeployOutcome = received.map_err(|_| ExecutionLayerError::Abandoned)?;
        let receipt = outcome?;

        attributes.push(("block_id".into(), context.block_id.to_string()));
        attributes.push(("position".into(), key.to_string()));
        attributes.push(("deploy_hash".into(), hex::encode(receipt.deploy_hash)));
        attributes.push(("cost".into(), receipt.cost.to_string()));
        attributes.push(("post_state_hash".into(), receipt.post_state_hash.to_hex()));
        Ok((
            MessageResult::success(receipt.post_state_hash, attributes),
            msg_type,
        ))
    }
}
