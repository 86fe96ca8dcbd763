//! Live policy and content snapshots.
//!
//! Readers clone the current `Arc` under a short read lock and evaluate
//! without holding it. Writers build the next snapshot off to the side and
//! swap it in under the write lock.

use std::sync::Arc;

use parking_lot::RwLock;
use pdp_core::content::ContentUpdate;
use pdp_core::{LocalContentStorage, UpdateError, UpdateErrorKind, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PdpConfig;
use crate::context::Context;
use crate::effect::Response;
use crate::storage::{PolicyStorage, PolicyUpdate};

pub struct Pdp {
    policies: RwLock<Arc<PolicyStorage>>,
    content: RwLock<Arc<LocalContentStorage>>,
    trace_decisions: bool,
}

impl Pdp {
    pub fn new(policies: PolicyStorage, content: LocalContentStorage) -> Self {
        Self {
            policies: RwLock::new(Arc::new(policies)),
            content: RwLock::new(Arc::new(content)),
            trace_decisions: false,
        }
    }

    pub fn from_config(
        cfg: &PdpConfig,
        policies: PolicyStorage,
        content: LocalContentStorage,
    ) -> Self {
        let mut pdp = Self::new(policies.with_max_depth(cfg.engine.max_depth), content);
        pdp.trace_decisions = cfg.engine.trace_decisions;
        pdp
    }

    pub fn policies(&self) -> Arc<PolicyStorage> {
        self.policies.read().clone()
    }

    pub fn content(&self) -> Arc<LocalContentStorage> {
        self.content.read().clone()
    }

    /// Request context reading through the current content snapshot.
    pub fn context<F, E>(&self, count: usize, supplier: F) -> Result<Context, E>
    where
        F: FnMut(usize) -> Result<(String, Value), E>,
    {
        Context::new(Some(self.content()), count, supplier)
    }

    pub fn calculate(&self, ctx: &Context) -> Response {
        let policies = self.policies();
        let r = policies.calculate(ctx);
        if self.trace_decisions {
            debug!(
                effect = %r.effect,
                obligations = r.obligations.len(),
                status = %r.status_message(),
                "decision"
            );
        }
        r
    }

    pub fn swap_policies(&self, storage: PolicyStorage) {
        let tag = storage.tag();
        *self.policies.write() = Arc::new(storage);
        info!(tag = ?tag, "policy snapshot swapped");
    }

    pub fn swap_content(&self, storage: LocalContentStorage) {
        let ids = storage.ids().join(",");
        *self.content.write() = Arc::new(storage);
        info!(contents = %ids, "content snapshot swapped");
    }

    /// Applies `update` to the live policies. Rejected if the live tag
    /// differs from the update's source tag, including when another update
    /// won the race while this one was being applied.
    pub fn apply_policy_update(&self, update: &PolicyUpdate) -> Result<(), UpdateError> {
        let current = self.policies();
        let mut t = current
            .new_transaction(&update.from_tag())
            .map_err(|e| {
                warn!(error = %e, "policy update rejected");
                e
            })?;
        t.apply(update)?;
        let next = t.commit();

        let mut live = self.policies.write();
        if live.tag() != current.tag() {
            let err = tag_mismatch(live.tag(), update.from_tag());
            warn!(error = %err, "policy update rejected");
            return Err(err);
        }
        *live = Arc::new(next);
        info!(from = %update.from_tag(), to = %update.to_tag(), "policy snapshot updated");
        Ok(())
    }

    /// Applies `update` to one content of the live content storage. Other
    /// contents are left as they are in the live snapshot.
    pub fn apply_content_update(&self, update: &ContentUpdate) -> Result<(), UpdateError> {
        let current = self.content();
        let mut t = current
            .new_transaction(update.content(), &update.from_tag())
            .map_err(|e| {
                warn!(content = %update.content(), error = %e, "content update rejected");
                e
            })?;
        t.apply(update)?;

        let mut live = self.content.write();
        let live_tag = live.content(update.content()).and_then(|c| c.tag());
        if live_tag != Some(update.from_tag()) {
            let err = tag_mismatch(live_tag, update.from_tag()).bind(update.content());
            warn!(content = %update.content(), error = %err, "content update rejected");
            return Err(err);
        }
        let next = t.commit(&live);
        *live = Arc::new(next);
        info!(
            content = %update.content(),
            from = %update.from_tag(),
            to = %update.to_tag(),
            "content snapshot updated"
        );
        Ok(())
    }
}

fn tag_mismatch(live: Option<Uuid>, from: Uuid) -> UpdateError {
    match live {
        Some(expected) => UpdateErrorKind::TagMismatch {
            expected,
            actual: from,
        }
        .into(),
        None => UpdateErrorKind::UntaggedStorage.into(),
    }
}

impl std::fmt::Debug for Pdp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pdp")
            .field("policy_tag", &self.policies.read().tag())
            .field("trace_decisions", &self.trace_decisions)
            .finish()
    }
}
