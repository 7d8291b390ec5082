//! Plan-tier entitlement.

use crate::domain::{Entity, Plan, PlanTier};
use crate::store::{Store, StoreResult};

/// Decides whether a user's active subscriptions cover a required plan.
///
/// Tiers form a two-level hierarchy: a `pro` subscription grants every
/// tier, a `free` subscription grants only `free`.
#[derive(Clone)]
pub struct EntitlementChecker {
    store: Store,
}

impl EntitlementChecker {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, required), fields(required = %required.name))]
    pub async fn allows(&self, user_id: &str, required: &Plan) -> StoreResult<bool> {
        let subscriptions = self.store.user_plans.list().await?;

        let mut holds_free = false;
        for subscription in subscriptions
            .iter()
            .filter(|s| s.user_id == user_id && s.active && !s.is_deleted())
        {
            let plan = match self.store.plans.get(&subscription.plan_id).await {
                Ok(plan) if !plan.is_deleted() => plan,
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(
                        plan_id = %subscription.plan_id,
                        error = %e,
                        "Skipping subscription with unresolvable plan"
                    );
                    continue;
                }
            };

            match plan.tier() {
                Some(PlanTier::Pro) => return Ok(true),
                Some(PlanTier::Free) => holds_free = true,
                None => {}
            }
        }

        Ok(holds_free && required.tier() == Some(PlanTier::Free))
    }
}
