//! Subscription sweeper
//!
//! Periodically looks for module subscriptions whose period has ended.
//! Auto-renewing ones are extended, the others are marked expired.
//!
//! ```text
//! SubscriptionSweeper
//!   ├─> interval tick
//!   ├─> TenantService::sweep_subscriptions (one master transaction)
//!   └─> log SweepReport
//! ```
//!
//! A failed sweep is logged and retried on the next tick. The loop exits
//! when the shutdown token is cancelled; a sweep in flight is finished
//! first so its transaction is never abandoned halfway.

use chrono::{DateTime, Utc};
use erp_shared::data::{DataBackend, DataError};
use erp_shared::tenancy::{SweepReport, TenantService};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::SweeperConfig;

pub struct SubscriptionSweeper<B> {
    tenants: TenantService<B>,
    config: SweeperConfig,
    shutdown_token: CancellationToken,
}

impl<B: DataBackend> SubscriptionSweeper<B> {
    pub fn new(tenants: TenantService<B>, config: SweeperConfig) -> Self {
        Self {
            tenants,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token that stops [`run`](Self::run) when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// One sweep as of `now`
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<SweepReport, DataError> {
        self.tenants
            .sweep_subscriptions(now, self.config.renew_months)
            .await
    }

    /// Sweeps on every tick until shutdown; the first sweep runs immediately
    pub async fn run(&self) {
        tracing::info!(
            interval_seconds = self.config.interval_seconds,
            renew_months = self.config.renew_months,
            "Subscription sweeper starting"
        );

        let mut ticker = interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.sweep_once(Utc::now()).await {
                Ok(report) if report.renewed + report.expired > 0 => {
                    tracing::info!(
                        renewed = report.renewed,
                        expired = report.expired,
                        "Subscriptions swept"
                    );
                }
                Ok(_) => tracing::debug!("No subscriptions due"),
                Err(e) => tracing::error!(error = %e, "Subscription sweep failed"),
            }
        }

        tracing::info!("Subscription sweeper shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use erp_shared::data::{ExecutionStrategy, MemoryBackend, Repository};
    use erp_shared::models::{CreateTenant, Module, SubscriptionStatus};
    use erp_shared::specification::catalog::subscriptions_of_tenant;

    async fn sweeper() -> SubscriptionSweeper<MemoryBackend> {
        let backend = MemoryBackend::new();
        let modules = ["INVENTORY", "CRM"]
            .iter()
            .map(|code| Module::new(code, code, None).unwrap())
            .collect::<Vec<_>>();
        backend.master().modules().add_range(&modules).await.unwrap();

        let service = TenantService::new(backend, ExecutionStrategy::no_retry());
        SubscriptionSweeper::new(
            service,
            SweeperConfig {
                interval_seconds: 60,
                renew_months: 1,
            },
        )
    }

    #[tokio::test]
    async fn test_sweep_renews_and_expires_due_subscriptions() {
        let sweeper = sweeper().await;
        let tenants = &sweeper.tenants;
        let tenant = tenants
            .register(CreateTenant {
                code: "ACME".into(),
                name: "Acme".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let started = Utc::now() - Duration::days(75);
        tenants.subscribe("ACME", "INVENTORY", 1, true, started).await.unwrap();
        tenants.subscribe("ACME", "CRM", 1, false, started).await.unwrap();

        let report = sweeper.sweep_once(Utc::now()).await.unwrap();
        assert_eq!(report, SweepReport { renewed: 1, expired: 1 });

        let subscriptions = tenants
            .backend()
            .master()
            .subscriptions()
            .find(&subscriptions_of_tenant(tenant.id()))
            .await
            .unwrap();
        let crm = subscriptions.iter().find(|s| s.module_code() == "CRM").unwrap();
        let inventory = subscriptions.iter().find(|s| s.module_code() == "INVENTORY").unwrap();
        assert_eq!(crm.status(), SubscriptionStatus::Expired);
        assert_eq!(inventory.status(), SubscriptionStatus::Active);
        assert!(inventory.period().end_date > Utc::now());

        let report = sweeper.sweep_once(Utc::now()).await.unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let sweeper = sweeper().await;
        let token = sweeper.shutdown_token();
        token.cancel();

        tokio::time::timeout(std::time::Duration::from_secs(5), sweeper.run())
            .await
            .expect("sweeper did not stop");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sweeps_until_cancelled() {
        let sweeper = std::sync::Arc::new(sweeper().await);
        let token = sweeper.shutdown_token();

        let handle = tokio::spawn({
            let sweeper = std::sync::Arc::clone(&sweeper);
            async move { sweeper.run().await }
        });
        tokio::time::sleep(std::time::Duration::from_secs(150)).await;
        token.cancel();
        handle.await.unwrap();
    }
}
