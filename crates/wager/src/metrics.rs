use prometheus::{IntCounter, Opts, Registry};

/// Prometheus counters for match lifecycle transitions.
pub struct LifecycleMetrics {
    /// Matches created and successfully read back.
    pub created: IntCounter,
    /// Matches moved to `match_history` with the live row removed.
    pub archived: IntCounter,
    /// Archive attempts whose history insert failed (live row untouched).
    pub archive_write_failures: IntCounter,
    /// Archive attempts that left both a history row and a live row behind.
    pub archive_delete_failures: IntCounter,
    /// Leftover live rows removed by reconciliation.
    pub reconciled: IntCounter,
}

impl LifecycleMetrics {
    /// Create metrics and register them with the given prometheus registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let created = IntCounter::with_opts(Opts::new(
            "wager_matches_created_total",
            "Number of matches created",
        ))?;
        let archived = IntCounter::with_opts(Opts::new(
            "wager_matches_archived_total",
            "Number of matches archived",
        ))?;
        let archive_write_failures = IntCounter::with_opts(Opts::new(
            "wager_archive_write_failures_total",
            "Number of archive attempts that failed to write match_history",
        ))?;
        let archive_delete_failures = IntCounter::with_opts(Opts::new(
            "wager_archive_delete_failures_total",
            "Number of archive attempts that left a live row behind",
        ))?;
        let reconciled = IntCounter::with_opts(Opts::new(
            "wager_matches_reconciled_total",
            "Number of leftover live rows removed by reconciliation",
        ))?;

        registry.register(Box::new(created.clone()))?;
        registry.register(Box::new(archived.clone()))?;
        registry.register(Box::new(archive_write_failures.clone()))?;
        registry.register(Box::new(archive_delete_failures.clone()))?;
        registry.register(Box::new(reconciled.clone()))?;

        Ok(Self {
            created,
            archived,
            archive_write_failures,
            archive_delete_failures,
            reconciled,
        })
    }

    /// Create metrics without registering (for testing).
    pub fn unregistered() -> Self {
        Self {
            created: IntCounter::new("wager_matches_created_total", "created")
                .expect("valid metric name"),
            archived: IntCounter::new("wager_matches_archived_total", "archived")
                .expect("valid metric name"),
            archive_write_failures: IntCounter::new(
                "wager_archive_write_failures_total",
                "archive write failures",
            )
            .expect("valid metric name"),
            archive_delete_failures: IntCounter::new(
                "wager_archive_delete_failures_total",
                "archive delete failures",
            )
            .expect("valid metric name"),
            reconciled: IntCounter::new("wager_matches_reconciled_total", "reconciled")
                .expect("valid metric name"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_metrics_work() {
        let m = LifecycleMetrics::unregistered();
        m.archived.inc();
        assert_eq!(m.archived.get(), 1);
    }

    #[test]
    fn registered_metrics_work() {
        let r = Registry::new();
        let m = LifecycleMetrics::new(&r).unwrap();
        m.created.inc_by(3);
        assert_eq!(m.created.get(), 3);
        let families = r.gather();
        assert_eq!(families.len(), 5);
    }

    #[test]
    fn double_registration_fails() {
        let r = Registry::new();
        let _m = LifecycleMetrics::new(&r).unwrap();
        assert!(LifecycleMetrics::new(&r).is_err());
    }
}
