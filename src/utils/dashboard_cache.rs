use moka::future::Cache;
use once_cell::sync::OnceCell;
use std::time::Duration;

use crate::model::dashboard::DashboardSummary;

const SUMMARY_KEY: &str = "summary";
const DEFAULT_TTL_SECS: u64 = 60;

static DASHBOARD_CACHE: OnceCell<Cache<&'static str, DashboardSummary>> = OnceCell::new();

fn build(ttl_secs: u64) -> Cache<&'static str, DashboardSummary> {
    Cache::builder()
        .max_capacity(1)
        .time_to_live(Duration::from_secs(ttl_secs.max(1)))
        .build()
}

/// Sets the TTL; only the first call has an effect.
pub fn init(ttl_secs: u64) {
    if DASHBOARD_CACHE.set(build(ttl_secs)).is_err() {
        log::warn!("Dashboard cache already initialised");
    }
}

fn cache() -> &'static Cache<&'static str, DashboardSummary> {
    DASHBOARD_CACHE.get_or_init(|| build(DEFAULT_TTL_SECS))
}

pub async fn cached_summary() -> Option<DashboardSummary> {
    cache().get(&SUMMARY_KEY).await
}

pub async fn store_summary(summary: DashboardSummary) {
    cache().insert(SUMMARY_KEY, summary).await;
}

/// Called after writes that change any dashboard counter.
pub async fn invalidate() {
    cache().invalidate(&SUMMARY_KEY).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn summary(total: i64) -> DashboardSummary {
        DashboardSummary {
            total_employees: total,
            active_employees: total,
            checked_in_today: 0,
            on_break: 0,
            open_issues: 0,
            active_warnings: 0,
            assets_by_status: Vec::new(),
            unmatched_flowace: 0,
            last_upload: None,
            generated_at: Utc::now(),
        }
    }

    #[actix_web::test]
    async fn store_then_invalidate() {
        store_summary(summary(4)).await;
        assert_eq!(cached_summary().await.map(|s| s.total_employees), Some(4));

        invalidate().await;
        assert!(cached_summary().await.is_none());
    }
}
