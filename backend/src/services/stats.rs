//! Dashboard, SLA and tag statistics.
//!
//! Aggregations run in memory over loaded incidents; the helpers here are shared
//! with the report service.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::{
    incident::{Incident, IncidentStatus, Severity},
    stats::{DashboardStats, SlaMetrics, TagStat, TrendPeriod, TrendPoint},
    tag::Tag,
};
use crate::repositories::{
    IncidentRepository, IncidentRepositoryTrait, UserRepository, UserRepositoryTrait,
};
use crate::services::{
    incident::hydrate_incidents,
    stats_cache::{dashboard_key, StatsCache},
};
use crate::state::AppState;
use crate::types::{IncidentId, TagId};
use crate::utils::time::month_start_before;

pub const RECENT_INCIDENT_COUNT: usize = 10;
const DAILY_POINTS: i64 = 30;
const WEEKLY_POINTS: i64 = 12;
const MONTHLY_POINTS: u32 = 12;

pub fn count_by_severity(incidents: &[Incident]) -> BTreeMap<String, i64> {
    let mut counts: BTreeMap<String, i64> = Severity::ALL
        .iter()
        .map(|severity| (severity.as_str().to_string(), 0))
        .collect();
    for incident in incidents {
        *counts
            .entry(incident.severity.as_str().to_string())
            .or_default() += 1;
    }
    counts
}

pub fn count_by_status(incidents: &[Incident]) -> BTreeMap<String, i64> {
    let mut counts: BTreeMap<String, i64> = IncidentStatus::ALL
        .iter()
        .map(|status| (status.as_str().to_string(), 0))
        .collect();
    for incident in incidents {
        *counts.entry(incident.status.as_str().to_string()).or_default() += 1;
    }
    counts
}

/// Trend buckets by detection time, oldest first.
pub fn trend_points(
    incidents: &[Incident],
    period: TrendPeriod,
    now: DateTime<Utc>,
) -> Vec<TrendPoint> {
    match period {
        TrendPeriod::Daily => {
            let mut per_day: HashMap<NaiveDate, i64> = HashMap::new();
            for incident in incidents {
                *per_day.entry(incident.detected_at.date_naive()).or_default() += 1;
            }
            (0..DAILY_POINTS)
                .map(|i| {
                    let day = (now - Duration::days(DAILY_POINTS - 1 - i)).date_naive();
                    TrendPoint {
                        date: day.format("%m/%d").to_string(),
                        count: per_day.get(&day).copied().unwrap_or(0),
                    }
                })
                .collect()
        }
        TrendPeriod::Weekly => (0..WEEKLY_POINTS)
            .map(|i| {
                let start = now - Duration::days(7 * (WEEKLY_POINTS - 1 - i));
                let end = start + Duration::days(7);
                let count = incidents
                    .iter()
                    .filter(|incident| incident.detected_at >= start && incident.detected_at < end)
                    .count() as i64;
                TrendPoint {
                    date: start.format("%m/%d").to_string(),
                    count,
                }
            })
            .collect(),
        TrendPeriod::Monthly => {
            let mut per_month: HashMap<(i32, u32), i64> = HashMap::new();
            for incident in incidents {
                let detected = incident.detected_at;
                *per_month
                    .entry((detected.year(), detected.month()))
                    .or_default() += 1;
            }
            (0..MONTHLY_POINTS)
                .rev()
                .filter_map(|offset| month_start_before(now, offset))
                .map(|start| {
                    let key = (start.year(), start.month());
                    TrendPoint {
                        date: start.format("%Y-%m").to_string(),
                        count: per_month.get(&key).copied().unwrap_or(0),
                    }
                })
                .collect()
        }
    }
}

/// Detection-to-resolution hours for resolved incidents; negative spans are ignored.
pub fn resolution_hours(incidents: &[Incident]) -> Vec<f64> {
    incidents
        .iter()
        .filter(|incident| incident.status == IncidentStatus::Resolved)
        .filter_map(|incident| incident.resolved_at.map(|at| at - incident.detected_at))
        .filter(|span| *span >= Duration::zero())
        .map(|span| span.num_seconds() as f64 / 3600.0)
        .collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Met or violated, or `None` while the incident is open and inside its window.
fn sla_outcome(incident: &Incident, now: DateTime<Utc>) -> Option<bool> {
    match incident.resolved_at {
        Some(resolved_at) => Some(resolved_at <= incident.sla_deadline),
        None if now > incident.sla_deadline => Some(false),
        None => None,
    }
}

fn is_at_risk(incident: &Incident, now: DateTime<Utc>) -> bool {
    if incident.resolved_at.is_some() || !incident.status.is_active() {
        return false;
    }
    if now > incident.sla_deadline {
        return false;
    }
    let window = Duration::minutes(i64::from(incident.sla_target_hours) * 60);
    incident.sla_deadline - now <= window / 4
}

pub fn sla_metrics(incidents: &[Incident], now: DateTime<Utc>) -> SlaMetrics {
    let mut sla_met = 0;
    let mut sla_violated = 0;
    for outcome in incidents.iter().filter_map(|incident| sla_outcome(incident, now)) {
        if outcome {
            sla_met += 1;
        } else {
            sla_violated += 1;
        }
    }
    SlaMetrics {
        total_incidents: incidents.len() as i64,
        sla_met,
        sla_violated,
        compliance_rate: compliance_rate(sla_met, sla_violated),
        average_resolution_hours: mean(&resolution_hours(incidents)),
        at_risk: incidents
            .iter()
            .filter(|incident| is_at_risk(incident, now))
            .count() as i64,
    }
}

pub fn compliance_rate(met: i64, violated: i64) -> f64 {
    let settled = met + violated;
    if settled == 0 {
        100.0
    } else {
        met as f64 / settled as f64 * 100.0
    }
}

/// Per-tag incident counts, most used first, then by name.
pub fn tag_counts(links: &[(IncidentId, Tag)]) -> Vec<(Tag, i64)> {
    let mut counts: HashMap<TagId, (Tag, i64)> = HashMap::new();
    for (_, tag) in links {
        counts
            .entry(tag.id)
            .or_insert_with(|| (tag.clone(), 0))
            .1 += 1;
    }
    let mut ranked: Vec<(Tag, i64)> = counts.into_values().collect();
    ranked.sort_by(|(a, a_count), (b, b_count)| {
        b_count.cmp(a_count).then_with(|| a.name.cmp(&b.name))
    });
    ranked
}

pub struct StatsService {
    pool: PgPool,
    incidents: Arc<dyn IncidentRepositoryTrait>,
    users: Arc<dyn UserRepositoryTrait>,
    cache: Arc<dyn StatsCache>,
    cache_ttl_seconds: u64,
}

impl StatsService {
    pub fn from_state(state: &AppState) -> Self {
        Self::with_parts(
            state.pool.clone(),
            Arc::new(IncidentRepository::new()),
            Arc::new(UserRepository::new()),
            Arc::clone(&state.stats_cache),
            state.config.stats_cache_ttl_seconds,
        )
    }

    pub fn with_parts(
        pool: PgPool,
        incidents: Arc<dyn IncidentRepositoryTrait>,
        users: Arc<dyn UserRepositoryTrait>,
        cache: Arc<dyn StatsCache>,
        cache_ttl_seconds: u64,
    ) -> Self {
        Self {
            pool,
            incidents,
            users,
            cache,
            cache_ttl_seconds,
        }
    }

    async fn cached_dashboard(&self, key: &str) -> Option<DashboardStats> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(stats) => Some(stats),
                Err(err) => {
                    tracing::warn!(error = %err, key, "Discarding unreadable cached dashboard");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, key, "Stats cache lookup failed");
                None
            }
        }
    }

    pub async fn dashboard(&self, period: TrendPeriod) -> Result<DashboardStats, AppError> {
        let key = dashboard_key(period);
        if let Some(stats) = self.cached_dashboard(&key).await {
            tracing::debug!(key = %key, "Dashboard served from cache");
            return Ok(stats);
        }

        let mut incidents = self.incidents.find_all(&self.pool).await?;
        incidents.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        let now = Utc::now();
        let recent: Vec<Incident> = incidents
            .iter()
            .take(RECENT_INCIDENT_COUNT)
            .cloned()
            .collect();
        let stats = DashboardStats {
            total_incidents: incidents.len() as i64,
            by_severity: count_by_severity(&incidents),
            by_status: count_by_status(&incidents),
            recent_incidents: hydrate_incidents(
                &self.pool,
                self.incidents.as_ref(),
                self.users.as_ref(),
                recent,
            )
            .await?,
            trend_period: period,
            trend_data: trend_points(&incidents, period, now),
        };

        match serde_json::to_string(&stats) {
            Ok(raw) => {
                if let Err(err) = self.cache.set(&key, &raw, self.cache_ttl_seconds).await {
                    tracing::warn!(error = %err, key = %key, "Failed to cache dashboard");
                }
            }
            Err(err) => tracing::warn!(error = %err, "Failed to serialize dashboard"),
        }
        Ok(stats)
    }

    pub async fn sla(&self) -> Result<SlaMetrics, AppError> {
        let incidents = self.incidents.find_all(&self.pool).await?;
        Ok(sla_metrics(&incidents, Utc::now()))
    }

    pub async fn tags(&self) -> Result<Vec<TagStat>, AppError> {
        let incidents = self.incidents.find_all(&self.pool).await?;
        if incidents.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<IncidentId> = incidents.iter().map(|incident| incident.id).collect();
        let links = self.incidents.tag_links(&self.pool, &ids).await?;
        let total = incidents.len() as f64;
        Ok(tag_counts(&links)
            .into_iter()
            .map(|(tag, count)| TagStat {
                tag_id: tag.id,
                tag_name: tag.name,
                tag_color: tag.color,
                count,
                percentage: count as f64 / total * 100.0,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;
    use crate::repositories::incident::MockIncidentRepositoryTrait;
    use crate::repositories::user::MockUserRepositoryTrait;
    use crate::services::stats_cache::NoopStatsCache;
    use crate::services::test_support::{incident_by, lazy_pool, user};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .expect("timestamp")
            .with_timezone(&Utc)
    }

    fn incident(
        severity: Severity,
        status: IncidentStatus,
        detected_at: DateTime<Utc>,
    ) -> Incident {
        let mut incident = incident_by(&user(UserRole::Editor));
        incident.severity = severity;
        incident.status = status;
        incident.detected_at = detected_at;
        incident.sla_target_hours = severity.default_sla_hours();
        incident.sla_deadline =
            crate::models::incident::sla_deadline(detected_at, incident.sla_target_hours);
        incident
    }

    #[test]
    fn counts_are_zero_filled() {
        let now = at("2026-03-10T12:00:00Z");
        let incidents = vec![incident(Severity::High, IncidentStatus::Open, now)];
        let by_severity = count_by_severity(&incidents);
        assert_eq!(by_severity.len(), 4);
        assert_eq!(by_severity["high"], 1);
        assert_eq!(by_severity["critical"], 0);
        let by_status = count_by_status(&incidents);
        assert_eq!(by_status["closed"], 0);
        assert_eq!(by_status["open"], 1);
    }

    #[test]
    fn daily_trend_has_thirty_labelled_points() {
        let now = at("2026-03-10T12:00:00Z");
        let incidents = vec![
            incident(Severity::Low, IncidentStatus::Open, at("2026-03-10T01:00:00Z")),
            incident(Severity::Low, IncidentStatus::Open, at("2026-03-09T23:00:00Z")),
            incident(Severity::Low, IncidentStatus::Open, at("2025-12-01T00:00:00Z")),
        ];
        let points = trend_points(&incidents, TrendPeriod::Daily, now);
        assert_eq!(points.len(), 30);
        assert_eq!(points[0].date, "02/09");
        assert_eq!(points[29], TrendPoint { date: "03/10".into(), count: 1 });
        assert_eq!(points[28].count, 1);
        assert_eq!(points.iter().map(|p| p.count).sum::<i64>(), 2);
    }

    #[test]
    fn weekly_and_monthly_trends() {
        let now = at("2026-03-10T12:00:00Z");
        let incidents = vec![
            incident(Severity::Low, IncidentStatus::Open, at("2026-03-08T00:00:00Z")),
            incident(Severity::Low, IncidentStatus::Open, at("2025-04-15T00:00:00Z")),
            incident(Severity::Low, IncidentStatus::Open, at("2025-03-15T00:00:00Z")),
        ];
        let weekly = trend_points(&incidents, TrendPeriod::Weekly, now);
        assert_eq!(weekly.len(), 12);
        assert_eq!(weekly[11].date, "03/10");
        assert_eq!(weekly[10].count, 1);

        let monthly = trend_points(&incidents, TrendPeriod::Monthly, now);
        assert_eq!(monthly.len(), 12);
        assert_eq!(monthly[0].date, "2025-04");
        assert_eq!(monthly[0].count, 1);
        assert_eq!(monthly[11], TrendPoint { date: "2026-03".into(), count: 1 });
    }

    #[test]
    fn sla_metrics_count_settled_incidents_only() {
        let now = at("2026-03-10T12:00:00Z");
        let mut met = incident(
            Severity::Critical,
            IncidentStatus::Resolved,
            at("2026-03-10T00:00:00Z"),
        );
        met.resolved_at = Some(at("2026-03-10T02:00:00Z"));
        let mut late = incident(
            Severity::Critical,
            IncidentStatus::Resolved,
            at("2026-03-09T00:00:00Z"),
        );
        late.resolved_at = Some(at("2026-03-09T10:00:00Z"));
        let overdue =
            incident(Severity::Critical, IncidentStatus::Open, at("2026-03-09T00:00:00Z"));
        // Critical windows are four hours; one hour left is inside the last quarter.
        let risky = incident(
            Severity::Critical,
            IncidentStatus::Investigating,
            at("2026-03-10T09:00:00Z"),
        );
        let fresh = incident(Severity::Low, IncidentStatus::Open, at("2026-03-10T11:00:00Z"));

        let metrics = sla_metrics(&[met, late, overdue, risky, fresh], now);
        assert_eq!(metrics.total_incidents, 5);
        assert_eq!(metrics.sla_met, 1);
        assert_eq!(metrics.sla_violated, 2);
        assert!((metrics.compliance_rate - 100.0 / 3.0).abs() < 1e-9);
        assert!((metrics.average_resolution_hours - 6.0).abs() < 1e-9);
        assert_eq!(metrics.at_risk, 1);
    }

    #[test]
    fn empty_sla_metrics_are_fully_compliant() {
        let metrics = sla_metrics(&[], Utc::now());
        assert_eq!(metrics.compliance_rate, 100.0);
        assert_eq!(metrics.average_resolution_hours, 0.0);
    }

    #[test]
    fn median_handles_even_and_odd_lengths() {
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median(&[5.0, 1.0, 3.0]), 3.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn tag_counts_rank_by_count_then_name() {
        let db = Tag::new("database".into(), None);
        let api = Tag::new("api".into(), None);
        let net = Tag::new("network".into(), None);
        let links = vec![
            (IncidentId::new(), db.clone()),
            (IncidentId::new(), net.clone()),
            (IncidentId::new(), api.clone()),
            (IncidentId::new(), net.clone()),
        ];
        let ranked: Vec<(String, i64)> = tag_counts(&links)
            .into_iter()
            .map(|(tag, count)| (tag.name, count))
            .collect();
        assert_eq!(
            ranked,
            vec![
                ("network".to_string(), 2),
                ("api".to_string(), 1),
                ("database".to_string(), 1)
            ]
        );
    }

    #[derive(Default)]
    struct MemoryCache {
        entries: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl StatsCache for MemoryCache {
        async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
            Ok(self.entries.lock().expect("lock").get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str, _ttl_seconds: u64) -> anyhow::Result<()> {
            self.entries
                .lock()
                .expect("lock")
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn invalidate_all(&self) -> anyhow::Result<()> {
            self.entries.lock().expect("lock").clear();
            Ok(())
        }
    }

    #[tokio::test]
    async fn dashboard_is_cached_per_period() {
        let mut incidents = MockIncidentRepositoryTrait::new();
        incidents
            .expect_find_all()
            .times(1)
            .returning(|_| Ok(Vec::new()));
        let cache = Arc::new(MemoryCache::default());
        let service = StatsService::with_parts(
            lazy_pool(),
            Arc::new(incidents),
            Arc::new(MockUserRepositoryTrait::new()),
            cache.clone(),
            300,
        );

        let first = service.dashboard(TrendPeriod::Weekly).await.expect("dashboard");
        let second = service.dashboard(TrendPeriod::Weekly).await.expect("cached");
        assert_eq!(first.total_incidents, 0);
        assert_eq!(second.trend_data.len(), 12);
        assert!(cache
            .entries
            .lock()
            .expect("lock")
            .contains_key("stats:dashboard:weekly"));
    }

    #[tokio::test]
    async fn tag_stats_report_share_of_all_incidents() {
        let owner = user(UserRole::Editor);
        let first = incident_by(&owner);
        let second = incident_by(&owner);
        let tag = Tag::new("database".into(), Some("#ff0000".into()));
        let mut incidents = MockIncidentRepositoryTrait::new();
        let all = vec![first.clone(), second];
        incidents
            .expect_find_all()
            .returning(move |_| Ok(all.clone()));
        let link = (first.id, tag.clone());
        incidents
            .expect_tag_links()
            .returning(move |_, _| Ok(vec![link.clone()]));
        let service = StatsService::with_parts(
            lazy_pool(),
            Arc::new(incidents),
            Arc::new(MockUserRepositoryTrait::new()),
            Arc::new(NoopStatsCache),
            300,
        );
        let stats = service.tags().await.expect("tags");
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].tag_color, "#ff0000");
        assert_eq!(stats[0].percentage, 50.0);
    }
}
