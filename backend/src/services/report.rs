//! Monthly and custom-range incident reports.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::{
    incident::{Incident, IncidentStatus, Severity},
    report::{
        CustomReportQuery, IncidentReport, MonthlyReportQuery, PerformanceMetrics,
        PeriodComparison, ReportPeriod, ReportSummary, TagCount,
    },
    stats::TrendPoint,
};
use crate::repositories::{
    ActivityRepository, ActivityRepositoryTrait, IncidentRepository, IncidentRepositoryTrait,
};
use crate::services::stats::{
    count_by_severity, count_by_status, mean, median, resolution_hours,
    sla_metrics, tag_counts,
};
use crate::state::AppState;
use crate::types::IncidentId;
use crate::utils::time::{month_bounds, previous_period};

const TOP_TAG_LIMIT: usize = 10;

/// Percentage change against a baseline; growth from zero counts as 100%.
pub fn percent_change(current: i64, previous: i64) -> f64 {
    if previous > 0 {
        (current - previous) as f64 / previous as f64 * 100.0
    } else if current > 0 {
        100.0
    } else {
        0.0
    }
}

fn resolved_count(incidents: &[Incident]) -> i64 {
    incidents
        .iter()
        .filter(|incident| incident.status == IncidentStatus::Resolved)
        .count() as i64
}

fn summarize(incidents: &[Incident]) -> ReportSummary {
    let total = incidents.len() as i64;
    ReportSummary {
        total_incidents: total,
        new_incidents: total,
        resolved_incidents: resolved_count(incidents),
        open_incidents: incidents
            .iter()
            .filter(|incident| incident.status.is_active())
            .count() as i64,
        critical_incidents: incidents
            .iter()
            .filter(|incident| incident.severity == Severity::Critical)
            .count() as i64,
    }
}

/// Days with at least one new incident, ascending.
fn daily_trend(incidents: &[Incident]) -> Vec<TrendPoint> {
    let mut per_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for incident in incidents {
        *per_day.entry(incident.created_at.date_naive()).or_default() += 1;
    }
    per_day
        .into_iter()
        .map(|(day, count)| TrendPoint {
            date: day.format("%Y-%m-%d").to_string(),
            count,
        })
        .collect()
}

fn mean_time_to_acknowledge(
    incidents: &[Incident],
    first_responses: &[(IncidentId, DateTime<Utc>)],
) -> f64 {
    let created: HashMap<IncidentId, DateTime<Utc>> = incidents
        .iter()
        .map(|incident| (incident.id, incident.created_at))
        .collect();
    let hours: Vec<f64> = first_responses
        .iter()
        .filter_map(|(id, responded_at)| {
            created
                .get(id)
                .map(|created_at| *responded_at - *created_at)
        })
        .filter(|span| *span >= Duration::zero())
        .map(|span| span.num_seconds() as f64 / 3600.0)
        .collect();
    mean(&hours)
}

pub struct ReportService {
    pool: PgPool,
    incidents: Arc<dyn IncidentRepositoryTrait>,
    activities: Arc<dyn ActivityRepositoryTrait>,
}

impl ReportService {
    pub fn from_state(state: &AppState) -> Self {
        Self::with_repositories(
            state.pool.clone(),
            Arc::new(IncidentRepository::new()),
            Arc::new(ActivityRepository::new()),
        )
    }

    pub fn with_repositories(
        pool: PgPool,
        incidents: Arc<dyn IncidentRepositoryTrait>,
        activities: Arc<dyn ActivityRepositoryTrait>,
    ) -> Self {
        Self {
            pool,
            incidents,
            activities,
        }
    }

    pub async fn monthly(&self, query: &MonthlyReportQuery) -> Result<IncidentReport, AppError> {
        let now = Utc::now();
        let year = query.year.unwrap_or_else(|| now.year());
        let month = query.month.unwrap_or_else(|| now.month());
        if !(1..=12).contains(&month) {
            return Err(AppError::validation("month: must be between 1 and 12"));
        }
        let (start, end) = month_bounds(year, month)
            .ok_or_else(|| AppError::validation("year: out of range"))?;
        let period = ReportPeriod {
            start_date: start,
            end_date: end,
            year: Some(year),
            month: Some(month),
        };
        self.build(period).await
    }

    pub async fn custom(&self, query: &CustomReportQuery) -> Result<IncidentReport, AppError> {
        if query.end_date < query.start_date {
            return Err(AppError::validation(
                "end_date: must not be earlier than start_date",
            ));
        }
        let period = ReportPeriod {
            start_date: query.start_date,
            end_date: query.end_date,
            year: None,
            month: None,
        };
        self.build(period).await
    }

    async fn build(&self, period: ReportPeriod) -> Result<IncidentReport, AppError> {
        let incidents = self
            .incidents
            .find_created_between(&self.pool, period.start_date, period.end_date)
            .await?;
        let ids: Vec<IncidentId> = incidents.iter().map(|incident| incident.id).collect();

        let links = self.incidents.tag_links(&self.pool, &ids).await?;
        let top_tags = tag_counts(&links)
            .into_iter()
            .take(TOP_TAG_LIMIT)
            .map(|(tag, count)| TagCount {
                tag_id: tag.id,
                tag_name: tag.name,
                tag_color: tag.color,
                count,
            })
            .collect();

        let first_responses = self.activities.first_responses(&self.pool, &ids).await?;
        let resolution = resolution_hours(&incidents);
        let performance_metrics = PerformanceMetrics {
            average_resolution_hours: mean(&resolution),
            median_resolution_hours: median(&resolution),
            sla_compliance_rate: sla_metrics(&incidents, Utc::now()).compliance_rate,
            mean_time_to_acknowledge_hours: mean_time_to_acknowledge(&incidents, &first_responses),
        };

        let comparison = self.compare(&period, &incidents).await?;
        tracing::debug!(
            start = %period.start_date,
            end = %period.end_date,
            incidents = incidents.len(),
            "Report built"
        );

        Ok(IncidentReport {
            period,
            summary: summarize(&incidents),
            severity_breakdown: count_by_severity(&incidents),
            status_breakdown: count_by_status(&incidents),
            daily_trend: daily_trend(&incidents),
            top_tags,
            performance_metrics,
            comparison,
        })
    }

    /// Compares against the window of equal length that ends just before this one.
    async fn compare(
        &self,
        period: &ReportPeriod,
        current: &[Incident],
    ) -> Result<PeriodComparison, AppError> {
        let (previous_start, previous_end) = previous_period(period.start_date, period.end_date);
        let previous = self
            .incidents
            .find_created_between(&self.pool, previous_start, previous_end)
            .await?;

        let (year, month) = match period.month {
            Some(_) => (Some(previous_start.year()), Some(previous_start.month())),
            None => (None, None),
        };
        let current_total = current.len() as i64;
        let current_resolved = resolved_count(current);
        let previous_total = previous.len() as i64;
        let previous_resolved = resolved_count(&previous);
        Ok(PeriodComparison {
            previous_period: ReportPeriod {
                start_date: previous_start,
                end_date: previous_end,
                year,
                month,
            },
            previous_total,
            previous_resolved,
            total_change: current_total - previous_total,
            total_change_percent: percent_change(current_total, previous_total),
            resolved_change: current_resolved - previous_resolved,
            resolved_change_percent: percent_change(current_resolved, previous_resolved),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tag::Tag;
    use crate::models::user::UserRole;
    use crate::repositories::activity::MockActivityRepositoryTrait;
    use crate::repositories::incident::MockIncidentRepositoryTrait;
    use crate::services::test_support::{incident_by, lazy_pool, user};

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .expect("timestamp")
            .with_timezone(&Utc)
    }

    fn created(at_time: DateTime<Utc>, status: IncidentStatus, severity: Severity) -> Incident {
        let mut incident = incident_by(&user(UserRole::Editor));
        incident.created_at = at_time;
        incident.detected_at = at_time;
        incident.status = status;
        incident.severity = severity;
        incident
    }

    #[test]
    fn percent_change_edges() {
        assert_eq!(percent_change(0, 0), 0.0);
        assert_eq!(percent_change(3, 0), 100.0);
        assert_eq!(percent_change(5, 10), -50.0);
        assert_eq!(percent_change(15, 10), 50.0);
    }

    #[test]
    fn summary_groups_open_and_investigating() {
        let now = Utc::now();
        let incidents = vec![
            created(now, IncidentStatus::Open, Severity::Critical),
            created(now, IncidentStatus::Investigating, Severity::Low),
            created(now, IncidentStatus::Resolved, Severity::Critical),
            created(now, IncidentStatus::Closed, Severity::High),
        ];
        let summary = summarize(&incidents);
        assert_eq!(summary.total_incidents, 4);
        assert_eq!(summary.new_incidents, 4);
        assert_eq!(summary.open_incidents, 2);
        assert_eq!(summary.resolved_incidents, 1);
        assert_eq!(summary.critical_incidents, 2);
    }

    #[test]
    fn daily_trend_skips_empty_days() {
        let incidents = vec![
            created(at("2026-02-03T10:00:00Z"), IncidentStatus::Open, Severity::Low),
            created(at("2026-02-01T10:00:00Z"), IncidentStatus::Open, Severity::Low),
            created(at("2026-02-03T23:00:00Z"), IncidentStatus::Open, Severity::Low),
        ];
        assert_eq!(
            daily_trend(&incidents),
            vec![
                TrendPoint { date: "2026-02-01".into(), count: 1 },
                TrendPoint { date: "2026-02-03".into(), count: 2 },
            ]
        );
    }

    #[test]
    fn mtta_ignores_incidents_without_response() {
        let first = created(at("2026-02-01T10:00:00Z"), IncidentStatus::Open, Severity::Low);
        let second = created(at("2026-02-01T10:00:00Z"), IncidentStatus::Open, Severity::Low);
        let responses = vec![
            (first.id, at("2026-02-01T11:30:00Z")),
            (IncidentId::new(), at("2026-02-01T20:00:00Z")),
        ];
        let mtta = mean_time_to_acknowledge(&[first, second], &responses);
        assert!((mtta - 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn monthly_report_rejects_invalid_month() {
        let service = ReportService::with_repositories(
            lazy_pool(),
            Arc::new(MockIncidentRepositoryTrait::new()),
            Arc::new(MockActivityRepositoryTrait::new()),
        );
        let result = service
            .monthly(&MonthlyReportQuery {
                year: Some(2026),
                month: Some(13),
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn custom_report_requires_ordered_range() {
        let service = ReportService::with_repositories(
            lazy_pool(),
            Arc::new(MockIncidentRepositoryTrait::new()),
            Arc::new(MockActivityRepositoryTrait::new()),
        );
        let result = service
            .custom(&CustomReportQuery {
                start_date: at("2026-02-10T00:00:00Z"),
                end_date: at("2026-02-01T00:00:00Z"),
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn monthly_report_compares_with_previous_month() {
        let mut resolved = created(
            at("2026-02-10T08:00:00Z"),
            IncidentStatus::Resolved,
            Severity::High,
        );
        resolved.resolved_at = Some(at("2026-02-10T12:00:00Z"));
        let current = vec![
            resolved.clone(),
            created(at("2026-02-11T08:00:00Z"), IncidentStatus::Open, Severity::Critical),
        ];
        let previous = vec![created(
            at("2026-01-20T08:00:00Z"),
            IncidentStatus::Open,
            Severity::Low,
        )];
        let tag = Tag::new("database".into(), None);

        let mut incidents = MockIncidentRepositoryTrait::new();
        let current_rows = current.clone();
        incidents
            .expect_find_created_between()
            .withf(|_, start, _| *start == at("2026-02-01T00:00:00Z"))
            .returning(move |_, _, _| Ok(current_rows.clone()));
        incidents
            .expect_find_created_between()
            .withf(|_, start, _| *start != at("2026-02-01T00:00:00Z"))
            .returning(move |_, _, _| Ok(previous.clone()));
        let link = (resolved.id, tag.clone());
        incidents
            .expect_tag_links()
            .returning(move |_, _| Ok(vec![link.clone()]));
        let mut activities = MockActivityRepositoryTrait::new();
        let response = (resolved.id, at("2026-02-10T08:30:00Z"));
        activities
            .expect_first_responses()
            .returning(move |_, _| Ok(vec![response]));

        let report = ReportService::with_repositories(
            lazy_pool(),
            Arc::new(incidents),
            Arc::new(activities),
        )
        .monthly(&MonthlyReportQuery {
            year: Some(2026),
            month: Some(2),
        })
        .await
        .expect("report");

        assert_eq!(report.period.end_date, at("2026-02-28T23:59:59Z"));
        assert_eq!(report.summary.total_incidents, 2);
        assert_eq!(report.top_tags.len(), 1);
        assert_eq!(report.top_tags[0].count, 1);
        assert!((report.performance_metrics.average_resolution_hours - 4.0).abs() < 1e-9);
        assert!((report.performance_metrics.mean_time_to_acknowledge_hours - 0.5).abs() < 1e-9);
        assert_eq!(report.comparison.previous_total, 1);
        assert_eq!(report.comparison.total_change, 1);
        assert_eq!(report.comparison.total_change_percent, 100.0);
        assert_eq!(report.comparison.resolved_change_percent, 100.0);
        assert_eq!(report.comparison.previous_period.month, Some(1));
    }
}
