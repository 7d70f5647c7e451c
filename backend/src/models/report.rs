use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

use crate::models::stats::TrendPoint;
use crate::types::TagId;

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct MonthlyReportQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema)]
pub struct CustomReportQuery {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReportPeriod {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReportSummary {
    pub total_incidents: i64,
    pub new_incidents: i64,
    pub resolved_incidents: i64,
    /// Open plus investigating.
    pub open_incidents: i64,
    pub critical_incidents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TagCount {
    pub tag_id: TagId,
    pub tag_name: String,
    pub tag_color: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PerformanceMetrics {
    pub average_resolution_hours: f64,
    pub median_resolution_hours: f64,
    pub sla_compliance_rate: f64,
    /// Mean hours from creation to the first follow-up activity.
    pub mean_time_to_acknowledge_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PeriodComparison {
    pub previous_period: ReportPeriod,
    pub previous_total: i64,
    pub previous_resolved: i64,
    pub total_change: i64,
    pub total_change_percent: f64,
    pub resolved_change: i64,
    pub resolved_change_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IncidentReport {
    pub period: ReportPeriod,
    pub summary: ReportSummary,
    pub severity_breakdown: BTreeMap<String, i64>,
    pub status_breakdown: BTreeMap<String, i64>,
    pub daily_trend: Vec<TrendPoint>,
    pub top_tags: Vec<TagCount>,
    pub performance_metrics: PerformanceMetrics,
    pub comparison: PeriodComparison,
}
