use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

use crate::models::incident::Incident;
use crate::types::TagId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrendPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl TrendPeriod {
    /// Unknown periods fall back to daily.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("weekly") => TrendPeriod::Weekly,
            Some("monthly") => TrendPeriod::Monthly,
            _ => TrendPeriod::Daily,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendPeriod::Daily => "daily",
            TrendPeriod::Weekly => "weekly",
            TrendPeriod::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct DashboardQuery {
    pub period: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrendPoint {
    pub date: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardStats {
    pub total_incidents: i64,
    pub by_severity: BTreeMap<String, i64>,
    pub by_status: BTreeMap<String, i64>,
    pub recent_incidents: Vec<Incident>,
    pub trend_period: TrendPeriod,
    pub trend_data: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SlaMetrics {
    pub total_incidents: i64,
    pub sla_met: i64,
    pub sla_violated: i64,
    /// Percentage of settled incidents (resolved or overdue) that met the SLA.
    pub compliance_rate: f64,
    pub average_resolution_hours: f64,
    /// Unresolved incidents inside the last quarter of their SLA window.
    pub at_risk: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TagStat {
    pub tag_id: TagId,
    pub tag_name: String,
    pub tag_color: String,
    pub count: i64,
    pub percentage: f64,
}
