//! Performance history analysis over per-job analytics samples.
//!
//! Samples are bucketed into a time series, summarized, regressed for
//! trends, and screened for anomalies. All inputs and outputs are
//! request-scoped; nothing is cached between calls.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// One timestamped utilization sample for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSample {
    pub job_id: u32,
    pub timestamp: DateTime<Utc>,
    /// CPU utilization percent.
    pub cpu: f64,
    /// Memory utilization percent.
    pub memory: f64,
    /// Combined read+write bandwidth, MB/s.
    pub io: f64,
    /// Overall efficiency percent.
    pub efficiency: f64,
}

/// Bucketing interval for the time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    Hourly,
    SixHourly,
    Daily,
    Weekly,
}

impl Interval {
    pub fn seconds(&self) -> i64 {
        match self {
            Interval::Hourly => 3_600,
            Interval::SixHourly => 6 * 3_600,
            Interval::Daily => 24 * 3_600,
            Interval::Weekly => 7 * 24 * 3_600,
        }
    }
}

/// Analysis parameters.
#[derive(Debug, Clone, Default)]
pub struct HistoryOptions {
    /// Drop samples before this instant.
    pub start: Option<DateTime<Utc>>,
    /// Drop samples after this instant.
    pub end: Option<DateTime<Utc>>,
    /// Bucketing interval; auto-selected from the span when `None`.
    pub interval: Option<Interval>,
}

/// Mean utilization within one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cpu: f64,
    pub memory: f64,
    pub io: f64,
    pub efficiency: f64,
}

/// Aggregate statistics for one metric over the snapshot series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct MetricStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

/// Per-metric statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PerformanceStatistics {
    pub cpu: MetricStats,
    pub memory: MetricStats,
    pub io: MetricStats,
    pub efficiency: MetricStats,
}

/// Direction label of a trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Least-squares trend of one metric against elapsed hours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendInfo {
    pub direction: TrendDirection,
    /// Metric units per hour.
    pub slope: f64,
    /// R² floored at zero.
    pub confidence: f64,
    /// Percent change per hour relative to the first value.
    pub change_rate: f64,
}

impl Default for TrendInfo {
    fn default() -> Self {
        TrendInfo {
            direction: TrendDirection::Stable,
            slope: 0.0,
            confidence: 0.0,
            change_rate: 0.0,
        }
    }
}

/// Per-metric trend analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct TrendAnalysis {
    pub cpu: TrendInfo,
    pub memory: TrendInfo,
    pub io: TrendInfo,
    pub efficiency: TrendInfo,
}

/// The metric an anomaly concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cpu,
    Memory,
    Io,
    Efficiency,
}

/// Shape of an anomaly relative to the mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyKind {
    Spike,
    Drop,
}

/// How far outside the threshold an anomaly falls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// One flagged snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub timestamp: DateTime<Utc>,
    pub metric: Metric,
    pub kind: AnomalyKind,
    pub severity: AnomalySeverity,
    pub value: f64,
    pub expected: f64,
}

/// Full analysis output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceHistory {
    pub interval: Interval,
    pub snapshots: Vec<PerformanceSnapshot>,
    pub statistics: PerformanceStatistics,
    /// `None` when fewer than two snapshots exist.
    pub trends: Option<TrendAnalysis>,
    pub anomalies: Vec<Anomaly>,
}

/// Analyze a set of samples.
///
/// Unsorted input is sorted (stably) before anything else; bucketing
/// depends on ascending order and never reopens a closed bucket.
pub fn analyze(mut samples: Vec<AnalyticsSample>, options: &HistoryOptions) -> Result<PerformanceHistory> {
    if samples.is_empty() {
        return Err(Error::validation("samples", "no performance samples provided"));
    }

    samples.sort_by_key(|s| s.timestamp);

    if options.start.is_some() || options.end.is_some() {
        samples.retain(|s| {
            options.start.is_none_or(|start| s.timestamp >= start)
                && options.end.is_none_or(|end| s.timestamp <= end)
        });
        if samples.is_empty() {
            return Err(Error::validation(
                "samples",
                "no samples in the requested time range",
            ));
        }
    }

    let interval = options.interval.unwrap_or_else(|| auto_interval(&samples));
    let snapshots = bucket_samples(&samples, interval);
    let statistics = compute_statistics(&snapshots);
    let trends = analyze_trends(&snapshots);
    let anomalies = detect_anomalies(&snapshots, &statistics);

    Ok(PerformanceHistory {
        interval,
        snapshots,
        statistics,
        trends,
        anomalies,
    })
}

/// Pick a bucketing interval from the sample span: a day of data gets
/// hourly buckets, a week 6-hourly, a month daily, anything longer
/// weekly.
fn auto_interval(samples: &[AnalyticsSample]) -> Interval {
    if samples.len() < 2 {
        return Interval::Hourly;
    }
    let span = samples[samples.len() - 1].timestamp - samples[0].timestamp;
    let day = chrono::Duration::hours(24);
    if span <= day {
        Interval::Hourly
    } else if span <= day * 7 {
        Interval::SixHourly
    } else if span <= day * 30 {
        Interval::Daily
    } else {
        Interval::Weekly
    }
}

fn truncate(timestamp: DateTime<Utc>, interval: Interval) -> DateTime<Utc> {
    let secs = interval.seconds();
    let epoch = timestamp.timestamp() - timestamp.timestamp().rem_euclid(secs);
    Utc.timestamp_opt(epoch, 0).single().unwrap_or(timestamp)
}

/// One forward pass over sorted samples. A bucket closes as soon as a
/// later sample's truncated time advances; it is never reopened.
fn bucket_samples(samples: &[AnalyticsSample], interval: Interval) -> Vec<PerformanceSnapshot> {
    let mut snapshots = Vec::new();
    let mut current: Vec<&AnalyticsSample> = Vec::new();
    let mut current_bucket = truncate(samples[0].timestamp, interval);

    for sample in samples {
        let bucket = truncate(sample.timestamp, interval);
        if bucket > current_bucket && !current.is_empty() {
            snapshots.push(snapshot_of(&current));
            current.clear();
            current_bucket = bucket;
        }
        current.push(sample);
    }
    if !current.is_empty() {
        snapshots.push(snapshot_of(&current));
    }

    snapshots
}

/// A bucket's snapshot: the arithmetic mean of each metric, stamped
/// with the first sample's time.
fn snapshot_of(group: &[&AnalyticsSample]) -> PerformanceSnapshot {
    let count = group.len() as f64;
    PerformanceSnapshot {
        timestamp: group[0].timestamp,
        cpu: group.iter().map(|s| s.cpu).sum::<f64>() / count,
        memory: group.iter().map(|s| s.memory).sum::<f64>() / count,
        io: group.iter().map(|s| s.io).sum::<f64>() / count,
        efficiency: group.iter().map(|s| s.efficiency).sum::<f64>() / count,
    }
}

fn stats_of(values: &[f64]) -> MetricStats {
    if values.is_empty() {
        return MetricStats::default();
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    MetricStats {
        mean,
        min: values.iter().cloned().fold(f64::INFINITY, f64::min),
        max: values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        std_dev: variance.sqrt(),
    }
}

fn compute_statistics(snapshots: &[PerformanceSnapshot]) -> PerformanceStatistics {
    let collect = |f: fn(&PerformanceSnapshot) -> f64| -> Vec<f64> {
        snapshots.iter().map(f).collect()
    };
    PerformanceStatistics {
        cpu: stats_of(&collect(|s| s.cpu)),
        memory: stats_of(&collect(|s| s.memory)),
        io: stats_of(&collect(|s| s.io)),
        efficiency: stats_of(&collect(|s| s.efficiency)),
    }
}

fn analyze_trends(snapshots: &[PerformanceSnapshot]) -> Option<TrendAnalysis> {
    if snapshots.len() < 2 {
        return None;
    }

    let base = snapshots[0].timestamp;
    let hours: Vec<f64> = snapshots
        .iter()
        .map(|s| (s.timestamp - base).num_seconds() as f64 / 3_600.0)
        .collect();
    let series = |f: fn(&PerformanceSnapshot) -> f64| -> Vec<f64> {
        snapshots.iter().map(f).collect()
    };

    Some(TrendAnalysis {
        cpu: trend_of(&hours, &series(|s| s.cpu)),
        memory: trend_of(&hours, &series(|s| s.memory)),
        io: trend_of(&hours, &series(|s| s.io)),
        efficiency: trend_of(&hours, &series(|s| s.efficiency)),
    })
}

/// Ordinary least-squares regression of `y` against `x`, with an
/// R²-derived confidence floored at zero.
fn trend_of(x: &[f64], y: &[f64]) -> TrendInfo {
    let n = x.len() as f64;
    if x.len() != y.len() || x.len() < 2 {
        return TrendInfo::default();
    }

    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();
    let sum_x2: f64 = x.iter().map(|a| a * a).sum();

    let denominator = n * sum_x2 - sum_x * sum_x;
    if denominator == 0.0 {
        return TrendInfo::default();
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;

    let y_mean = sum_y / n;
    let ss_total: f64 = y.iter().map(|v| (v - y_mean) * (v - y_mean)).sum();
    let ss_residual: f64 = x
        .iter()
        .zip(y)
        .map(|(a, v)| {
            let predicted = slope * a + intercept;
            (v - predicted) * (v - predicted)
        })
        .sum();

    let confidence = if ss_total > 0.0 {
        (1.0 - ss_residual / ss_total).max(0.0)
    } else {
        0.0
    };

    let (direction, change_rate) = if slope.abs() > 0.1 {
        let direction = if slope > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        };
        let change_rate = if y[0] != 0.0 { slope / y[0] * 100.0 } else { 0.0 };
        (direction, change_rate)
    } else {
        (TrendDirection::Stable, 0.0)
    };

    TrendInfo {
        direction,
        slope,
        confidence,
        change_rate,
    }
}

/// Severity from how far past the 2-sigma threshold the deviation
/// lands.
fn severity_of(deviation: f64, threshold: f64) -> AnomalySeverity {
    let ratio = deviation / threshold;
    if ratio >= 3.0 {
        AnomalySeverity::Critical
    } else if ratio >= 2.0 {
        AnomalySeverity::High
    } else if ratio >= 1.5 {
        AnomalySeverity::Medium
    } else {
        AnomalySeverity::Low
    }
}

fn detect_anomalies(
    snapshots: &[PerformanceSnapshot],
    statistics: &PerformanceStatistics,
) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    let checks: [(Metric, fn(&PerformanceSnapshot) -> f64, MetricStats); 3] = [
        (Metric::Cpu, |s| s.cpu, statistics.cpu),
        (Metric::Memory, |s| s.memory, statistics.memory),
        (Metric::Io, |s| s.io, statistics.io),
    ];

    for snapshot in snapshots {
        for (metric, value_of, stats) in &checks {
            let value = value_of(snapshot);
            let threshold = stats.std_dev * 2.0;
            let deviation = (value - stats.mean).abs();
            if threshold > 0.0 && deviation > threshold {
                anomalies.push(Anomaly {
                    timestamp: snapshot.timestamp,
                    metric: *metric,
                    kind: if value > stats.mean {
                        AnomalyKind::Spike
                    } else {
                        AnomalyKind::Drop
                    },
                    severity: severity_of(deviation, threshold),
                    value,
                    expected: stats.mean,
                });
            }
        }

        // An efficiency collapse is flagged regardless of variance:
        // below 70% of the overall average is always high severity.
        if snapshot.efficiency < statistics.efficiency.mean * 0.7 {
            anomalies.push(Anomaly {
                timestamp: snapshot.timestamp,
                metric: Metric::Efficiency,
                kind: AnomalyKind::Drop,
                severity: AnomalySeverity::High,
                value: snapshot.efficiency,
                expected: statistics.efficiency.mean,
            });
        }
    }

    anomalies
}
