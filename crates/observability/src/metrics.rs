//! 分批与分发指标收集模块
//!
//! 基于 Batch / SealReason 收集和统计管道的运行指标。

use contracts::{Batch, SealReason};
use metrics::{counter, gauge, histogram};

/// 输入行类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Command,
    GroupStart,
    GroupEnd,
}

impl LineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::GroupStart => "group_start",
            Self::GroupEnd => "group_end",
        }
    }
}

/// 记录一行输入
pub fn record_line(kind: LineKind) {
    counter!("bulkmt_lines_total", "kind" => kind.as_str()).increment(1);
}

/// 记录一次封批
///
/// 每次 accumulator 产生 Batch 时调用。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_batch_sealed;
///
/// record_batch_sealed(&batch, SealReason::Capacity);
/// ```
pub fn record_batch_sealed(batch: &Batch, reason: SealReason) {
    counter!("bulkmt_batches_sealed_total", "reason" => reason.as_str()).increment(1);
    histogram!("bulkmt_batch_size").record(batch.len() as f64);
    gauge!("bulkmt_last_batch_seq").set(batch.seq() as f64);
}

/// 记录消费结果
pub fn record_batch_consumed(consumer: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "bulkmt_batches_consumed_total",
        "consumer" => consumer.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 记录停止后被拒绝的推送
pub fn record_batch_rejected(consumer: &str) {
    counter!(
        "bulkmt_batches_rejected_total",
        "consumer" => consumer.to_string()
    )
    .increment(1);
}

/// 记录队列深度
pub fn record_queue_depth(consumer: &str, depth: usize) {
    gauge!(
        "bulkmt_queue_depth",
        "consumer" => consumer.to_string()
    )
    .set(depth as f64);
}

/// 分批指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct BatchMetricsAggregator {
    /// 总批数
    pub total_batches: u64,

    /// 总命令数
    pub total_commands: u64,

    /// 各封批原因计数
    pub reason_counts: std::collections::HashMap<SealReason, u64>,

    /// 批大小统计
    pub size_stats: RunningStats,
}

impl BatchMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, batch: &Batch, reason: SealReason) {
        self.total_batches += 1;
        self.total_commands += batch.len() as u64;
        *self.reason_counts.entry(reason).or_insert(0) += 1;
        self.size_stats.push(batch.len() as f64);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_batches: self.total_batches,
            total_commands: self.total_commands,
            reason_counts: self.reason_counts.clone(),
            batch_size: StatsSummary::from(&self.size_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_batches: u64,
    pub total_commands: u64,
    pub reason_counts: std::collections::HashMap<SealReason, u64>,
    pub batch_size: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Batch Metrics Summary ===")?;
        writeln!(f, "Total batches: {}", self.total_batches)?;
        writeln!(f, "Total commands: {}", self.total_commands)?;
        writeln!(f, "Batch size: {}", self.batch_size)?;

        if !self.reason_counts.is_empty() {
            writeln!(f, "Seal reasons:")?;
            let mut reasons: Vec<_> = self.reason_counts.iter().collect();
            reasons.sort_by_key(|(reason, _)| reason.as_str());
            for (reason, count) in reasons {
                writeln!(f, "  {}: {}", reason, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.0}, max={:.0}, mean={:.2}, std={:.2} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}
