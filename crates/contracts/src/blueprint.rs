//! PipelineBlueprint - Config Loader 输出
//!
//! 描述完整的管道配置：分批策略、分组标记、消费者路由、关闭策略。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::ContractError;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的管道配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 分批策略
    pub batching: BatchingConfig,

    /// 关闭策略
    #[serde(default)]
    pub shutdown: ShutdownConfig,

    /// 消费者列表 (按注册顺序分发)
    pub consumers: Vec<ConsumerConfig>,
}

impl PipelineBlueprint {
    /// 默认管道：一个控制台消费者 + 两个工作线程的文件消费者
    pub fn default_for(capacity: usize) -> Self {
        Self {
            version: ConfigVersion::V1,
            batching: BatchingConfig {
                capacity,
                group_start: default_group_start(),
                group_end: default_group_end(),
            },
            shutdown: ShutdownConfig::default(),
            consumers: vec![
                ConsumerConfig::new("printer", ConsumerType::Console, 1),
                ConsumerConfig::new("saver", ConsumerType::File, 2)
                    .with_param("output_dir", "."),
            ],
        }
    }
}

/// 分批配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// 每批命令数上限 (必须 > 0)
    pub capacity: usize,

    /// 分组开始标记
    #[serde(default = "default_group_start")]
    pub group_start: String,

    /// 分组结束标记
    #[serde(default = "default_group_end")]
    pub group_end: String,
}

fn default_group_start() -> String {
    "{".to_string()
}

fn default_group_end() -> String {
    "}".to_string()
}

impl BatchingConfig {
    /// 校验后的容量
    pub fn non_zero_capacity(&self) -> Result<NonZeroUsize, ContractError> {
        NonZeroUsize::new(self.capacity).ok_or_else(|| {
            ContractError::config_validation("batching.capacity", "capacity must be > 0")
        })
    }

    /// 分组标记
    pub fn markers(&self) -> GroupMarkers {
        GroupMarkers {
            start: self.group_start.clone(),
            end: self.group_end.clone(),
        }
    }
}

/// 分组标记对
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMarkers {
    pub start: String,
    pub end: String,
}

impl Default for GroupMarkers {
    fn default() -> Self {
        Self {
            start: default_group_start(),
            end: default_group_end(),
        }
    }
}

/// 关闭配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// 排空超时 (毫秒)，None = 无限等待
    #[serde(default)]
    pub drain_timeout_ms: Option<u64>,
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Option<Duration> {
        self.drain_timeout_ms.map(Duration::from_millis)
    }
}

/// 消费者配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// 消费者名称
    pub name: String,

    /// 消费者类型
    pub consumer_type: ConsumerType,

    /// 工作线程数
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// 工作线程名称 (可选，长度必须等于 workers)
    #[serde(default)]
    pub worker_names: Vec<String>,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_workers() -> usize {
    1
}

impl ConsumerConfig {
    pub fn new(name: impl Into<String>, consumer_type: ConsumerType, workers: usize) -> Self {
        Self {
            name: name.into(),
            consumer_type,
            workers,
            worker_names: Vec::new(),
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// 工作线程身份：显式配置优先，否则为 `<name>-<n>`
    pub fn resolved_worker_names(&self) -> Vec<String> {
        if !self.worker_names.is_empty() {
            return self.worker_names.clone();
        }
        (1..=self.workers)
            .map(|i| format!("{}-{}", self.name, i))
            .collect()
    }
}

/// 消费者类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerType {
    /// 标准输出
    Console,
    /// 文件输出 (每批一个文件)
    File,
    /// tracing 日志
    Log,
}
