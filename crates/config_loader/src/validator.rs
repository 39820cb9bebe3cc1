//! 配置校验模块
//!
//! 校验规则：
//! - capacity > 0
//! - 分组标记非空且互不相同
//! - 至少一个消费者
//! - consumer name 非空且唯一
//! - workers > 0，worker_names 长度匹配且唯一

use std::collections::HashSet;

use contracts::{ContractError, PipelineBlueprint};

/// 校验 PipelineBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    validate_batching(blueprint)?;
    validate_consumer_names(blueprint)?;
    validate_workers(blueprint)?;
    Ok(())
}

/// 校验分批配置
fn validate_batching(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let batching = &blueprint.batching;
    batching.non_zero_capacity()?;

    if batching.group_start.is_empty() || batching.group_end.is_empty() {
        return Err(ContractError::config_validation(
            "batching.group_start / batching.group_end",
            "group markers cannot be empty",
        ));
    }

    if batching.group_start == batching.group_end {
        return Err(ContractError::config_validation(
            "batching.group_start / batching.group_end",
            format!(
                "group markers must differ, both are '{}'",
                batching.group_start
            ),
        ));
    }

    Ok(())
}

/// 校验消费者名称唯一性
fn validate_consumer_names(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    if blueprint.consumers.is_empty() {
        return Err(ContractError::config_validation(
            "consumers",
            "at least one consumer is required",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, consumer) in blueprint.consumers.iter().enumerate() {
        if consumer.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("consumers[{}].name", idx),
                "consumer name cannot be empty",
            ));
        }
        if !seen.insert(&consumer.name) {
            return Err(ContractError::config_validation(
                format!("consumers[name={}]", consumer.name),
                "duplicate consumer name",
            ));
        }
    }
    Ok(())
}

/// 校验工作线程配置
fn validate_workers(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    for consumer in &blueprint.consumers {
        if consumer.workers == 0 {
            return Err(ContractError::config_validation(
                format!("consumers[{}].workers", consumer.name),
                "workers must be > 0",
            ));
        }

        if consumer.worker_names.is_empty() {
            continue;
        }

        if consumer.worker_names.len() != consumer.workers {
            return Err(ContractError::config_validation(
                format!("consumers[{}].worker_names", consumer.name),
                format!(
                    "expected {} worker names, got {}",
                    consumer.workers,
                    consumer.worker_names.len()
                ),
            ));
        }

        let mut seen = HashSet::new();
        for worker in &consumer.worker_names {
            if worker.is_empty() || !seen.insert(worker) {
                return Err(ContractError::config_validation(
                    format!("consumers[{}].worker_names", consumer.name),
                    format!("worker name '{}' is empty or duplicate", worker),
                ));
            }
        }
    }
    Ok(())
}
