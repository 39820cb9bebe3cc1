//! Dispatcher - builds worker pools from consumer configs and wires them to a bus

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument};

use contracts::{BatchConsumer, ConsumerConfig, ConsumerType};

use crate::bus::DispatchBus;
use crate::error::DispatcherError;
use crate::pool::{PoolReport, WorkerPool};
use crate::shutdown::{ShutdownCoordinator, ShutdownTrigger};
use crate::sinks::{ConsoleSink, FileSink, LogSink};

/// Consumer to spawn: either from config or supplied directly
enum ConsumerSpec {
    Config(ConsumerConfig),
    Custom {
        consumer: Arc<dyn BatchConsumer>,
        worker_names: Vec<String>,
    },
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    consumers: Vec<ConsumerSpec>,
    drain_timeout: Option<Duration>,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(configs: Vec<ConsumerConfig>) -> Self {
        Self {
            consumers: configs.into_iter().map(ConsumerSpec::Config).collect(),
            drain_timeout: None,
        }
    }

    /// Add an already-built consumer (tests, embedding)
    pub fn with_consumer(
        mut self,
        consumer: Arc<dyn BatchConsumer>,
        worker_names: Vec<String>,
    ) -> Self {
        self.consumers.push(ConsumerSpec::Custom {
            consumer,
            worker_names,
        });
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Create consumers, spawn their pools and register queues on a bus
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(consumer_count = self.consumers.len())
    )]
    pub fn build(self) -> Result<Dispatcher, DispatcherError> {
        let pools = Self::initialize_pools(self.consumers)?;

        let mut bus = DispatchBus::new();
        for pool in &pools {
            bus.register(pool.queue());
        }

        let mut coordinator = ShutdownCoordinator::new(pools);
        if let Some(timeout) = self.drain_timeout {
            coordinator = coordinator.with_drain_timeout(timeout);
        }

        info!(consumers = ?bus.consumers(), "Dispatcher started");
        Ok(Dispatcher { bus, coordinator })
    }

    fn initialize_pools(specs: Vec<ConsumerSpec>) -> Result<Vec<WorkerPool>, DispatcherError> {
        let mut pools: Vec<WorkerPool> = Vec::with_capacity(specs.len());
        for spec in specs {
            let spawned = match spec {
                ConsumerSpec::Config(config) => create_consumer(&config)
                    .and_then(|consumer| {
                        WorkerPool::spawn(consumer, config.resolved_worker_names())
                    }),
                ConsumerSpec::Custom {
                    consumer,
                    worker_names,
                } => WorkerPool::spawn(consumer, worker_names),
            };

            match spawned {
                Ok(pool) => pools.push(pool),
                Err(e) => {
                    // Let already started workers exit
                    for pool in &pools {
                        pool.stop();
                    }
                    return Err(e);
                }
            }
        }
        Ok(pools)
    }
}

/// Create a consumer from configuration
#[instrument(
    name = "dispatcher_create_consumer",
    skip(config),
    fields(consumer = %config.name, consumer_type = ?config.consumer_type)
)]
pub fn create_consumer(config: &ConsumerConfig) -> Result<Arc<dyn BatchConsumer>, DispatcherError> {
    match config.consumer_type {
        ConsumerType::Console => Ok(Arc::new(ConsoleSink::new(&config.name))),
        ConsumerType::Log => Ok(Arc::new(LogSink::new(&config.name))),
        ConsumerType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::consumer_creation(&config.name, e.to_string()))?;
            Ok(Arc::new(sink))
        }
    }
}

/// Running dispatcher: the publishing side plus the pools' coordinator
pub struct Dispatcher {
    bus: DispatchBus,
    coordinator: ShutdownCoordinator,
}

impl Dispatcher {
    pub fn bus(&self) -> &DispatchBus {
        &self.bus
    }

    pub fn coordinator(&self) -> &ShutdownCoordinator {
        &self.coordinator
    }

    pub fn trigger(&self) -> ShutdownTrigger {
        self.coordinator.trigger()
    }

    /// Get live counters for all pools
    pub fn metrics(&self) -> Vec<PoolReport> {
        self.coordinator.report()
    }

    /// Hand the bus to the producer and keep the coordinator for shutdown
    pub fn split(self) -> (DispatchBus, ShutdownCoordinator) {
        (self.bus, self.coordinator)
    }
}

/// Convenience function to create a dispatcher from consumer configs
#[instrument(name = "dispatcher_create", skip(consumer_configs))]
pub fn create_dispatcher(
    consumer_configs: Vec<ConsumerConfig>,
    drain_timeout: Option<Duration>,
) -> Result<Dispatcher, DispatcherError> {
    DispatcherBuilder::new(consumer_configs)
        .with_drain_timeout(drain_timeout)
        .build()
}
