//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 端到端：BatchAccumulator -> DispatchBus -> WorkerPool -> consumer
//! - 关闭流程：刷出、排空、幂等

#[cfg(test)]
mod contract_tests {
    use contracts::{Batch, ConfigVersion, PipelineBlueprint, SealReason};

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = ConfigVersion::V1;
    }

    #[test]
    fn test_render_format() {
        let created_at = "2024-01-01T00:00:00Z".parse().unwrap();
        let batch = Batch::new(1, vec!["cmd1".into(), "cmd2".into()], created_at).unwrap();
        assert_eq!(batch.render(), "bulk: cmd1, cmd2\n");
        assert!(Batch::new(2, vec![], created_at).is_none());
        assert_eq!(SealReason::GroupClosed.as_str(), "group_closed");
    }

    #[test]
    fn test_default_wiring_is_valid() {
        let blueprint = PipelineBlueprint::default_for(3);
        assert!(config_loader::ConfigLoader::validate(&blueprint).is_ok());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashSet;
    use std::num::NonZeroUsize;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use batcher::BatchAccumulator;
    use contracts::{Batch, BatchConsumer, ContractError};
    use dispatcher::{
        DispatchBus, DispatcherBuilder, DispatcherError, ShutdownCoordinator, ShutdownReport,
        ShutdownState,
    };

    /// A consumed batch as seen by a consumer
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Seen {
        worker: String,
        seq: u64,
        commands: Vec<String>,
    }

    /// Records every batch it consumes, optionally slowly
    struct Recording {
        name: String,
        delay: Duration,
        seen: Mutex<Vec<Seen>>,
    }

    impl Recording {
        fn new(name: &str) -> Arc<Self> {
            Self::slow(name, Duration::ZERO)
        }

        fn slow(name: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                delay,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<Seen> {
            self.seen.lock().unwrap().clone()
        }

        fn batches(&self) -> Vec<Vec<String>> {
            self.seen().into_iter().map(|s| s.commands).collect()
        }

        fn seqs(&self) -> Vec<u64> {
            self.seen().into_iter().map(|s| s.seq).collect()
        }
    }

    impl BatchConsumer for Recording {
        fn name(&self) -> &str {
            &self.name
        }

        fn consume(&self, batch: &Batch) -> Result<(), ContractError> {
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            let worker = thread::current().name().unwrap_or_default().to_string();
            self.seen.lock().unwrap().push(Seen {
                worker,
                seq: batch.seq(),
                commands: batch.commands().to_vec(),
            });
            Ok(())
        }
    }

    /// Fails every other batch and panics on the third
    struct Unreliable {
        attempts: Mutex<u64>,
    }

    impl BatchConsumer for Unreliable {
        fn name(&self) -> &str {
            "unreliable"
        }

        fn consume(&self, batch: &Batch) -> Result<(), ContractError> {
            *self.attempts.lock().unwrap() += 1;
            match batch.seq() {
                3 => panic!("consumer bug"),
                seq if seq % 2 == 0 => Err(ContractError::consumer_write("unreliable", seq, "disk full")),
                _ => Ok(()),
            }
        }
    }

    type PoolSpec = (Arc<dyn BatchConsumer>, Vec<&'static str>);

    fn pool<C: BatchConsumer + 'static>(consumer: &Arc<C>, workers: &[&'static str]) -> PoolSpec {
        let consumer: Arc<dyn BatchConsumer> = consumer.clone();
        (consumer, workers.to_vec())
    }

    fn setup(
        capacity: usize,
        consumers: Vec<PoolSpec>,
    ) -> (BatchAccumulator<DispatchBus>, ShutdownCoordinator) {
        let mut builder = DispatcherBuilder::new(vec![]);
        for (consumer, workers) in consumers {
            let names = workers.into_iter().map(String::from).collect();
            builder = builder.with_consumer(consumer, names);
        }
        let (bus, coordinator) = builder.build().unwrap().split();
        let accumulator = BatchAccumulator::new(NonZeroUsize::new(capacity).unwrap(), bus);
        (accumulator, coordinator)
    }

    /// Feed every line, then shut down
    fn run(
        capacity: usize,
        lines: &[&str],
        consumers: Vec<PoolSpec>,
    ) -> ShutdownReport {
        let (mut accumulator, coordinator) = setup(capacity, consumers);
        for line in lines {
            accumulator.observe(line);
        }
        coordinator.shutdown(&mut accumulator).unwrap().unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_reference_example() {
        let printer = Recording::new("printer");
        run(
            3,
            &["a", "b", "{", "c", "d", "}", "e", "f", "g", "h"],
            vec![pool(&printer, &["log"])],
        );

        assert_eq!(
            printer.batches(),
            vec![
                strings(&["a", "b"]),
                strings(&["c", "d"]),
                strings(&["e", "f", "g"]),
                strings(&["h"]),
            ]
        );
    }

    #[test]
    fn test_capacity_batches_without_markers() {
        let printer = Recording::new("printer");
        let lines: Vec<String> = (1..=10).map(|i| format!("cmd{i}")).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        run(3, &refs, vec![pool(&printer, &["p"])]);

        let sizes: Vec<usize> = printer.batches().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 3, 1]);
        let flattened: Vec<String> = printer.batches().concat();
        assert_eq!(flattened, lines);
    }

    #[test]
    fn test_group_ignores_capacity() {
        let printer = Recording::new("printer");
        run(
            2,
            &["{", "c1", "c2", "c3", "c4", "c5", "}"],
            vec![pool(&printer, &["p"])],
        );
        assert_eq!(printer.batches(), vec![strings(&["c1", "c2", "c3", "c4", "c5"])]);
    }

    #[test]
    fn test_nested_groups_seal_on_outer_close() {
        let printer = Recording::new("printer");
        run(
            1,
            &["{", "{", "c1", "}", "c2", "}"],
            vec![pool(&printer, &["p"])],
        );
        assert_eq!(printer.batches(), vec![strings(&["c1", "c2"])]);
    }

    #[test]
    fn test_group_start_flushes_partial_batch() {
        let printer = Recording::new("printer");
        run(
            5,
            &["a", "b", "{", "c", "}"],
            vec![pool(&printer, &["p"])],
        );
        assert_eq!(printer.batches(), vec![strings(&["a", "b"]), strings(&["c"])]);
    }

    #[test]
    fn test_unmatched_end_and_empty_group() {
        let printer = Recording::new("printer");
        run(
            3,
            &["}", "a", "{", "}", "b", "}", "c"],
            vec![pool(&printer, &["p"])],
        );
        // `{` flushes [a]; the empty group yields nothing
        assert_eq!(printer.batches(), vec![strings(&["a"]), strings(&["b", "c"])]);
    }

    #[test]
    fn test_every_consumer_gets_every_batch_in_order() {
        let printer = Recording::new("printer");
        let audit = Recording::slow("audit", Duration::from_millis(1));
        let lines: Vec<String> = (0..50).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();

        let report = run(
            2,
            &refs,
            vec![
                pool(&printer, &["printer-1"]),
                pool(&audit, &["audit-1"]),
            ],
        );

        let expected: Vec<u64> = (1..=25).collect();
        assert_eq!(printer.seqs(), expected);
        assert_eq!(audit.seqs(), expected);
        assert_eq!(printer.batches(), audit.batches());
        assert_eq!(report.pool("audit").unwrap().total_batches(), 25);
    }

    #[test]
    fn test_multi_worker_pool_delivers_exactly_once() {
        let saver = Recording::slow("saver", Duration::from_millis(1));
        let lines: Vec<String> = (0..90).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();

        let report = run(3, &refs, vec![pool(&saver, &["_saver1", "_saver2"])]);

        let seen = saver.seen();
        assert_eq!(seen.len(), 30);
        let unique: HashSet<u64> = seen.iter().map(|s| s.seq).collect();
        assert_eq!(unique, (1..=30).collect());
        assert!(seen
            .iter()
            .all(|s| s.worker == "_saver1" || s.worker == "_saver2"));

        let per_worker: u64 = report.workers().map(|(_, s)| s.batches).sum();
        assert_eq!(per_worker, 30);
        let commands: u64 = report.workers().map(|(_, s)| s.commands).sum();
        assert_eq!(commands, 90);
    }

    #[test]
    fn test_shutdown_drains_backlog_and_flushes_partial() {
        let slow = Recording::slow("slow", Duration::from_millis(5));
        let (mut accumulator, coordinator) = setup(1, vec![pool(&slow, &["slow-1"])]);

        for i in 0..20 {
            accumulator.observe(&i.to_string());
        }
        // Open group left dangling at end of input
        accumulator.observe("{");
        accumulator.observe("tail");

        let report = coordinator.shutdown(&mut accumulator).unwrap().unwrap();
        assert_eq!(report.flushed_seq, Some(21));
        assert_eq!(accumulator.depth(), 0);
        assert_eq!(slow.seqs(), (1..=21).collect::<Vec<_>>());
        assert_eq!(slow.batches().last().unwrap(), &strings(&["tail"]));
        assert_eq!(accumulator.publisher().rejected(), 0);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let printer = Recording::new("printer");
        let (mut accumulator, coordinator) = setup(10, vec![pool(&printer, &["p"])]);
        accumulator.observe("only");

        assert!(coordinator.shutdown(&mut accumulator).unwrap().is_some());
        assert!(coordinator.shutdown(&mut accumulator).unwrap().is_none());
        assert_eq!(coordinator.state(), ShutdownState::Stopped);
        assert_eq!(printer.batches(), vec![strings(&["only"])]);
    }

    #[test]
    fn test_consumer_failures_are_contained() {
        let unreliable = Arc::new(Unreliable {
            attempts: Mutex::new(0),
        });
        let printer = Recording::new("printer");
        let lines: Vec<String> = (0..6).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();

        let report = run(
            1,
            &refs,
            vec![
                pool(&unreliable, &["u-1"]),
                pool(&printer, &["p-1"]),
            ],
        );

        assert_eq!(*unreliable.attempts.lock().unwrap(), 6);
        assert_eq!(printer.seqs(), vec![1, 2, 3, 4, 5, 6]);
        let pool = report.pool("unreliable").unwrap();
        assert_eq!(pool.total_batches(), 6);
        // 2, 4, 6 fail and 3 panics
        assert_eq!(pool.total_failures(), 4);
    }

    #[test]
    fn test_drain_timeout_reports_stuck_worker() {
        let stuck = Recording::slow("stuck", Duration::from_millis(300));
        let (bus, coordinator) = DispatcherBuilder::new(vec![])
            .with_consumer(stuck, vec!["stuck-1".to_string()])
            .with_drain_timeout(Some(Duration::from_millis(30)))
            .build()
            .unwrap()
            .split();
        let mut accumulator = BatchAccumulator::new(NonZeroUsize::MIN, bus);
        accumulator.observe("x");

        match coordinator.shutdown(&mut accumulator) {
            Err(DispatcherError::DrainTimeout { workers, .. }) => {
                assert_eq!(workers, vec!["stuck-1".to_string()])
            }
            other => panic!("expected drain timeout, got {other:?}"),
        }
        assert_eq!(coordinator.state(), ShutdownState::Stopped);
    }

    #[tokio::test]
    async fn test_trigger_then_shutdown_on_blocking_task() {
        let printer = Recording::new("printer");
        let (mut accumulator, coordinator) = setup(4, vec![pool(&printer, &["p"])]);
        let trigger = coordinator.trigger();

        let signal = {
            let trigger = trigger.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                trigger.fire()
            })
        };

        accumulator.observe("a");
        accumulator.observe("b");
        trigger.fired().await;
        assert!(signal.await.unwrap());
        assert!(!trigger.fire());

        let report = tokio::task::spawn_blocking(move || coordinator.shutdown(&mut accumulator))
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(report.flushed_seq, Some(1));
        assert_eq!(printer.batches(), vec![strings(&["a", "b"])]);
    }
}

#[cfg(test)]
mod config_e2e_tests {
    use std::fs;
    use std::io::Write;

    use batcher::BatchAccumulator;
    use config_loader::ConfigLoader;
    use dispatcher::create_dispatcher;

    #[test]
    fn test_file_consumers_from_config() {
        let out = tempfile::tempdir().unwrap();
        let config = format!(
            r#"
[batching]
capacity = 2
group_start = "BEGIN"
group_end = "END"

[[consumers]]
name = "audit"
consumer_type = "log"

[[consumers]]
name = "saver"
consumer_type = "file"
workers = 2
worker_names = ["_saver1", "_saver2"]
[consumers.params]
output_dir = "{}"
"#,
            out.path().display().to_string().replace('\\', "/")
        );
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(config.as_bytes()).unwrap();

        let blueprint = ConfigLoader::load_from_path(file.path()).unwrap();
        let (bus, coordinator) = create_dispatcher(
            blueprint.consumers.clone(),
            blueprint.shutdown.drain_timeout(),
        )
        .unwrap()
        .split();
        let mut accumulator = BatchAccumulator::from_config(&blueprint.batching, bus).unwrap();

        for line in ["a", "b", "c", "BEGIN", "d", "e", "f", "END", "{"] {
            accumulator.observe(line);
        }
        let report = coordinator.shutdown(&mut accumulator).unwrap().unwrap();

        // [a,b] [c] [d,e,f] [{]
        let saver = report.pool("saver").unwrap();
        assert_eq!(saver.total_batches(), 4);

        let mut contents: Vec<String> = fs::read_dir(out.path())
            .unwrap()
            .map(|e| fs::read_to_string(e.unwrap().path()).unwrap())
            .collect();
        contents.sort();
        assert_eq!(
            contents,
            vec![
                "bulk: a, b\n".to_string(),
                "bulk: c\n".to_string(),
                "bulk: d, e, f\n".to_string(),
                "bulk: {\n".to_string(),
            ]
        );

        let mut names: Vec<String> = fs::read_dir(out.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert!(names.iter().all(|n| n.starts_with("bulk") && n.ends_with(".log")));
        assert!(names
            .iter()
            .all(|n| n.contains("__saver1_") || n.contains("__saver2_")));
    }
}
