//! End-to-end tests against the Controller facade, using an in-memory
//! `LearnerClient` mock in place of a real transport.

use async_trait::async_trait;
use bytes::Bytes;
use fl_coordinator::{
    common::{AuthToken, LearnerId},
    controller::Controller,
    dispatch::client::{
        EvaluateModelRequest, EvaluateModelResponse, LearnerClient, LearnerClientFactory,
        RunTaskRequest, RunTaskResponse, TransportError,
    },
    model::{CompletedLearningTask, DatasetSpec, EvaluationTriple, ExecutionMetadata, Model, ServerEntity},
    params::{
        AggregationRule, CommunicationSpecs, ControllerParams, GlobalModelSpecs, ModelHyperparams,
        Protocol, ProtocolSpecs,
    },
    plugins::{AsynchronousScheduler, DatasetSizeScaling, FedAvg, ScheduledCardinalitySelector, SynchronousScheduler},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

struct RecordedClient {
    run_task_calls: StdMutex<Vec<RunTaskRequest>>,
    evaluate_calls: StdMutex<Vec<EvaluateModelRequest>>,
    fail_evaluate: bool,
}

impl RecordedClient {
    fn new(fail_evaluate: bool) -> Self {
        Self {
            run_task_calls: StdMutex::new(Vec::new()),
            evaluate_calls: StdMutex::new(Vec::new()),
            fail_evaluate,
        }
    }
}

#[async_trait]
impl LearnerClient for RecordedClient {
    async fn run_task(&self, request: RunTaskRequest) -> Result<RunTaskResponse, TransportError> {
        self.run_task_calls.lock().unwrap().push(request);
        Ok(RunTaskResponse::default())
    }

    async fn evaluate_model(
        &self,
        request: EvaluateModelRequest,
    ) -> Result<EvaluateModelResponse, TransportError> {
        self.evaluate_calls.lock().unwrap().push(request);
        if self.fail_evaluate {
            return Err(TransportError {
                message: "simulated transport failure".to_string(),
            });
        }
        Ok(EvaluateModelResponse {
            evaluations: EvaluationTriple::default(),
        })
    }
}

/// Hands out one `RecordedClient` per `host:port` and keeps a registry the
/// test can inspect after the fact.
struct MockFactory {
    clients: StdMutex<HashMap<String, Arc<RecordedClient>>>,
    fail_evaluate: bool,
}

impl MockFactory {
    fn new(fail_evaluate: bool) -> Arc<Self> {
        Arc::new(Self {
            clients: StdMutex::new(HashMap::new()),
            fail_evaluate,
        })
    }

    fn client_for(&self, host: &str, port: u16) -> Arc<RecordedClient> {
        self.clients
            .lock()
            .unwrap()
            .get(&format!("{}:{}", host, port))
            .cloned()
            .expect("connect() must have been called before inspecting a client")
    }
}

impl LearnerClientFactory for MockFactory {
    fn connect(&self, host: &str, port: u16) -> Arc<dyn LearnerClient> {
        let client = Arc::new(RecordedClient::new(self.fail_evaluate));
        self.clients
            .lock()
            .unwrap()
            .insert(format!("{}:{}", host, port), Arc::clone(&client));
        client
    }
}

fn dataset_spec(num_training_examples: u32) -> DatasetSpec {
    DatasetSpec {
        num_training_examples,
        num_validation_examples: 10,
        num_test_examples: 10,
    }
}

fn endpoint(host: &str, port: u16) -> ServerEntity {
    ServerEntity {
        host: host.to_string(),
        port,
    }
}

fn base_params(protocol: Protocol) -> ControllerParams {
    ControllerParams {
        model_hyperparams: ModelHyperparams {
            batch_size: 10,
            epochs: 2,
            optimizer: fl_coordinator::dispatch::client::Optimizer::Sgd,
            percent_validation: 0.1,
        },
        global_model_specs: GlobalModelSpecs {
            aggregation_rule: AggregationRule::FedAvg,
            fhe_scheme: None,
        },
        communication_specs: CommunicationSpecs {
            protocol,
            protocol_specs: ProtocolSpecs {
                semi_sync_lambda: 2.0,
                semi_sync_recompute_num_updates: false,
            },
        },
    }
}

fn completed_task(global_iteration: u32, ms_per_batch: f64, ms_per_epoch: f64) -> CompletedLearningTask {
    CompletedLearningTask {
        model: Model(Bytes::from(vec![0u8; 4])),
        execution_metadata: ExecutionMetadata {
            global_iteration,
            processing_ms_per_batch: ms_per_batch,
            processing_ms_per_epoch: ms_per_epoch,
        },
    }
}

async fn settle() {
    tokio::time::delay_for(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn asynchronous_single_learner_round() {
    let factory = MockFactory::new(false);
    let controller = Controller::new(
        factory.clone(),
        Arc::new(DatasetSizeScaling),
        Arc::new(FedAvg),
        Arc::new(AsynchronousScheduler),
        Arc::new(ScheduledCardinalitySelector),
        base_params(Protocol::Asynchronous),
    );
    controller
        .replace_community_model(Model(Bytes::from(vec![0u8; 4])))
        .await;

    let descriptor = controller
        .add_learner(endpoint("l1", 1), dataset_spec(100))
        .await
        .expect("admission should succeed");
    settle().await;

    let client = factory.client_for("l1", 1);
    {
        let calls = client.run_task_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].task.num_local_updates, 20);
    }

    controller
        .learner_completed_task(descriptor.id, descriptor.auth_token.clone(), completed_task(1, 10.0, 100.0))
        .await
        .expect("completion should be accepted");
    settle().await;

    assert_eq!(controller.community_model().await.global_iteration, 1);
    let evaluations = controller.get_evaluation_lineage(10).await;
    assert_eq!(evaluations.len(), 1);
    assert_eq!(evaluations[0].global_iteration, 1);
    assert_eq!(client.run_task_calls.lock().unwrap().len(), 2);
    assert_eq!(client.evaluate_calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn synchronous_round_closes_after_all_assigned_report() {
    let factory = MockFactory::new(false);
    let controller = Controller::new(
        factory.clone(),
        Arc::new(DatasetSizeScaling),
        Arc::new(FedAvg),
        Arc::new(SynchronousScheduler),
        Arc::new(ScheduledCardinalitySelector),
        base_params(Protocol::Synchronous),
    );
    controller
        .replace_community_model(Model(Bytes::from(vec![0u8; 4])))
        .await;

    let l1 = controller.add_learner(endpoint("l1", 1), dataset_spec(100)).await.unwrap();
    let l2 = controller.add_learner(endpoint("l2", 2), dataset_spec(100)).await.unwrap();
    let l3 = controller.add_learner(endpoint("l3", 3), dataset_spec(100)).await.unwrap();
    settle().await;

    controller
        .learner_completed_task(l2.id, l2.auth_token.clone(), completed_task(1, 10.0, 100.0))
        .await
        .unwrap();
    settle().await;
    assert_eq!(controller.get_evaluation_lineage(10).await.len(), 0);

    controller
        .learner_completed_task(l1.id, l1.auth_token.clone(), completed_task(1, 10.0, 100.0))
        .await
        .unwrap();
    settle().await;
    assert_eq!(controller.get_evaluation_lineage(10).await.len(), 0);

    controller
        .learner_completed_task(l3.id, l3.auth_token.clone(), completed_task(1, 10.0, 100.0))
        .await
        .unwrap();
    settle().await;

    let evaluations = controller.get_evaluation_lineage(10).await;
    assert_eq!(evaluations.len(), 1);

    let rows = controller.get_runtime_lineage(10).await;
    assert_eq!(rows[0].completed_by_learner_id, vec![l2.id, l1.id, l3.id]);

    for (host, port) in [("l1", 1u16), ("l2", 2), ("l3", 3)] {
        let client = factory.client_for(host, port);
        assert_eq!(client.evaluate_calls.lock().unwrap().len(), 1);
        assert_eq!(client.run_task_calls.lock().unwrap().len(), 2);
    }
}

#[tokio::test]
async fn semi_synchronous_retemplates_by_relative_speed() {
    let factory = MockFactory::new(false);
    let controller = Controller::new(
        factory.clone(),
        Arc::new(DatasetSizeScaling),
        Arc::new(FedAvg),
        Arc::new(SynchronousScheduler),
        Arc::new(ScheduledCardinalitySelector),
        base_params(Protocol::SemiSynchronous),
    );
    controller
        .replace_community_model(Model(Bytes::from(vec![0u8; 4])))
        .await;

    let l1 = controller.add_learner(endpoint("l1", 1), dataset_spec(100)).await.unwrap();
    let l2 = controller.add_learner(endpoint("l2", 2), dataset_spec(100)).await.unwrap();
    settle().await;

    controller
        .learner_completed_task(l1.id, l1.auth_token.clone(), completed_task(1, 10.0, 100.0))
        .await
        .unwrap();
    controller
        .learner_completed_task(l2.id, l2.auth_token.clone(), completed_task(1, 20.0, 400.0))
        .await
        .unwrap();
    settle().await;

    let l1_client = factory.client_for("l1", 1);
    let l2_client = factory.client_for("l2", 2);
    let l1_second_run = &l1_client.run_task_calls.lock().unwrap()[1];
    let l2_second_run = &l2_client.run_task_calls.lock().unwrap()[1];
    assert_eq!(l1_second_run.task.num_local_updates, 80);
    assert_eq!(l2_second_run.task.num_local_updates, 40);
}

#[tokio::test]
async fn remove_learner_rejects_wrong_token() {
    let factory = MockFactory::new(false);
    let controller = Controller::new(
        factory,
        Arc::new(DatasetSizeScaling),
        Arc::new(FedAvg),
        Arc::new(AsynchronousScheduler),
        Arc::new(ScheduledCardinalitySelector),
        base_params(Protocol::Asynchronous),
    );

    let descriptor = controller.add_learner(endpoint("l1", 1), dataset_spec(100)).await.unwrap();

    let err = controller
        .remove_learner(descriptor.id, AuthToken::from_str("wrong"))
        .await
        .unwrap_err();
    assert_eq!(err, fl_coordinator::error::ControllerError::Unauthenticated);
    assert_eq!(controller.get_num_learners().await, 1);
}

#[tokio::test]
async fn evaluate_failure_does_not_stall_the_round() {
    let factory = MockFactory::new(true);
    let controller = Controller::new(
        factory.clone(),
        Arc::new(DatasetSizeScaling),
        Arc::new(FedAvg),
        Arc::new(AsynchronousScheduler),
        Arc::new(ScheduledCardinalitySelector),
        base_params(Protocol::Asynchronous),
    );
    controller
        .replace_community_model(Model(Bytes::from(vec![0u8; 4])))
        .await;

    let descriptor = controller.add_learner(endpoint("l1", 1), dataset_spec(100)).await.unwrap();
    settle().await;

    controller
        .learner_completed_task(descriptor.id, descriptor.auth_token.clone(), completed_task(1, 10.0, 100.0))
        .await
        .unwrap();
    settle().await;

    let evaluations = controller.get_evaluation_lineage(10).await;
    assert_eq!(evaluations.len(), 1);
    assert!(!evaluations[0].evaluations.contains_key(&descriptor.id));

    let rows = controller.get_runtime_lineage(10).await;
    assert_eq!(rows[0].completed_by_learner_id, vec![descriptor.id]);
}

#[tokio::test]
async fn admission_before_a_community_model_is_seeded_does_not_dispatch() {
    let factory = MockFactory::new(false);
    let controller = Controller::new(
        factory.clone(),
        Arc::new(DatasetSizeScaling),
        Arc::new(FedAvg),
        Arc::new(AsynchronousScheduler),
        Arc::new(ScheduledCardinalitySelector),
        base_params(Protocol::Asynchronous),
    );

    controller.add_learner(endpoint("l1", 1), dataset_spec(100)).await.unwrap();
    settle().await;

    let client = factory.client_for("l1", 1);
    assert_eq!(client.run_task_calls.lock().unwrap().len(), 0);
    assert_eq!(controller.get_runtime_lineage(10).await.len(), 0);
}
