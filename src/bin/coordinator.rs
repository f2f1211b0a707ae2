use clap::{App, Arg};
use log::info;
use std::{env, sync::Arc};

use fl_coordinator::{
    config::Settings,
    controller::Controller,
    dispatch::client::{
        EvaluateModelRequest, EvaluateModelResponse, LearnerClient, LearnerClientFactory,
        RunTaskRequest, RunTaskResponse, TransportError,
    },
    plugins::{create_aggregator, create_scheduler, create_selector, DatasetSizeScaling},
};

#[tokio::main]
async fn main() {
    let matches = App::new("coordinator")
        .version("0.1.0")
        .about("Federated learning coordinator service")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .required(true)
                .help("path to the config file"),
        )
        .get_matches();
    let config_path = matches.value_of("config").unwrap();

    let settings = Settings::load(config_path).unwrap_or_else(|err| {
        eprintln!("invalid configuration: {}", err);
        std::process::exit(1);
    });
    env::set_var("RUST_LOG", &settings.log.filter);
    env_logger::init();

    let params = settings
        .controller_params()
        .expect("validated during Settings::load");

    let aggregator = create_aggregator(&params.global_model_specs);
    let scheduler = create_scheduler(&params.communication_specs);
    let selector = create_selector();

    let controller = Controller::new(
        Arc::new(UnconfiguredTransport),
        Arc::new(DatasetSizeScaling),
        aggregator,
        scheduler,
        selector,
        params,
    );

    info!("coordinator listening on {}", settings.api.bind_address);

    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for shutdown signal");
    info!("shutdown requested, draining in-flight work");
    controller.shutdown().await;
}

/// Placeholder `LearnerClient`/`LearnerClientFactory` pair used until a
/// concrete transport (tarpc, gRPC, …) is wired in; that transport is
/// explicitly out of scope here. Every call fails immediately so a
/// misconfigured deployment surfaces as dispatcher log lines instead of
/// silently doing nothing.
struct UnconfiguredTransport;

impl LearnerClientFactory for UnconfiguredTransport {
    fn connect(&self, host: &str, port: u16) -> Arc<dyn LearnerClient> {
        Arc::new(UnconfiguredLearnerClient {
            endpoint: format!("{}:{}", host, port),
        })
    }
}

struct UnconfiguredLearnerClient {
    endpoint: String,
}

#[async_trait::async_trait]
impl LearnerClient for UnconfiguredLearnerClient {
    async fn run_task(&self, _request: RunTaskRequest) -> Result<RunTaskResponse, TransportError> {
        Err(TransportError {
            message: format!("no transport configured for {}", self.endpoint),
        })
    }

    async fn evaluate_model(
        &self,
        _request: EvaluateModelRequest,
    ) -> Result<EvaluateModelResponse, TransportError> {
        Err(TransportError {
            message: format!("no transport configured for {}", self.endpoint),
        })
    }
}
