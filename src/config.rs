//! A `Settings` struct loaded from a TOML file plus environment-variable
//! overrides (prefix `FLCOORD`, `__` separator). Validated once at load
//! time so a misconfigured aggregation rule or scheduling protocol is a
//! fatal, reported setup error rather than a panic deep inside the round
//! engine.

use crate::{
    dispatch::client::Optimizer,
    params::{
        AggregationRule, CommunicationSpecs, ControllerParams, GlobalModelSpecs, ModelHyperparams,
        Protocol, ProtocolSpecs,
    },
};
use config::{Config, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct ControllerSettings {
    pub batch_size: u32,
    pub epochs: u32,
    pub optimizer: String,
    pub percent_validation: f32,
    pub aggregation_rule: String,
    pub fhe_scheme: Option<String>,
    pub protocol: String,
    pub semi_sync_lambda: f64,
    pub semi_sync_recompute_num_updates: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    pub bind_address: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub filter: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub controller: ControllerSettings,
    pub api: ApiSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Loads `<config_path>` and layers `FLCOORD__*` environment overrides on
    /// top, then validates the resulting `ControllerParams` before returning.
    pub fn load(config_path: &str) -> Result<Self, String> {
        let mut raw = Config::new();
        raw.merge(File::with_name(config_path))
            .map_err(|err| err.to_string())?;
        raw.merge(Environment::with_prefix("FLCOORD").separator("__"))
            .map_err(|err| err.to_string())?;
        let settings: Settings = raw.try_into().map_err(|err| err.to_string())?;
        settings.controller_params()?;
        Ok(settings)
    }

    /// Maps the deserialized string enums onto `ControllerParams`, failing
    /// loudly on anything the round engine can't act on.
    pub fn controller_params(&self) -> Result<ControllerParams, String> {
        let optimizer = match self.controller.optimizer.to_lowercase().as_str() {
            "sgd" => Optimizer::Sgd,
            "adam" => Optimizer::Adam,
            other => return Err(format!("unknown optimizer: {}", other)),
        };
        let aggregation_rule = match self.controller.aggregation_rule.to_lowercase().as_str() {
            "fedavg" => AggregationRule::FedAvg,
            "pwa" => AggregationRule::Pwa,
            other => return Err(format!("unknown aggregation rule: {}", other)),
        };
        let protocol = match self.controller.protocol.to_lowercase().as_str() {
            "synchronous" => Protocol::Synchronous,
            "semi_synchronous" | "semi-synchronous" => Protocol::SemiSynchronous,
            "asynchronous" => Protocol::Asynchronous,
            other => return Err(format!("unknown protocol: {}", other)),
        };

        let params = ControllerParams {
            model_hyperparams: ModelHyperparams {
                batch_size: self.controller.batch_size,
                epochs: self.controller.epochs,
                optimizer,
                percent_validation: self.controller.percent_validation,
            },
            global_model_specs: GlobalModelSpecs {
                aggregation_rule,
                fhe_scheme: self.controller.fhe_scheme.clone(),
            },
            communication_specs: CommunicationSpecs {
                protocol,
                protocol_specs: ProtocolSpecs {
                    semi_sync_lambda: self.controller.semi_sync_lambda,
                    semi_sync_recompute_num_updates: self.controller.semi_sync_recompute_num_updates,
                },
            },
        };
        params.validate()?;
        Ok(params)
    }
}
