use crate::dispatch::client::Optimizer;

/// Hyperparameters applied uniformly to every learner's training task.
#[derive(Debug, Clone, Copy)]
pub struct ModelHyperparams {
    pub batch_size: u32,
    pub epochs: u32,
    pub optimizer: Optimizer,
    pub percent_validation: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationRule {
    FedAvg,
    Pwa,
}

#[derive(Debug, Clone)]
pub struct GlobalModelSpecs {
    pub aggregation_rule: AggregationRule,
    /// Name of the FHE scheme to hand to the `Pwa` aggregator; ignored by
    /// `FedAvg`.
    pub fhe_scheme: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Synchronous,
    SemiSynchronous,
    Asynchronous,
}

#[derive(Debug, Clone, Copy)]
pub struct ProtocolSpecs {
    pub semi_sync_lambda: f64,
    pub semi_sync_recompute_num_updates: bool,
}

#[derive(Debug, Clone)]
pub struct CommunicationSpecs {
    pub protocol: Protocol,
    pub protocol_specs: ProtocolSpecs,
}

/// The full set of knobs the Round Engine and its plug-ins are built from.
/// Malformed combinations are rejected at construction, never discovered
/// mid-round.
#[derive(Debug, Clone)]
pub struct ControllerParams {
    pub model_hyperparams: ModelHyperparams,
    pub global_model_specs: GlobalModelSpecs,
    pub communication_specs: CommunicationSpecs,
}

impl ControllerParams {
    /// Validate a setup error that would otherwise surface as a confusing
    /// panic deep inside the round engine.
    pub fn validate(&self) -> Result<(), String> {
        if self.global_model_specs.aggregation_rule == AggregationRule::Pwa
            && self.global_model_specs.fhe_scheme.is_none()
        {
            return Err("PWA aggregation rule requires an fhe_scheme".to_string());
        }
        if self.communication_specs.protocol == Protocol::SemiSynchronous
            && self.communication_specs.protocol_specs.semi_sync_lambda <= 0.0
        {
            return Err("semi_sync_lambda must be > 0 under SEMI_SYNCHRONOUS".to_string());
        }
        if self.model_hyperparams.batch_size == 0 {
            return Err("batch_size must be > 0".to_string());
        }
        Ok(())
    }
}
