//! Plug-in points: pure, stateless policies the round engine consults every
//! round. None of these hold state across calls and none of them are
//! allowed to call back into the Controller.

mod aggregation;
mod scaling;
mod scheduler;
mod selector;

pub use aggregation::{AggregationFunction, FedAvg, FheSchemeHandle, PrivacyPreservingWeightedAvg};
pub use scaling::{DatasetSizeScaling, ScalingFunction};
pub use scheduler::{AsynchronousScheduler, Scheduler, SynchronousScheduler};
pub use selector::{ScheduledCardinalitySelector, Selector};

use crate::params::{AggregationRule, CommunicationSpecs, GlobalModelSpecs, Protocol};
use std::sync::Arc;

/// Picks the aggregation rule named by `specs.aggregation_rule`. Assumes
/// `ControllerParams::validate` has already confirmed an `fhe_scheme` is
/// present for `Pwa`.
pub fn create_aggregator(specs: &GlobalModelSpecs) -> Arc<dyn AggregationFunction> {
    match specs.aggregation_rule {
        AggregationRule::FedAvg => Arc::new(FedAvg),
        AggregationRule::Pwa => {
            let scheme_name = specs
                .fhe_scheme
                .clone()
                .expect("Pwa aggregation rule requires an fhe_scheme; validated at construction");
            Arc::new(PrivacyPreservingWeightedAvg {
                fhe_scheme: FheSchemeHandle { scheme_name },
            })
        }
    }
}

/// Picks the scheduling policy for `specs.protocol`. Both `Synchronous` and
/// `SemiSynchronous` close a round only once every assigned learner has
/// reported; `Asynchronous` schedules each completer immediately.
pub fn create_scheduler(specs: &CommunicationSpecs) -> Arc<dyn Scheduler> {
    match specs.protocol {
        Protocol::Synchronous | Protocol::SemiSynchronous => Arc::new(SynchronousScheduler),
        Protocol::Asynchronous => Arc::new(AsynchronousScheduler),
    }
}

/// The reference selector. No configuration enum picks between variants
/// here, so this always returns the "scheduled cardinality" policy.
pub fn create_selector() -> Arc<dyn Selector> {
    Arc::new(ScheduledCardinalitySelector)
}
