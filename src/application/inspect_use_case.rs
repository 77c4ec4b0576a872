// ============================================================
// Layer 2 - InspectUseCase
// ============================================================
// Prints what a configuration would build without allocating a
// single tensor: the layer plan with every feature-map shape,
// the trainable parameter count and the model identifier.

use anyhow::Result;

use crate::domain::config::NetworkConfig;
use crate::infra::lifecycle::model_identifier;
use crate::ml::topology::TopologyPlan;

#[derive(Debug, Clone)]
pub struct InspectConfig {
    pub network:    NetworkConfig,
    pub data_shape: Vec<usize>,
    pub n_classes:  usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InspectReport {
    pub model_identifier: String,
    pub trainable_params: usize,
    pub final_features:   usize,
    pub summary:          String,
}

pub struct InspectUseCase {
    config: InspectConfig,
}

impl InspectUseCase {
    pub fn new(config: InspectConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<InspectReport> {
        let cfg = &self.config;
        cfg.network.validate()?;

        let plan = TopologyPlan::plan(&cfg.network.hyper, &cfg.data_shape, cfg.n_classes)?;
        Ok(InspectReport {
            model_identifier: model_identifier(&cfg.network.hyper, &cfg.network.dataset)?,
            trainable_params: plan.trainable_params(),
            final_features:   plan.final_features(),
            summary:          plan.summary(),
        })
    }
}
