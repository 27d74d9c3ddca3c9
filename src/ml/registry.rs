//! Model family registry
//!
//! Maps a family to the functions that restore or create its model. The
//! service holds exactly one model; the registry is only consulted at
//! startup.

use std::{collections::HashMap, path::Path};

use tracing::{info, warn};

use super::{ForecastModel, ModelConfig, ModelFamily, NeuralNetworkModel};
use crate::error::{PipelineError, PipelineResult};

type LoadFn = fn(&Path) -> PipelineResult<Box<dyn ForecastModel>>;
type CreateFn = fn(ModelConfig) -> Box<dyn ForecastModel>;

#[derive(Clone, Copy)]
struct ModelEntry {
    load: LoadFn,
    create: CreateFn,
}

pub struct ModelRegistry {
    entries: HashMap<ModelFamily, ModelEntry>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        let mut registry = Self {
            entries: HashMap::new(),
        };
        registry.register(
            ModelFamily::NeuralNetwork,
            |dir| Ok(Box::new(NeuralNetworkModel::load(dir)?)),
            |config| Box::new(NeuralNetworkModel::new(config)),
        );
        registry
    }
}

impl ModelRegistry {
    pub fn register(&mut self, family: ModelFamily, load: LoadFn, create: CreateFn) {
        self.entries.insert(family, ModelEntry { load, create });
    }

    pub fn families(&self) -> Vec<ModelFamily> {
        self.entries.keys().copied().collect()
    }

    fn entry(&self, family: ModelFamily) -> PipelineResult<ModelEntry> {
        self.entries
            .get(&family)
            .copied()
            .ok_or_else(|| PipelineError::UnknownModelFamily(family.to_string()))
    }

    /// Untrained model of `config.family`.
    pub fn create(&self, config: ModelConfig) -> PipelineResult<Box<dyn ForecastModel>> {
        let entry = self.entry(config.family)?;
        Ok((entry.create)(config))
    }

    /// Restore the persisted model from `dir`, or start a fresh one from
    /// `config` when nothing was saved yet. Unreadable artifacts are errors.
    pub fn initialize_model(&self, config: ModelConfig, dir: &Path) -> PipelineResult<Box<dyn ForecastModel>> {
        let entry = self.entry(config.family)?;
        match (entry.load)(dir) {
            Ok(model) => {
                if model.config() != &config {
                    warn!(
                        family = %config.family,
                        "persisted model configuration differs from the configured one, keeping the persisted state"
                    );
                }
                Ok(model)
            }
            Err(PipelineError::ModelNotFound(path)) => {
                info!(path = %path.display(), family = %config.family, "no persisted model, starting untrained");
                Ok((entry.create)(config))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::OutputBounds;
    use strum::IntoEnumIterator;

    fn config() -> ModelConfig {
        ModelConfig::defaults(
            ModelFamily::NeuralNetwork,
            OutputBounds {
                lower: 0.0,
                upper: 40.0,
            },
        )
    }

    #[test]
    fn test_every_family_registered() {
        let registry = ModelRegistry::default();
        for family in ModelFamily::iter() {
            assert!(registry.families().contains(&family));
        }
    }

    #[test]
    fn test_missing_artifact_falls_back_to_fresh_model() {
        let dir = tempfile::tempdir().unwrap();
        let model = ModelRegistry::default()
            .initialize_model(config(), dir.path())
            .unwrap();
        assert!(!model.is_trained());
        assert_eq!(model.family(), ModelFamily::NeuralNetwork);
    }

    #[test]
    fn test_persisted_model_is_restored() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::default();
        let fresh = registry.create(config()).unwrap();
        fresh.save(dir.path()).unwrap();

        let restored = registry.initialize_model(config(), dir.path()).unwrap();
        assert_eq!(restored.config(), fresh.config());
    }

    #[test]
    fn test_corrupt_artifact_is_not_silently_replaced() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(NeuralNetworkModel::artifact_path(dir.path()), b"garbage").unwrap();
        let result = ModelRegistry::default().initialize_model(config(), dir.path());
        assert!(matches!(result, Err(PipelineError::Persistence(_))));
    }
}
