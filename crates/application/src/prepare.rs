//! Assembly scheduling across the blocking worker pool.

use crate::RuntimeConfig;
use murmur_gates::{CompletionGate, ProcessingGate};
use murmur_models::{assemble_from_dir, assemble_from_packs, ModelAsset, PackIndex};
use std::sync::Arc;

/// Launches one assembly task per missing model and tracks the batch.
///
/// The batch size is fixed on the completion gate before anything runs, so
/// a fast-finishing task can never observe a stale total. The task whose
/// completion satisfies the batch opens the processing gate — the single
/// point where the two gates meet.
pub struct ModelPreparer {
    config: RuntimeConfig,
    completion: Arc<CompletionGate>,
    processing: Arc<ProcessingGate>,
}

impl ModelPreparer {
    pub fn new(
        config: RuntimeConfig,
        completion: Arc<CompletionGate>,
        processing: Arc<ProcessingGate>,
    ) -> Self {
        Self {
            config,
            completion,
            processing,
        }
    }

    /// Configured models whose destination does not exist yet.
    pub fn missing_assets(&self) -> Vec<ModelAsset> {
        self.config
            .models
            .iter()
            .map(|model| ModelAsset::new(self.config.destination_for(model)))
            .filter(|asset| !asset.is_assembled())
            .collect()
    }

    /// Launch assembly for every missing model.
    ///
    /// Returns immediately; completion is observable through the gates.
    /// With nothing missing the processing gate opens right away. Failed
    /// assemblies count toward batch completion like successful ones —
    /// the caller inspects which destinations exist before loading.
    ///
    /// Must be called within a Tokio runtime; each asset is assembled on
    /// the blocking pool.
    pub fn prepare_all(&self) {
        let missing = self.missing_assets();
        self.completion.begin(missing.len());

        if missing.is_empty() {
            tracing::debug!("no models need assembly");
            self.processing.trigger();
            return;
        }

        self.processing.reset();
        tracing::info!(count = missing.len(), "assembling missing models");

        for asset in missing {
            let config = self.config.clone();
            let completion = Arc::clone(&self.completion);
            let processing = Arc::clone(&self.processing);

            tokio::task::spawn_blocking(move || {
                // Pack-mode tasks each build their own index; archives are
                // opened and released within this task's lifetime.
                let result = if config.uses_packs() {
                    let index = PackIndex::build(&config.packs);
                    assemble_from_packs(&index, asset.destination())
                } else {
                    assemble_from_dir(&config.source_root(), asset.destination())
                };

                match result {
                    Ok(bytes) => {
                        tracing::info!(
                            model = %asset.destination().display(),
                            bytes,
                            "assembly finished"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            model = %asset.destination().display(),
                            error = %e,
                            "assembly failed"
                        );
                    }
                }

                if completion.complete_one() {
                    processing.trigger();
                }
            });
        }
    }
}
