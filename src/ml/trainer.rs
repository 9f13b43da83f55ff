// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epoch loop with Adam, evaluating the validation split after
// every epoch.
//
//   - Training batches live on the autodiff backend
//   - model.valid() gives the model on the inner backend, which
//     the validation batches are built for
//   - The backbone is frozen (see model.rs), so Adam only ever
//     sees gradients for the dense head
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{bail, Result};
use burn::{
    data::dataloader::DataLoader,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::batcher::DefectBatch;
use crate::infra::metrics::{accuracy, EpochMetrics};
use crate::ml::inferencer::evaluate;
use crate::ml::model::{count_correct, DefectClassifier};

/// Adam epsilon matching the Keras default the hyperparameters were tuned with
const ADAM_EPSILON: f32 = 1e-7;

pub struct TrainingOutcome<B: AutodiffBackend> {
    pub model:   DefectClassifier<B>,
    pub history: Vec<EpochMetrics>,
}

pub fn run_training<B: AutodiffBackend>(
    cfg:          &TrainConfig,
    mut model:    DefectClassifier<B>,
    train_loader: &dyn DataLoader<DefectBatch<B>>,
    val_loader:   &dyn DataLoader<DefectBatch<B::InnerBackend>>,
) -> Result<TrainingOutcome<B>> {
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let mut optim = AdamConfig::new().with_epsilon(ADAM_EPSILON).init();

    let mut history = Vec::with_capacity(cfg.epochs);

    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut loss_sum = 0.0f64;
        let mut correct  = 0usize;
        let mut seen     = 0usize;

        for batch in train_loader.iter() {
            let batch_size = batch.labels.dims()[0];
            let (loss, logits) = model.forward_loss(batch.images, batch.targets);

            loss_sum += loss.clone().into_scalar().elem::<f64>() * batch_size as f64;
            correct  += count_correct(logits, batch.labels);
            seen     += batch_size;

            // Backward pass + Adam update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.learning_rate, model, grads);
        }

        if seen == 0 {
            bail!("Training split produced no batches");
        }

        // ── Validation phase ──────────────────────────────────────────────────
        let validation = evaluate(&model.valid(), val_loader);

        let metrics = EpochMetrics::new(
            epoch,
            loss_sum / seen as f64,
            accuracy(correct, seen),
            validation.loss,
            validation.accuracy,
        );
        println!("{}", metrics.summary(cfg.epochs));
        tracing::debug!(?metrics, "Epoch finished");
        history.push(metrics);
    }

    tracing::info!("Training complete after {} epochs", cfg.epochs);
    Ok(TrainingOutcome { model, history })
}
