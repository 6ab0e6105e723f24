//! Supervised training loop
//!
//! Each epoch is two phases. The train phase walks a freshly shuffled pass
//! over the train partition, stepping SGD after every batch. The eval phase
//! walks the test partition in dataset order with gradients disabled,
//! collecting predictions so the confusion matrix lines up with the label
//! sequence. The epoch loss is the mean of batch losses and accuracies are
//! percentages over the partition size, so partial trailing batches are
//! weighted the same as full ones.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use burn::data::dataloader::batcher::Batcher;
use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::momentum::MomentumConfig;
use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::prelude::*;
use burn::record::CompactRecorder;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use tracing::{debug, info};

use super::config::TrainingConfig;
use super::history::{EpochRecord, History};
use crate::dataset::{load_partition, EpochBatches, FundusBatch, FundusBatcher, FundusDataset, Partition};
use crate::logging::TrainingLogger;
use crate::metrics::{ConfusionMatrix, RunningAverage};
use crate::model::{Backbone, RetinaClassifier, RetinaClassifierConfig};
use crate::report;

/// Everything a training run needs beyond hyperparameters
#[derive(Debug, Clone)]
pub struct RunArgs {
    /// Directory holding the four partition index files
    pub data_dir: PathBuf,
    /// Directory holding the image files
    pub image_root: PathBuf,
    /// Directory artifacts are written to
    pub output_dir: PathBuf,
    pub backbone: Backbone,
    /// Optional saved record to initialize the model from
    pub weights: Option<PathBuf>,
    pub config: TrainingConfig,
}

/// Summary of a finished run
#[derive(Debug)]
pub struct TrainingReport {
    pub history: Vec<EpochRecord>,
    pub best_accuracy: f64,
    pub best_epoch: usize,
    /// Path of the best checkpoint, if any epoch cleared the threshold
    pub checkpoint: Option<PathBuf>,
}

/// Run the full fixed-schedule training loop
pub fn run_training<B: AutodiffBackend>(args: &RunArgs, device: B::Device) -> Result<TrainingReport> {
    let config = &args.config;
    B::seed(config.seed);

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.num_workers)
        .build_global()
        .ok();

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("failed to create {}", args.output_dir.display()))?;

    let train_samples = load_partition(&args.data_dir, Partition::Train)?;
    let test_samples = load_partition(&args.data_dir, Partition::Test)?;
    let train_total = train_samples.len();
    let test_total = test_samples.len();

    let mut train_dataset = FundusDataset::new(
        &args.image_root,
        train_samples,
        Partition::Train,
        config.image_size,
        config.seed,
    );
    let test_dataset = FundusDataset::new(
        &args.image_root,
        test_samples,
        Partition::Test,
        config.image_size,
        config.seed,
    );
    let test_labels = test_dataset.labels();
    let batcher = FundusBatcher::new(config.image_size);

    let model_name = args.backbone.model_name();
    info!(
        "Training {} on {} train / {} test samples",
        model_name, train_total, test_total
    );

    let mut model: RetinaClassifier<B> =
        RetinaClassifierConfig::new(args.backbone).init(&device);
    if let Some(weights) = &args.weights {
        model = model
            .load_weights(weights, &device)
            .with_context(|| format!("failed to load weights from {}", weights.display()))?;
        info!("Initialized weights from {}", weights.display());
    }

    let mut optimizer = SgdConfig::new()
        .with_momentum(Some(
            MomentumConfig::new().with_momentum(config.momentum as f64),
        ))
        .with_weight_decay(Some(WeightDecayConfig::new(config.weight_decay as f32)))
        .init();
    let loss_fn = CrossEntropyLossConfig::new().init(&device);
    let eval_loss_fn = CrossEntropyLossConfig::new().init(&device);

    config.save(&args.output_dir.join(format!("{model_name}_config.json")))?;

    let checkpoint_path = args.output_dir.join(format!("{model_name}_maxacc"));
    let mut checkpoint_saved = false;
    let mut best_matrix: Option<ConfusionMatrix> = None;
    let mut history = History::new();
    let mut logger = TrainingLogger::new(config.epochs);

    for epoch in 1..=config.epochs {
        logger.start_epoch(epoch);

        // Train phase
        train_dataset.set_epoch(epoch);
        let batches = EpochBatches::shuffled(
            train_total,
            config.batch_size,
            config.seed.wrapping_add(epoch as u64),
        );
        let mut train_loss = RunningAverage::new();
        let mut train_correct = 0usize;

        for batch_idx in 0..batches.num_batches() {
            let items = batches.materialize(&train_dataset, batch_idx)?;
            let batch: FundusBatch<B> = batcher.batch(items, &device);

            let logits = model.forward(batch.images);
            let loss = loss_fn.forward(logits.clone(), batch.targets.clone());

            train_correct += batch_correct(logits, batch.targets);
            train_loss.update(loss.clone().into_scalar().elem::<f64>());

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);

            debug!(
                "epoch {} train batch {}/{}",
                epoch,
                batch_idx + 1,
                batches.num_batches()
            );
        }
        let train_loss = train_loss.average();
        let train_accuracy = percentage(train_correct, train_total);

        // Eval phase, gradients off, dataset order preserved
        let eval_model = model.valid();
        let eval_batches = EpochBatches::ordered(test_total, config.batch_size);
        let mut test_loss = RunningAverage::new();
        let mut predictions: Vec<usize> = Vec::with_capacity(test_total);

        for batch_idx in 0..eval_batches.num_batches() {
            let items = eval_batches.materialize(&test_dataset, batch_idx)?;
            let batch: FundusBatch<B::InnerBackend> = batcher.batch(items, &device);

            let logits = eval_model.forward(batch.images);
            let loss = eval_loss_fn.forward(logits.clone(), batch.targets);
            test_loss.update(loss.into_scalar().elem::<f64>());

            let predicted = logits
                .argmax(1)
                .squeeze::<1>(1)
                .into_data()
                .convert::<i64>()
                .to_vec::<i64>()
                .map_err(|e| anyhow!("failed to read predictions: {e:?}"))?;
            predictions.extend(predicted.into_iter().map(|p| p as usize));
        }
        let test_loss = test_loss.average();
        let matrix = ConfusionMatrix::from_predictions(&test_labels, &predictions);
        let test_accuracy = matrix.accuracy();

        logger.end_epoch(train_loss, train_accuracy, test_loss, test_accuracy);

        let is_best = history.push(EpochRecord {
            epoch,
            train_loss,
            train_accuracy,
            test_loss,
            test_accuracy,
        });

        if is_best {
            logger.log_new_best(epoch, test_accuracy);
            best_matrix = Some(matrix.clone());
            if test_accuracy > config.checkpoint_accuracy_threshold {
                model
                    .clone()
                    .save_file(checkpoint_path.clone(), &CompactRecorder::new())
                    .with_context(|| {
                        format!("failed to save checkpoint {}", checkpoint_path.display())
                    })?;
                checkpoint_saved = true;
                logger.log_checkpoint(&checkpoint_path);

                let matrix_path =
                    args.output_dir.join(format!("{model_name}_confusion_matrix.png"));
                report::render_confusion_matrix(&matrix, &matrix_path)?;
            }
        }
    }

    let best_accuracy = history.best_accuracy().unwrap_or(0.0);
    let best_epoch = history.best_epoch();
    logger.log_complete(best_accuracy, best_epoch);
    if let Some(matrix) = &best_matrix {
        logger.log_per_class_recall(matrix);
    }

    report::render_accuracy_curves(
        history.records(),
        model_name,
        &args.output_dir.join(format!("{model_name}_acc.png")),
    )?;
    report::write_history_csv(
        history.records(),
        &args.output_dir.join(format!("{model_name}.csv")),
    )?;

    Ok(TrainingReport {
        history: history.records().to_vec(),
        best_accuracy,
        best_epoch,
        checkpoint: checkpoint_saved.then_some(checkpoint_path),
    })
}

/// Count predictions matching their targets
fn batch_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let predicted = logits.argmax(1).squeeze::<1>(1);
    let correct: i64 = predicted.equal(targets).int().sum().into_scalar().elem();
    correct as usize
}

/// Accuracy as a percentage of the partition size
fn percentage(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    correct as f64 * 100.0 / total as f64
}
