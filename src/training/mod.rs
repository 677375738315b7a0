mod diagnostics;

use log::{debug, info, warn};
use machine_learning::Classifier;
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    config::RunConfig,
    data::{BatchSampler, Dataset},
    error::{HarnessErr, Result},
    metrics::{ClassScores, EpochMetrics, MetricsRecord},
    plot::Plotter,
    sampler::{feed_single_class, remove_class},
};

pub use diagnostics::{THRESHOLD_FILE, write_thresholds};

/// Offsets the class removal rng's seed from the batch sampler's.
const REMOVAL_SEED_OFFSET: u64 = 0x9e37_79b9;

/// Where a `TrainingLoop` is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    /// Running the given zero based epoch.
    EpochRunning(usize),
    Finalizing,
    Done,
}

/// Trains a freshly built classifier on a shared dataset and measures it along the way.
///
/// A failure anywhere aborts the run, the loop keeps the phase it failed in.
pub struct TrainingLoop<'a, P> {
    config: &'a RunConfig,
    dataset: &'a Dataset,
    plotter: &'a P,
    phase: Phase,
}

impl<'a, P: Plotter> TrainingLoop<'a, P> {
    /// Creates a new `TrainingLoop`.
    ///
    /// # Arguments
    /// * `config` - The run's configuration.
    /// * `dataset` - The dataset, only ever read.
    /// * `plotter` - Renders the curves once training is over.
    pub fn new(config: &'a RunConfig, dataset: &'a Dataset, plotter: &'a P) -> Self {
        Self {
            config,
            dataset,
            plotter,
            phase: Phase::Initializing,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs every epoch and the end of run diagnostics.
    ///
    /// # Returns
    /// The finalized metrics record, or the first error encountered.
    pub fn run(&mut self) -> Result<MetricsRecord> {
        self.phase = Phase::Initializing;
        let config = self.config;
        config.validate()?;

        let train = &self.dataset.train;
        let num_batches = train.len() / config.batch_size;
        if num_batches == 0 {
            return Err(HarnessErr::InvalidConfig(format!(
                "a batch size of {} leaves no batch out of {} training examples",
                config.batch_size,
                train.len()
            )));
        }

        if self.dataset.validation.is_empty() {
            return Err(HarnessErr::InvalidConfig(
                "the validation split is empty".into(),
            ));
        }

        let mut classifier = Classifier::new(config.classifier_spec())?;
        let mut sampler = BatchSampler::new(train.len(), config.seed);
        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(REMOVAL_SEED_OFFSET));
        let mut record = MetricsRecord::new(config.outputs);

        info!(
            batches = num_batches,
            epochs = config.num_epochs,
            constrained = config.lipschitz_constraint;
            "training into {}", config.model_dir.display()
        );

        for epoch in 0..config.num_epochs {
            self.phase = Phase::EpochRunning(epoch);
            let metrics = self.run_epoch(&mut classifier, &mut sampler, &mut rng, num_batches)?;
            record.record_epoch(&metrics)?;

            for (class, scores) in metrics.classes.iter().enumerate() {
                info!(class = class, accuracy = scores.accuracy; "class accuracy");
            }
            info!(val_acc = metrics.val_acc, val_loss = metrics.val_loss; "epoch {} done", epoch + 1);
            info!(
                "training progress {:.1}%",
                100. * (epoch + 1) as f32 / config.num_epochs as f32
            );
        }

        self.phase = Phase::Finalizing;
        let validation = &self.dataset.validation;
        let confusion = classifier.confusion_matrix(validation.x(), validation.y())?;
        classifier.save(&config.model_dir)?;

        let diagnostics = diagnostics::compute(&mut classifier, validation, confusion, config)?;
        write_thresholds(&config.model_dir, &diagnostics)?;
        record.finalize(diagnostics);

        self.plotter.plot(&record, config, false)?;

        self.phase = Phase::Done;
        Ok(record)
    }

    fn run_epoch(
        &self,
        classifier: &mut Classifier,
        sampler: &mut BatchSampler,
        rng: &mut StdRng,
        num_batches: usize,
    ) -> Result<EpochMetrics> {
        let config = self.config;
        let mut loss_sum = 0.;
        let mut acc_sum = 0.;
        let mut counted = 0;

        for iteration in 0..num_batches {
            let mut batch = sampler.next_batch(&self.dataset.train, config.batch_size);
            for &class in &config.removed_classes {
                batch = remove_class(&batch, class, config.removed_perc, rng)?.batch;
            }

            if batch.is_empty() {
                warn!(iteration = iteration; "batch emptied by class removal, skipping it");
                continue;
            }

            classifier.train_step(batch.x(), batch.y())?;
            if config.lipschitz_constraint {
                classifier.project()?;
            }

            let eval = classifier.evaluate(batch.x(), batch.y())?;
            loss_sum += eval.loss;
            acc_sum += eval.accuracy;
            counted += 1;

            debug!(iteration = iteration, loss = eval.loss, accuracy = eval.accuracy; "batch done");
        }

        let (train_loss, train_acc) = if counted == 0 {
            warn!("every batch of the epoch was empty");
            (0., 0.)
        } else {
            (loss_sum / counted as f32, acc_sum / counted as f32)
        };

        let validation = &self.dataset.validation;
        let val = classifier.evaluate(validation.x(), validation.y())?;
        let confusion = classifier.confusion_matrix(validation.x(), validation.y())?;

        let mut classes = Vec::with_capacity(config.outputs);
        for class in 0..config.outputs {
            let single = feed_single_class(validation, class, config.outputs, rng)?;
            let accuracy = if single.is_empty() {
                warn!(class = class; "no validation examples for class");
                0.
            } else {
                classifier.accuracy(single.x(), single.y())?
            };

            classes.push(ClassScores::from_confusion(confusion.view(), class, accuracy));
        }

        Ok(EpochMetrics {
            weight_norms: classifier.weight_norms()?,
            train_loss,
            train_acc,
            val_loss: val.loss,
            val_acc: val.accuracy,
            classes,
        })
    }
}
