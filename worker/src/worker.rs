use log::info;
use machine_learning::{
    arch::Mlp,
    dataset::{CLASSES, IMAGE_SIZE, Mnist, VALIDATION_SIZE},
};

use crate::{
    Result, Session, TrainingLoop, TrainingReport, VariablePlacement, WorkerConfig,
    training,
};

/// A single training replica.
pub struct Worker {
    config: WorkerConfig,
}

impl Worker {
    /// Creates a new `Worker`.
    ///
    /// # Arguments
    /// * `config` - The configuration of this worker.
    ///
    /// # Returns
    /// A new `Worker` instance.
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    /// Trains until the session reaches the target global step.
    ///
    /// Loads the dataset, connects to every parameter server, brings the session up and runs
    /// the training loop. When asked to, the final parameters are evaluated on the validation
    /// split before disconnecting.
    ///
    /// # Returns
    /// What this worker did or the first error found.
    pub async fn run(self) -> Result<TrainingReport> {
        let config = self.config;
        let worker_index = config.worker_index;

        info!(
            worker = worker_index, chief = config.is_chief, device = config.visible_device;
            "starting worker"
        );

        let seed = config.seed.unwrap_or_else(rand::random);
        let mut mnist = Mnist::load(
            &config.data_dir,
            VALIDATION_SIZE,
            seed.wrapping_add(worker_index as u64),
        )?;

        let mut model = Mlp::new(IMAGE_SIZE, config.hidden_units, CLASSES);
        let placement = VariablePlacement::new(model.variables(), config.ps_addrs.len())?;
        placement.log();

        let mut session =
            Session::connect(worker_index, config.is_chief, placement, &config.ps_addrs).await?;
        session.prepare_or_wait(&config.session()).await?;

        let report = TrainingLoop::new(worker_index, config.train_steps, config.batch_size)
            .run(&mut model, &mut session, &mut mnist.train)
            .await?;

        if config.validate {
            if let Some(validation) = &mnist.validation {
                let loss = training::evaluate(&mut model, session.params(), validation)?;
                info!(worker = worker_index, loss = loss; "validation cross entropy: {loss:.4}");
            }
        }

        session.disconnect().await?;

        info!(
            worker = worker_index, local_steps = report.local_steps, global_step = report.global_step;
            "worker done"
        );

        Ok(report)
    }
}
