use std::num::NonZeroUsize;

use comms::specs::server::{OptimizerSpec, ServerSpec, SynchronizerSpec};
use futures::future;
use log::{debug, info};
use machine_learning::MlErr;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::tcp::{OwnedReadHalf, OwnedWriteHalf},
};

use crate::{GradientExchange, PsClient, Result, VariablePlacement, WorkerErr};

/// What the chief tells every parameter server when it initializes the session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub shard_size: NonZeroUsize,
    pub optimizer: OptimizerSpec,
    pub replicas_to_aggregate: usize,
    pub seed: Option<u64>,
}

impl SessionConfig {
    /// Builds the specification of server `ps`.
    ///
    /// # Arguments
    /// * `placement` - Where the model's variables live.
    /// * `ps` - The index of the server.
    ///
    /// # Returns
    /// The server's specification.
    pub fn server_spec(&self, placement: &VariablePlacement, ps: usize) -> ServerSpec {
        ServerSpec {
            shard_size: self.shard_size,
            param_gen: placement.param_gen(ps),
            optimizer: self.optimizer,
            synchronizer: SynchronizerSpec::Barrier {
                replicas_to_aggregate: self.replicas_to_aggregate,
            },
            seed: self.seed.map(|seed| seed.wrapping_add(ps as u64)),
        }
    }
}

/// A worker's view of the training session: one client per parameter server and the
/// model's parameters reassembled from all of them.
pub struct Session<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    worker_index: usize,
    is_chief: bool,
    placement: VariablePlacement,
    clients: Vec<PsClient<R, W>>,
    params: Vec<f32>,
    global_step: u64,
}

impl Session<OwnedReadHalf, OwnedWriteHalf> {
    /// Connects to every parameter server.
    ///
    /// # Arguments
    /// * `worker_index` - The index of this worker among the `worker` tasks.
    /// * `is_chief` - Whether this worker initializes the session.
    /// * `placement` - Where the model's variables live.
    /// * `addrs` - The address of every `ps` task, in task order.
    ///
    /// # Returns
    /// A new `Session` or the first connection error.
    pub async fn connect(
        worker_index: usize,
        is_chief: bool,
        placement: VariablePlacement,
        addrs: &[String],
    ) -> Result<Self> {
        if addrs.len() != placement.ps_count() {
            return Err(WorkerErr::ServerCountMismatch {
                got: addrs.len(),
                expected: placement.ps_count(),
            });
        }

        let clients = future::try_join_all(
            addrs
                .iter()
                .enumerate()
                .map(|(ps, addr)| PsClient::connect(ps, addr, placement.server_len(ps))),
        )
        .await?;

        Self::new(worker_index, is_chief, placement, clients)
    }
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a new `Session` over already connected clients.
    ///
    /// # Arguments
    /// * `worker_index` - The index of this worker among the `worker` tasks.
    /// * `is_chief` - Whether this worker initializes the session.
    /// * `placement` - Where the model's variables live.
    /// * `clients` - One client per parameter server.
    ///
    /// # Returns
    /// A new `Session` or an error if the clients don't match the placement.
    pub fn new(
        worker_index: usize,
        is_chief: bool,
        placement: VariablePlacement,
        mut clients: Vec<PsClient<R, W>>,
    ) -> Result<Self> {
        clients.sort_by_key(PsClient::server);

        let matches = clients.len() == placement.ps_count()
            && clients.iter().enumerate().all(|(i, c)| c.server() == i);

        if !matches {
            return Err(WorkerErr::ServerCountMismatch {
                got: clients.len(),
                expected: placement.ps_count(),
            });
        }

        Ok(Self {
            worker_index,
            is_chief,
            params: vec![0.; placement.model_len()],
            placement,
            clients,
            global_step: 0,
        })
    }

    /// Brings the session up.
    ///
    /// The chief joins and initializes every server, any other worker joins and waits until
    /// the chief did. Both end up with the initial parameters and the current global step.
    ///
    /// # Arguments
    /// * `config` - How the chief initializes the servers, ignored by non-chief workers.
    ///
    /// # Returns
    /// The global step the session starts at.
    pub async fn prepare_or_wait(&mut self, config: &SessionConfig) -> Result<u64> {
        let (worker_index, is_chief) = (self.worker_index, self.is_chief);

        if is_chief {
            info!(worker = worker_index; "Initializing session...");
        } else {
            info!(worker = worker_index; "Waiting for session to be initialized...");
        }

        let specs: Vec<_> = (0..self.placement.ps_count())
            .map(|ps| is_chief.then(|| config.server_spec(&self.placement, ps)))
            .collect();

        future::try_join_all(self.clients.iter_mut().zip(specs).map(
            |(client, spec)| async move {
                client.join(worker_index, is_chief).await?;

                if let Some(spec) = spec {
                    client.initialize(spec).await?;
                }

                client.wait_ready().await
            },
        ))
        .await?;

        self.gather();
        info!(worker = worker_index, global_step = self.global_step; "session ready");
        Ok(self.global_step)
    }

    /// Pushes `grad` to every server and waits for the parameters of the next step.
    ///
    /// # Arguments
    /// * `grad` - The gradient, laid out like the model's parameters.
    ///
    /// # Returns
    /// The new global step.
    pub async fn step(&mut self, grad: &[f32]) -> Result<u64> {
        if grad.len() != self.params.len() {
            return Err(MlErr::SizeMismatch {
                what: "gradient",
                got: grad.len(),
                expected: self.params.len(),
            }
            .into());
        }

        for client in &mut self.clients {
            self.placement
                .scatter(client.server(), grad, client.grad_mut());
        }

        let step = self.global_step;
        future::try_join_all(
            self.clients
                .iter_mut()
                .map(|client| client.push_gradient(step)),
        )
        .await?;

        self.gather();
        debug!(worker = self.worker_index, global_step = self.global_step; "step synchronized");
        Ok(self.global_step)
    }

    /// Returns the model's parameters as of the last synchronized step.
    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Returns the last global step, as reported by the first parameter server.
    pub fn global_step(&self) -> u64 {
        self.global_step
    }

    /// Tells every server this worker is done.
    pub async fn disconnect(mut self) -> Result<()> {
        future::try_join_all(self.clients.iter_mut().map(PsClient::disconnect)).await?;
        info!(worker = self.worker_index; "disconnected from the session");
        Ok(())
    }

    fn gather(&mut self) {
        for client in &self.clients {
            self.placement
                .gather(client.server(), client.params(), &mut self.params);
        }

        if let Some(first) = self.clients.first() {
            self.global_step = first.step();
        }
    }
}

impl<R, W> GradientExchange for Session<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn params(&self) -> &[f32] {
        Session::params(self)
    }

    fn global_step(&self) -> u64 {
        Session::global_step(self)
    }

    async fn step(&mut self, grad: &[f32]) -> Result<u64> {
        Session::step(self, grad).await
    }
}
