use std::{borrow::Cow, io, sync::Arc};

use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg, Payload},
    specs::server::ServerSpec,
};
use log::{debug, info, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::watch,
};

use super::{Aggregator, ServerBuilder};

type Slot = Option<Arc<dyn Aggregator>>;

/// The state shared by every connection of a parameter server.
///
/// The chief worker initializes it exactly once, every other connection
/// waits until that happens before it's handed the parameters.
#[derive(Clone)]
pub struct ServerSession {
    task_index: usize,
    slot: Arc<watch::Sender<Slot>>,
}

impl ServerSession {
    /// Creates a new uninitialized `ServerSession`.
    ///
    /// # Arguments
    /// * `task_index` - The index of this server among the `ps` tasks.
    ///
    /// # Returns
    /// A new `ServerSession` instance.
    pub fn new(task_index: usize) -> Self {
        let (slot, _) = watch::channel(None);

        Self {
            task_index,
            slot: Arc::new(slot),
        }
    }

    /// Returns the aggregator if the session was already initialized.
    pub fn aggregator(&self) -> Option<Arc<dyn Aggregator>> {
        self.slot.borrow().clone()
    }

    /// Builds the aggregator from `spec` and publishes it, unless a previous call already did.
    ///
    /// # Arguments
    /// * `spec` - The specification sent by the chief.
    ///
    /// # Returns
    /// `true` if this call initialized the session, or an io error if the spec is invalid.
    pub fn initialize(&self, spec: ServerSpec) -> io::Result<bool> {
        if self.slot.borrow().is_some() {
            warn!(ps = self.task_index; "session already initialized, ignoring initialization");
            return Ok(false);
        }

        let aggregator = ServerBuilder::new().build(spec)?;
        let params = aggregator.len();

        let published = self.slot.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }

            *slot = Some(aggregator);
            true
        });

        if published {
            info!(ps = self.task_index, params = params; "session initialized");
        } else {
            warn!(ps = self.task_index; "session already initialized, ignoring initialization");
        }

        Ok(published)
    }

    /// Waits until the session is initialized.
    ///
    /// There is no timeout, a chief that never shows up keeps every other worker waiting.
    ///
    /// # Returns
    /// The aggregator of this server.
    pub async fn wait_ready(&self) -> io::Result<Arc<dyn Aggregator>> {
        let mut rx = self.slot.subscribe();

        let slot = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))?;

        slot.clone()
            .ok_or_else(|| io::Error::other("session slot emptied while waiting"))
    }

    /// Serves a single worker connection until it disconnects.
    ///
    /// The worker first joins, the chief then sends the initialization spec. Once the session
    /// is ready the worker gets the current step and parameters and starts pushing gradients,
    /// each answered with the parameters of the resulting step.
    ///
    /// # Arguments
    /// * `rx` - The receiving end of the communication.
    /// * `tx` - The sending end of the communication.
    ///
    /// # Returns
    /// An io error if the connection fails or the worker breaks the protocol.
    pub async fn serve<R, W>(self, mut rx: OnoReceiver<R>, mut tx: OnoSender<W>) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut rx_buf: Vec<f32> = Vec::new();

        let (worker_index, is_chief) = match rx.recv_into::<Msg, _>(&mut rx_buf).await? {
            Msg::Control(Command::Join {
                worker_index,
                is_chief,
            }) => (worker_index, is_chief),
            msg => return Self::unexpected(&mut tx, "control/join", &msg).await,
        };

        info!(ps = self.task_index, worker = worker_index, chief = is_chief; "worker joined");

        if is_chief {
            let spec = match rx.recv_into::<Msg, _>(&mut rx_buf).await? {
                Msg::Control(Command::Initialize(spec)) => spec,
                msg => return Self::unexpected(&mut tx, "control/initialize", &msg).await,
            };

            if let Err(e) = self.initialize(spec) {
                let text = e.to_string();
                tx.send(&Msg::Err(Cow::Borrowed(&text))).await?;
                return Err(e);
            }
        }

        let aggregator = self.wait_ready().await?;
        let mut params = vec![0.; aggregator.len()];
        aggregator.pull_params(&mut params).await?;

        let mut step = aggregator.global_step();
        tx.send(&Msg::Control(Command::Ready { step })).await?;
        tx.send(&Msg::Data(Payload::Params {
            step,
            params: &params,
        }))
        .await?;

        loop {
            match rx.recv_into::<Msg, _>(&mut rx_buf).await? {
                Msg::Data(Payload::Gradient { step: at, grad }) => {
                    step = match aggregator.step(at, grad, &mut params).await {
                        Ok(step) => step,
                        Err(e) => {
                            let text = e.to_string();
                            tx.send(&Msg::Err(Cow::Borrowed(&text))).await?;
                            return Err(e.into());
                        }
                    };

                    debug!(ps = self.task_index, worker = worker_index, step = step; "step applied");

                    tx.send(&Msg::Data(Payload::Params {
                        step,
                        params: &params,
                    }))
                    .await?;
                }
                Msg::Control(Command::Disconnect) => {
                    info!(ps = self.task_index, worker = worker_index, step = step; "worker disconnected");
                    return Ok(());
                }
                msg => return Self::unexpected(&mut tx, "data/gradient", &msg).await,
            }
        }
    }

    /// Replies with an error to a message of the wrong kind and fails.
    ///
    /// # Arguments
    /// * `tx` - The sending end of the communication.
    /// * `expected` - The kind of message that was expected.
    /// * `msg` - The received message.
    ///
    /// # Returns
    /// An `InvalidData` io error.
    async fn unexpected<W, T>(tx: &mut OnoSender<W>, expected: &str, msg: &Msg<'_>) -> io::Result<T>
    where
        W: AsyncWrite + Unpin,
    {
        let text = format!("expected {expected}, got {}", msg.kind());
        warn!("{text}");

        tx.send(&Msg::Err(Cow::Borrowed(&text))).await?;
        Err(io::Error::new(io::ErrorKind::InvalidData, text))
    }
}
