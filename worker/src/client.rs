use std::{borrow::Cow, io, time::Duration};

use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg, Payload},
    specs::server::ServerSpec,
};
use log::debug;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    time,
};

use crate::{Result, WorkerErr};

const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// A connection to a single parameter server.
///
/// Keeps the server local copy of the parameters it last received and the buffer the
/// gradient is pushed from, both `len` floats long.
pub struct PsClient<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    server: usize,
    rx: OnoReceiver<R>,
    tx: OnoSender<W>,
    rx_buf: Vec<f32>,
    params: Vec<f32>,
    grad: Vec<f32>,
    step: u64,
}

impl PsClient<OwnedReadHalf, OwnedWriteHalf> {
    /// Connects to the parameter server listening at `addr`.
    ///
    /// Servers may still be starting when workers come up, refused connections are retried
    /// until the server accepts.
    ///
    /// # Arguments
    /// * `server` - The index of the server among the `ps` tasks.
    /// * `addr` - The address of the server.
    /// * `len` - The amount of parameters the server holds.
    ///
    /// # Returns
    /// A new `PsClient` or an io error if the connection fails for any other reason.
    pub async fn connect(server: usize, addr: &str, len: usize) -> io::Result<Self> {
        let stream = loop {
            match TcpStream::connect(addr).await {
                Ok(stream) => break stream,
                Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    debug!(ps = server, addr = addr; "parameter server not up yet, retrying");
                    time::sleep(CONNECT_RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        };

        stream.set_nodelay(true)?;
        let (rx, tx) = stream.into_split();
        let (rx, tx) = comms::channel(rx, tx);

        debug!(ps = server, addr = addr; "connected to parameter server");
        Ok(Self::new(server, rx, tx, len))
    }
}

impl<R, W> PsClient<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a new `PsClient` over an already established channel.
    ///
    /// # Arguments
    /// * `server` - The index of the server among the `ps` tasks.
    /// * `rx` - The receiving end of the communication.
    /// * `tx` - The sending end of the communication.
    /// * `len` - The amount of parameters the server holds.
    ///
    /// # Returns
    /// A new `PsClient` instance.
    pub fn new(server: usize, rx: OnoReceiver<R>, tx: OnoSender<W>, len: usize) -> Self {
        Self {
            server,
            rx,
            tx,
            rx_buf: Vec::new(),
            params: vec![0.; len],
            grad: vec![0.; len],
            step: 0,
        }
    }

    /// Returns the index of the server among the `ps` tasks.
    pub fn server(&self) -> usize {
        self.server
    }

    /// Returns the last global step this server reported.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Returns the server local parameters received last.
    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Returns the buffer the next gradient is pushed from.
    pub fn grad_mut(&mut self) -> &mut [f32] {
        &mut self.grad
    }

    /// Announces this worker to the server.
    ///
    /// # Arguments
    /// * `worker_index` - The index of this worker among the `worker` tasks.
    /// * `is_chief` - Whether this worker initializes the session.
    pub async fn join(&mut self, worker_index: usize, is_chief: bool) -> Result<()> {
        let msg = Msg::Control(Command::Join {
            worker_index,
            is_chief,
        });

        self.tx.send(&msg).await?;
        Ok(())
    }

    /// Sends the server the specification it should initialize its session with.
    ///
    /// # Arguments
    /// * `spec` - The specification of this server.
    pub async fn initialize(&mut self, spec: ServerSpec) -> Result<()> {
        self.tx.send(&Msg::Control(Command::Initialize(spec))).await?;
        Ok(())
    }

    /// Waits until the session is ready and receives the initial parameters.
    ///
    /// # Returns
    /// The global step of the session.
    pub async fn wait_ready(&mut self) -> Result<u64> {
        match self.rx.recv_into::<Msg, _>(&mut self.rx_buf).await? {
            Msg::Control(Command::Ready { step }) => {
                debug!(ps = self.server, step = step; "session ready");
            }
            msg => return Err(Self::failure(self.server, msg)),
        }

        self.recv_params().await
    }

    /// Pushes the gradient in the gradient buffer and receives the resulting parameters.
    ///
    /// The call completes once the server applied the step, which under synchronous
    /// aggregation means every replica pushed its gradient for `step`.
    ///
    /// # Arguments
    /// * `step` - The global step the gradient was computed against.
    ///
    /// # Returns
    /// The new global step.
    pub async fn push_gradient(&mut self, step: u64) -> Result<u64> {
        self.tx
            .send(&Msg::Data(Payload::Gradient {
                step,
                grad: &self.grad,
            }))
            .await?;

        self.recv_params().await
    }

    /// Tells the server this worker is done.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.tx.send(&Msg::Control(Command::Disconnect)).await?;
        Ok(())
    }

    async fn recv_params(&mut self) -> Result<u64> {
        match self.rx.recv_into::<Msg, _>(&mut self.rx_buf).await? {
            Msg::Data(Payload::Params { step, params }) => {
                if params.len() != self.params.len() {
                    return Err(WorkerErr::ParamsLengthMismatch {
                        server: self.server,
                        got: params.len(),
                        expected: self.params.len(),
                    });
                }

                self.params.copy_from_slice(params);
                self.step = step;
                Ok(step)
            }
            msg => Err(Self::failure(self.server, msg)),
        }
    }

    fn failure(server: usize, msg: Msg<'_>) -> WorkerErr {
        match msg {
            Msg::Err(detail) => WorkerErr::Server {
                server,
                detail: Cow::into_owned(detail),
            },
            msg => WorkerErr::UnexpectedMessage {
                server,
                got: msg.kind(),
            },
        }
    }
}
