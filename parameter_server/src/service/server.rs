use std::{convert::Infallible, io, net::SocketAddr};

use comms::{OnoReceiver, OnoSender};
use log::{info, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, ToSocketAddrs},
    task::JoinSet,
};

use super::ServerSession;

/// The network endpoint of a parameter server task.
///
/// It accepts worker connections forever, each one is served by its own task
/// sharing the same `ServerSession`.
pub struct ParameterServer {
    listener: TcpListener,
    session: ServerSession,
    tasks: JoinSet<io::Result<()>>,
}

impl ParameterServer {
    /// Binds a new `ParameterServer` to `addr`.
    ///
    /// # Arguments
    /// * `addr` - The address to listen on.
    /// * `task_index` - The index of this server among the `ps` tasks.
    ///
    /// # Returns
    /// A new `ParameterServer` or an io error if the address can't be bound.
    pub async fn bind<A: ToSocketAddrs>(addr: A, task_index: usize) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(ps = task_index; "listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            session: ServerSession::new(task_index),
            tasks: JoinSet::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn session(&self) -> &ServerSession {
        &self.session
    }

    /// Spawns the task serving a single worker connection.
    ///
    /// # Arguments
    /// * `rx` - The receiving end of the communication.
    /// * `tx` - The sending end of the communication.
    pub fn spawn<R, W>(&mut self, rx: OnoReceiver<R>, tx: OnoSender<W>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let session = self.session.clone();
        self.tasks.spawn(session.serve(rx, tx));
    }

    /// Serves workers until the listener fails, a parameter server never finishes on its own.
    ///
    /// # Returns
    /// Only ever returns the error that broke the listener.
    pub async fn join(mut self) -> io::Result<Infallible> {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    stream.set_nodelay(true)?;
                    info!("accepted connection from {peer}");

                    let (rx, tx) = stream.into_split();
                    let (rx, tx) = comms::channel(rx, tx);
                    self.spawn(rx, tx);
                }
                Some(res) = self.tasks.join_next() => match res {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("worker connection failed: {e}"),
                    Err(e) => warn!("worker connection task panicked: {e}"),
                },
            }
        }
    }
}
