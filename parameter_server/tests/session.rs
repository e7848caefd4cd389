use std::{num::NonZeroUsize, time::Duration};

use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg, Payload},
    specs::server::{OptimizerSpec, ParamGenSpec, ServerSpec, SynchronizerSpec},
};
use parameter_server::{ParameterServer, ServerSession};
use tokio::{
    io::{self, DuplexStream, ReadHalf, WriteHalf},
    net::TcpStream,
    task::JoinHandle,
    time,
};

type Rx = OnoReceiver<ReadHalf<DuplexStream>>;
type Tx = OnoSender<WriteHalf<DuplexStream>>;

const PARAMS: usize = 4;

fn connect(session: &ServerSession) -> (Rx, Tx, JoinHandle<io::Result<()>>) {
    let (worker, server) = io::duplex(4096);

    let (rx, tx) = io::split(server);
    let (rx, tx) = comms::channel(rx, tx);
    let task = tokio::spawn(session.clone().serve(rx, tx));

    let (rx, tx) = io::split(worker);
    let (rx, tx) = comms::channel(rx, tx);
    (rx, tx, task)
}

fn spec(replicas: usize) -> ServerSpec {
    ServerSpec {
        shard_size: NonZeroUsize::new(3).unwrap(),
        param_gen: ParamGenSpec::Const {
            value: 1.,
            limit: PARAMS,
        },
        optimizer: OptimizerSpec::GradientDescent { learning_rate: 0.5 },
        synchronizer: SynchronizerSpec::Barrier {
            replicas_to_aggregate: replicas,
        },
        seed: None,
    }
}

async fn join(tx: &mut Tx, worker_index: usize, is_chief: bool) -> io::Result<()> {
    tx.send(&Msg::Control(Command::Join {
        worker_index,
        is_chief,
    }))
    .await
}

async fn expect_ready(rx: &mut Rx, buf: &mut Vec<f32>) -> io::Result<(u64, Vec<f32>)> {
    let Msg::Control(Command::Ready { step }) = rx.recv_into::<Msg, _>(buf).await? else {
        panic!("expected ready");
    };

    let Msg::Data(Payload::Params { step: at, params }) = rx.recv_into::<Msg, _>(buf).await? else {
        panic!("expected params");
    };

    assert_eq!(step, at);
    Ok((step, params.to_vec()))
}

async fn push(rx: &mut Rx, tx: &mut Tx, step: u64, grad: &[f32]) -> io::Result<(u64, Vec<f32>)> {
    let mut buf: Vec<f32> = Vec::new();
    tx.send(&Msg::Data(Payload::Gradient { step, grad })).await?;

    match rx.recv_into::<Msg, _>(&mut buf).await? {
        Msg::Data(Payload::Params { step, params }) => Ok((step, params.to_vec())),
        msg => panic!("expected params, got {}", msg.kind()),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn chief_initializes_and_worker_waits() -> io::Result<()> {
    let session = ServerSession::new(0);
    let mut buf: Vec<f32> = Vec::new();

    let (mut w_rx, mut w_tx, w_task) = connect(&session);
    join(&mut w_tx, 1, false).await?;

    // The non-chief hears nothing until the chief shows up.
    let early = time::timeout(Duration::from_millis(100), w_rx.recv_into::<Msg, _>(&mut buf));
    assert!(early.await.is_err());
    assert!(session.aggregator().is_none());

    let (mut c_rx, mut c_tx, c_task) = connect(&session);
    join(&mut c_tx, 0, true).await?;
    c_tx.send(&Msg::Control(Command::Initialize(spec(2)))).await?;

    let (step, params) = expect_ready(&mut c_rx, &mut buf).await?;
    assert_eq!((step, params), (0, vec![1.; PARAMS]));
    let (step, params) = expect_ready(&mut w_rx, &mut buf).await?;
    assert_eq!((step, params), (0, vec![1.; PARAMS]));

    // Both replicas get the same update built from the mean gradient.
    let (chief, worker) = tokio::join!(
        push(&mut c_rx, &mut c_tx, 0, &[2.; PARAMS]),
        push(&mut w_rx, &mut w_tx, 0, &[0.; PARAMS]),
    );
    assert_eq!(chief?, (1, vec![0.5; PARAMS]));
    assert_eq!(worker?, (1, vec![0.5; PARAMS]));

    for tx in [&mut c_tx, &mut w_tx] {
        tx.send(&Msg::Control(Command::Disconnect)).await?;
    }
    c_task.await??;
    w_task.await??;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn second_initialization_is_ignored() -> io::Result<()> {
    let session = ServerSession::new(0);
    assert!(session.initialize(spec(1))?);

    let mut other = spec(1);
    other.param_gen = ParamGenSpec::Const {
        value: 7.,
        limit: 1,
    };
    assert!(!session.initialize(other)?);

    let aggregator = session.wait_ready().await?;
    assert_eq!(aggregator.len(), PARAMS);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn stale_gradient_gets_an_error() -> io::Result<()> {
    let session = ServerSession::new(0);
    let mut buf: Vec<f32> = Vec::new();

    let (mut rx, mut tx, task) = connect(&session);
    join(&mut tx, 0, true).await?;
    tx.send(&Msg::Control(Command::Initialize(spec(1)))).await?;
    expect_ready(&mut rx, &mut buf).await?;

    let (step, _) = push(&mut rx, &mut tx, 0, &[0.; PARAMS]).await?;
    assert_eq!(step, 1);

    tx.send(&Msg::Data(Payload::Gradient {
        step: 0,
        grad: &[0.; PARAMS],
    }))
    .await?;
    assert!(matches!(rx.recv_into::<Msg, _>(&mut buf).await?, Msg::Err(_)));

    let err = task.await?.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn gradient_before_join_is_rejected() -> io::Result<()> {
    let session = ServerSession::new(3);
    let mut buf: Vec<f32> = Vec::new();

    let (mut rx, mut tx, task) = connect(&session);
    tx.send(&Msg::Data(Payload::Gradient {
        step: 0,
        grad: &[1.],
    }))
    .await?;

    let Msg::Err(text) = rx.recv_into::<Msg, _>(&mut buf).await? else {
        panic!("expected an error");
    };
    assert!(text.contains("control/join"));
    assert!(task.await?.is_err());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn serves_workers_over_tcp() -> io::Result<()> {
    let server = ParameterServer::bind("127.0.0.1:0", 0).await?;
    let addr = server.local_addr()?;
    let session = server.session().clone();
    let listener = tokio::spawn(server.join());

    let (rx, tx) = TcpStream::connect(addr).await?.into_split();
    let (mut rx, mut tx) = comms::channel(rx, tx);
    let mut buf: Vec<f32> = Vec::new();

    tx.send(&Msg::Control(Command::Join {
        worker_index: 0,
        is_chief: true,
    }))
    .await?;
    tx.send(&Msg::Control(Command::Initialize(spec(1)))).await?;

    let Msg::Control(Command::Ready { step }) = rx.recv_into::<Msg, _>(&mut buf).await? else {
        panic!("expected ready");
    };
    assert_eq!(step, 0);

    let Msg::Data(Payload::Params { params, .. }) = rx.recv_into::<Msg, _>(&mut buf).await? else {
        panic!("expected params");
    };
    assert_eq!(params, [1.; PARAMS]);
    assert!(session.aggregator().is_some());

    tx.send(&Msg::Control(Command::Disconnect)).await?;
    listener.abort();
    Ok(())
}
