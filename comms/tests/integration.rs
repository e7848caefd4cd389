use std::num::NonZeroUsize;

use comms::{
    msg::{Command, Msg, Payload},
    specs::server::{OptimizerSpec, ParamGenSpec, ServerSpec, SynchronizerSpec},
};
use tokio::io;

const BUF_SIZE: usize = 4096;

#[tokio::test]
async fn send_recv_params() {
    let (one, two) = io::duplex(BUF_SIZE);
    let (rx, tx) = io::split(one);
    let (_, mut tx) = comms::channel(rx, tx);

    let params = [0.5, -1.25, 3.];
    let msg = Msg::Data(Payload::Params {
        step: 42,
        params: &params,
    });
    tx.send(&msg).await.unwrap();

    let (rx, tx) = io::split(two);
    let (mut rx, _) = comms::channel(rx, tx);

    let mut buf: Vec<f32> = Vec::new();
    let msg: Msg = rx.recv_into(&mut buf).await.unwrap();

    let Msg::Data(Payload::Params { step, params: got }) = msg else {
        panic!("unexpected message {msg:?}");
    };

    assert_eq!(step, 42);
    assert_eq!(got, params);
}

#[tokio::test]
async fn send_recv_initialize() {
    let (one, two) = io::duplex(BUF_SIZE);
    let (rx, tx) = io::split(one);
    let (_, mut tx) = comms::channel(rx, tx);

    let spec = ServerSpec {
        shard_size: NonZeroUsize::new(16).unwrap(),
        param_gen: ParamGenSpec::Const {
            value: 0.,
            limit: 10,
        },
        optimizer: OptimizerSpec::adam(0.01),
        synchronizer: SynchronizerSpec::Barrier {
            replicas_to_aggregate: 4,
        },
        seed: Some(7),
    };

    tx.send(&Msg::Control(Command::Initialize(spec.clone())))
        .await
        .unwrap();
    tx.send(&Msg::Control(Command::Disconnect)).await.unwrap();

    let (rx, tx) = io::split(two);
    let (mut rx, _) = comms::channel(rx, tx);
    let mut buf: Vec<f32> = Vec::new();

    match rx.recv_into(&mut buf).await.unwrap() {
        Msg::Control(Command::Initialize(got)) => assert_eq!(got, spec),
        msg => panic!("unexpected message {msg:?}"),
    }

    let msg: Msg = rx.recv_into(&mut buf).await.unwrap();
    assert!(matches!(msg, Msg::Control(Command::Disconnect)));
}

#[tokio::test]
async fn reused_buffer_shrinks_to_message() {
    let (one, two) = io::duplex(BUF_SIZE);
    let (rx, tx) = io::split(one);
    let (_, mut tx) = comms::channel(rx, tx);

    let big = [1.; 64];
    let small = [2.; 2];
    tx.send(&Msg::Data(Payload::Gradient { step: 0, grad: &big }))
        .await
        .unwrap();
    tx.send(&Msg::Data(Payload::Gradient { step: 1, grad: &small }))
        .await
        .unwrap();

    let (rx, tx) = io::split(two);
    let (mut rx, _) = comms::channel(rx, tx);
    let mut buf: Vec<f32> = Vec::new();

    let _: Msg = rx.recv_into(&mut buf).await.unwrap();
    let msg: Msg = rx.recv_into(&mut buf).await.unwrap();

    let Msg::Data(Payload::Gradient { step, grad }) = msg else {
        panic!("unexpected message {msg:?}");
    };

    assert_eq!(step, 1);
    assert_eq!(grad, small);
}
