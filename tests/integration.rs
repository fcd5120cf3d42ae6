//! Integration tests for bytewire.
//!
//! These tests drive a server over an in-memory stream, the way a real
//! connection would.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use bytewire::codec::MsgPackCodec;
use bytewire::protocol::{CodecConfig, FrameCodec, FrameDecoder, TypeRegistry};
use bytewire::rpc::{
    typed_handler, FrameRpcCodec, RpcMessage, RpcReplyer, RpcRequest, RpcResponse, RpcServer,
};
use bytewire::transport::{serve_stream, spawn_writer_task_default};
use bytewire::{Result, WireError};

#[derive(Serialize, Deserialize)]
struct Div {
    a: i64,
    b: i64,
}

struct Harness {
    client: DuplexStream,
    rpc: FrameRpcCodec,
    decoder: FrameDecoder,
    pending: VecDeque<RpcResponse>,
    served: JoinHandle<Result<()>>,
}

impl Harness {
    fn start(server: Arc<RpcServer>, rpc: FrameRpcCodec) -> Self {
        let (client, server_io) = duplex(4096);
        let (read_half, write_half) = tokio::io::split(server_io);
        let (writer, _writer_task) = spawn_writer_task_default(write_half);

        let decoder = FrameDecoder::new(rpc.frame_codec().clone());
        let served = tokio::spawn(serve_stream(read_half, decoder, server, Arc::new(writer)));

        Self {
            client,
            decoder: FrameDecoder::new(rpc.frame_codec().clone()),
            pending: VecDeque::new(),
            rpc,
            served,
        }
    }

    async fn send(&mut self, request: &RpcRequest) {
        let frame = self.rpc.encode_request(request).unwrap();
        self.client.write_all(&frame).await.unwrap();
    }

    async fn recv(&mut self) -> RpcResponse {
        let mut buf = [0u8; 1024];
        loop {
            if let Some(response) = self.pending.pop_front() {
                return response;
            }

            let n = tokio::time::timeout(Duration::from_secs(5), self.client.read(&mut buf))
                .await
                .expect("response within timeout")
                .unwrap();
            assert!(n > 0, "stream closed before a response arrived");

            for message in self.decoder.push(&buf[..n]).unwrap() {
                match self.rpc.decode_message(message).unwrap() {
                    RpcMessage::Response(response) => self.pending.push_back(response),
                    RpcMessage::Request(request) => panic!("unexpected request {request:?}"),
                }
            }
        }
    }
}

fn setup() -> (Arc<RpcServer>, FrameRpcCodec) {
    let codec = FrameCodec::new(Arc::new(TypeRegistry::new()), CodecConfig::default());
    let rpc = FrameRpcCodec::new(codec).unwrap();
    let server = Arc::new(RpcServer::new(Arc::new(rpc.clone()), Arc::new(rpc.clone())));

    server
        .register_method("echo", |r: RpcReplyer, arg: Bytes| {
            r.reply(Ok(arg));
        })
        .unwrap();
    server
        .register_method(
            "div",
            typed_handler(|r: RpcReplyer, args: Div| {
                if args.b == 0 {
                    r.reply_err("division by zero");
                } else {
                    r.reply_ok(&(args.a / args.b));
                }
            }),
        )
        .unwrap();
    server
        .register_method("crash", |_r: RpcReplyer, _arg: Bytes| {
            panic!("handler exploded");
        })
        .unwrap();
    server
        .register_method("later", |r: RpcReplyer, arg: Bytes| {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                r.reply(Ok(arg));
            });
        })
        .unwrap();

    (server, rpc)
}

#[tokio::test]
async fn test_echo_over_stream() {
    let (server, rpc) = setup();
    let mut harness = Harness::start(server, rpc);

    harness.send(&RpcRequest::call(1, "echo", b"ping".to_vec())).await;
    let response = harness.recv().await;

    assert_eq!(response, RpcResponse::ok(1, b"ping".to_vec()));
}

#[tokio::test]
async fn test_typed_handler_over_stream() {
    let (server, rpc) = setup();
    let mut harness = Harness::start(server, rpc);

    let arg = MsgPackCodec::encode(&Div { a: 84, b: 2 }).unwrap();
    harness.send(&RpcRequest::call(2, "div", arg)).await;
    let response = harness.recv().await;
    let ret = response.result.unwrap();
    assert_eq!(MsgPackCodec::decode::<i64>(&ret).unwrap(), 42);

    let arg = MsgPackCodec::encode(&Div { a: 1, b: 0 }).unwrap();
    harness.send(&RpcRequest::call(3, "div", arg)).await;
    assert_eq!(
        harness.recv().await,
        RpcResponse::err(3, "division by zero")
    );
}

#[tokio::test]
async fn test_unknown_method_over_stream() {
    let (server, rpc) = setup();
    let mut harness = Harness::start(server, rpc);

    harness.send(&RpcRequest::call(77, "missing", Vec::new())).await;
    let response = harness.recv().await;

    assert_eq!(response.seq, 77);
    assert_eq!(response.result, Err("invalid method: missing".to_string()));
}

#[tokio::test]
async fn test_panic_does_not_kill_connection() {
    let (server, rpc) = setup();
    let mut harness = Harness::start(server, rpc);

    harness.send(&RpcRequest::call(5, "crash", Vec::new())).await;
    let response = harness.recv().await;
    assert_eq!(response.seq, 5);
    assert!(response
        .result
        .unwrap_err()
        .starts_with("handler exploded"));

    harness.send(&RpcRequest::call(6, "echo", b"still here".to_vec())).await;
    assert_eq!(
        harness.recv().await,
        RpcResponse::ok(6, b"still here".to_vec())
    );
}

#[tokio::test]
async fn test_notify_gets_no_response() {
    let (server, rpc) = setup();
    let mut harness = Harness::start(server, rpc);

    harness.send(&RpcRequest::notify(8, "echo", b"quiet".to_vec())).await;
    harness.send(&RpcRequest::call(9, "echo", b"loud".to_vec())).await;

    // Only the second request is answered.
    assert_eq!(harness.recv().await, RpcResponse::ok(9, b"loud".to_vec()));
}

#[tokio::test]
async fn test_deferred_reply() {
    let (server, rpc) = setup();
    let mut harness = Harness::start(server, rpc);

    harness.send(&RpcRequest::call(10, "later", b"soon".to_vec())).await;
    assert_eq!(harness.recv().await, RpcResponse::ok(10, b"soon".to_vec()));
}

#[tokio::test]
async fn test_request_split_across_writes() {
    let (server, rpc) = setup();
    let mut harness = Harness::start(server, rpc.clone());

    let frame = rpc
        .encode_request(&RpcRequest::call(11, "echo", vec![7u8; 300]))
        .unwrap();
    for chunk in frame.chunks(7) {
        harness.client.write_all(chunk).await.unwrap();
        harness.client.flush().await.unwrap();
        tokio::task::yield_now().await;
    }

    assert_eq!(harness.recv().await, RpcResponse::ok(11, vec![7u8; 300]));
}

#[tokio::test]
async fn test_pipelined_requests_answered_in_order() {
    let (server, rpc) = setup();
    let mut harness = Harness::start(server, rpc.clone());

    let mut batch = Vec::new();
    for seq in 0..5u64 {
        batch.extend_from_slice(
            &rpc.encode_request(&RpcRequest::call(seq, "echo", seq.to_be_bytes().to_vec()))
                .unwrap(),
        );
    }
    harness.client.write_all(&batch).await.unwrap();

    for seq in 0..5u64 {
        let response = harness.recv().await;
        assert_eq!(response, RpcResponse::ok(seq, seq.to_be_bytes().to_vec()));
    }
}

#[tokio::test]
async fn test_unknown_type_frame_is_skipped() {
    let (server, rpc) = setup();
    let mut harness = Harness::start(server, rpc.clone());

    // Valid length, type id nobody registered, then a real request.
    let mut data = vec![0, 0, 0, 5, 0, 0, 0, 99, 0];
    data.extend_from_slice(
        &rpc.encode_request(&RpcRequest::call(12, "echo", b"after".to_vec()))
            .unwrap(),
    );
    harness.client.write_all(&data).await.unwrap();

    assert_eq!(harness.recv().await, RpcResponse::ok(12, b"after".to_vec()));
}

#[tokio::test]
async fn test_corrupt_stream_ends_session() {
    let (server, rpc) = setup();
    let mut harness = Harness::start(server, rpc.clone());

    // A request, then a zero-length frame in the same write.
    let mut data = rpc
        .encode_request(&RpcRequest::call(13, "echo", b"last".to_vec()))
        .unwrap()
        .to_vec();
    data.extend_from_slice(&[0, 0, 0, 0]);
    harness.client.write_all(&data).await.unwrap();

    assert_eq!(harness.recv().await, RpcResponse::ok(13, b"last".to_vec()));

    let result = tokio::time::timeout(Duration::from_secs(5), &mut harness.served)
        .await
        .expect("session ends")
        .unwrap();
    assert!(matches!(result, Err(WireError::MalformedFrame(_))));
}

#[tokio::test]
async fn test_clean_shutdown_on_eof() {
    let (server, rpc) = setup();
    let harness = Harness::start(server, rpc);

    drop(harness.client);
    let result = tokio::time::timeout(Duration::from_secs(5), harness.served)
        .await
        .expect("session ends")
        .unwrap();
    assert!(result.is_ok());
}

#[test]
fn test_ping_frame_bytes() {
    // A one-byte body on type id 1 is framed as len=5, id=1, body.
    #[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
    struct Ping(bool);

    let registry = Arc::new(TypeRegistry::new());
    assert_eq!(registry.register::<Ping>().unwrap(), 1);
    let codec = FrameCodec::new(registry, CodecConfig::with_max_message_size(1024));

    // MsgPack encodes a newtype as its inner value: one byte for `true`.
    let frame = codec.encode(&Ping(true)).unwrap().into_bytes();
    assert_eq!(&frame[..], &[0, 0, 0, 5, 0, 0, 0, 1, 0xc3]);

    let decoded = codec.decode(&frame, 0, frame.len()).unwrap().unwrap();
    assert_eq!(decoded.consumed, 9);
    assert_eq!(decoded.message.downcast_ref::<Ping>(), Some(&Ping(true)));
}
