//! Integration tests for the stream bridge.
//!
//! A TLS engine drives byte I/O; the transport below it delivers chunks.
//! These tests stack the two adapters the way a real connection does and
//! validate ordering, backpressure, bidirectionality, and half-open shutdown
//! through the public interface.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use peertls::{duplex_to_io, io_to_duplex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn bytes_flow_both_ways_through_the_bridge() {
    let (near, far) = tokio::io::duplex(16 * 1024);
    let mut engine_side = duplex_to_io(io_to_duplex(near));
    let mut transport_side = far;

    engine_side.write_all(b"client hello").await.expect("write");
    engine_side.flush().await.expect("flush");

    let mut hello = vec![0u8; 12];
    transport_side.read_exact(&mut hello).await.expect("read");
    assert_eq!(&hello, b"client hello");

    transport_side.write_all(b"server hello").await.expect("write");
    let mut reply = vec![0u8; 12];
    engine_side.read_exact(&mut reply).await.expect("read");
    assert_eq!(&reply, b"server hello");
}

#[tokio::test]
async fn chunk_order_is_preserved_under_concurrency() {
    let (near, far) = tokio::io::duplex(256);
    let mut duplex = io_to_duplex(near);
    let mut sink_side = far;

    let producer = tokio::spawn(async move {
        for i in 0u32..500 {
            let chunk = Bytes::from(i.to_be_bytes().to_vec());
            duplex.send(chunk).await.expect("send");
        }
        duplex.close().await.expect("close");
    });

    let mut received = Vec::new();
    sink_side
        .read_to_end(&mut received)
        .await
        .expect("read to end");
    producer.await.expect("producer task");

    assert_eq!(received.len(), 500 * 4);
    for (i, window) in received.chunks_exact(4).enumerate() {
        let value = u32::from_be_bytes(window.try_into().expect("4 bytes"));
        assert_eq!(value as usize, i, "chunks must arrive strictly in order");
    }
}

#[tokio::test]
async fn source_yields_chunks_until_eof() {
    let (near, far) = tokio::io::duplex(1024);
    let mut duplex = io_to_duplex(near);

    {
        let mut far = far;
        far.write_all(b"first").await.expect("write");
        far.flush().await.expect("flush");
        // Give the reader a chance to pick up the first chunk separately.
        tokio::task::yield_now().await;
        far.write_all(b"second").await.expect("write");
        // Dropping far ends the stream.
    }

    let mut collected = Vec::new();
    while let Some(chunk) = duplex.next().await {
        collected.extend_from_slice(&chunk.expect("no transport error"));
    }
    assert_eq!(&collected, b"firstsecond");
}

#[tokio::test]
async fn half_open_shutdown_keeps_the_inbound_path_alive() {
    let (near, far) = tokio::io::duplex(1024);
    let mut engine_side = duplex_to_io(io_to_duplex(near));
    let mut transport_side = far;

    engine_side.write_all(b"closing").await.expect("write");
    engine_side.shutdown().await.expect("shutdown");

    let mut outbound = Vec::new();
    transport_side
        .read_to_end(&mut outbound)
        .await
        .expect("read outbound");
    assert_eq!(&outbound, b"closing");

    // The other direction is still open.
    transport_side
        .write_all(b"still here")
        .await
        .expect("write after peer shutdown");
    drop(transport_side);

    let mut inbound = Vec::new();
    engine_side
        .read_to_end(&mut inbound)
        .await
        .expect("read inbound");
    assert_eq!(&inbound, b"still here");
}

#[tokio::test]
async fn bulk_transfer_survives_small_transport_buffers() {
    // A 1 KiB transport buffer forces continuous backpressure cycles.
    let (near, far) = tokio::io::duplex(1024);
    let mut engine_side = duplex_to_io(io_to_duplex(near));
    let mut transport_side = far;

    let payload: Vec<u8> = (0..256 * 1024u32).map(|i| (i % 239) as u8).collect();
    let expected = payload.clone();

    let writer = tokio::spawn(async move {
        engine_side.write_all(&payload).await.expect("bulk write");
        engine_side.shutdown().await.expect("shutdown");
    });

    let mut received = Vec::new();
    transport_side
        .read_to_end(&mut received)
        .await
        .expect("bulk read");
    writer.await.expect("writer task");

    assert_eq!(received.len(), expected.len());
    assert_eq!(received, expected, "payload must survive re-chunking intact");
}

#[tokio::test]
async fn two_bridges_back_to_back_stay_transparent() {
    // transport <-> bridge <-> bridge <-> transport: the double conversion
    // must not change the byte stream.
    let (a, b) = tokio::io::duplex(4096);
    let mut left = duplex_to_io(io_to_duplex(a));
    let mut right = duplex_to_io(io_to_duplex(b));

    let echo = tokio::spawn(async move {
        let mut buf = vec![0u8; 5];
        right.read_exact(&mut buf).await.expect("read");
        right.write_all(&buf).await.expect("echo");
        right.flush().await.expect("flush");
    });

    left.write_all(b"ping!").await.expect("write");
    left.flush().await.expect("flush");

    let mut reply = vec![0u8; 5];
    left.read_exact(&mut reply).await.expect("read reply");
    echo.await.expect("echo task");
    assert_eq!(&reply, b"ping!");
}
