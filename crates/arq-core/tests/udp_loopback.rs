//! End-to-end transfer over the loopback interface.
//!
//! The receiver runs as a separate tokio task and acks every valid data
//! packet with its own seqno, dropping the first copy of every seventh packet
//! so the sender has to recover through its timeout path.

use std::collections::BTreeSet;

use arq_abstract::{SenderConfig, Verbosity, decode_data, encode_ack};
use arq_core::{ArqSender, ChunkSource, UdpLink};
use tokio::net::UdpSocket;

const TOTAL: u32 = 60;

async fn ack_receiver(socket: UdpSocket) -> (BTreeSet<u32>, Vec<u8>) {
    let mut buf = vec![0u8; 2048];
    let mut seen = BTreeSet::new();
    let mut dropped = BTreeSet::new();
    let mut chunks = vec![Vec::new(); TOTAL as usize];

    while seen.len() < TOTAL as usize {
        let (n, from) = socket.recv_from(&mut buf).await.expect("recv");
        let packet = decode_data(&buf[..n]).expect("data packet");
        assert!(packet.header.is_valid());
        let seqno = packet.seqno();

        if seqno % 7 == 3 && dropped.insert(seqno) {
            continue;
        }
        chunks[seqno as usize] = packet.payload.to_vec();
        seen.insert(seqno);
        socket
            .send_to(&encode_ack(seqno), from)
            .await
            .expect("send ack");
    }
    (seen, chunks.concat())
}

#[tokio::test]
async fn transfer_survives_drops_over_loopback() {
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
    let port = socket.local_addr().unwrap().port();
    let receiver = tokio::spawn(ack_receiver(socket));

    let data: Vec<u8> = (0..TOTAL * 32).map(|i| (i % 251) as u8).collect();
    let config = SenderConfig {
        window_size: 5,
        probe_frequency: 10,
        initial_timeout: 0.05,
        total_packets: TOTAL,
        verbosity: Verbosity::QUIET,
        ..Default::default()
    };
    let link = UdpLink::connect("127.0.0.1", port).await.expect("connect");
    let mut sender =
        ArqSender::new(config, link, Box::new(ChunkSource::new(data.clone(), 32))).unwrap();

    let report = sender.run().await.expect("transfer");
    assert_eq!(report.acks_received, TOTAL);
    assert!(report.retransmissions >= 1);

    let (seen, received) = receiver.await.unwrap();
    assert_eq!(seen, (0..TOTAL).collect::<BTreeSet<_>>());
    assert_eq!(received, data);
}
