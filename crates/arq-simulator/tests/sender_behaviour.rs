//! Sender invariants checked against the simulated lossy link.

use arq_abstract::{LinkConfig, SenderConfig, Verbosity};
use arq_core::{ArqSender, PatternSource, SenderError, SenderState};
use arq_simulator::SimulatedLink;

fn sender(config: SenderConfig, link: LinkConfig) -> ArqSender<SimulatedLink> {
    let config = SenderConfig {
        verbosity: Verbosity::QUIET,
        ..config
    };
    ArqSender::new(
        config,
        SimulatedLink::new(link),
        Box::new(PatternSource::default()),
    )
    .unwrap()
}

fn fixed_latency(ms: u64) -> LinkConfig {
    LinkConfig {
        min_latency: ms,
        max_latency: ms,
        ..Default::default()
    }
}

#[tokio::test]
async fn window_bound_and_base_monotonic_on_lossy_link() {
    let config = SenderConfig {
        window_size: 8,
        probe_frequency: 50,
        total_packets: 300,
        ..Default::default()
    };
    let link = LinkConfig {
        loss_rate: 0.2,
        ack_loss_rate: 0.1,
        duplicate_rate: 0.1,
        seed: 7,
        ..Default::default()
    };
    let mut s = sender(config, link);

    let mut last_base = 0;
    loop {
        let state = s.step().await.unwrap();
        let window = s.window();
        assert!(window.next_seqno() - window.base() <= 8);
        assert!(window.base() >= last_base);
        last_base = window.base();
        if state == SenderState::Done {
            break;
        }
        assert!(window.base() < 300, "finished without reporting Done");
    }

    assert_eq!(s.window().base(), 300);
    assert_eq!(s.link().receiver.delivered.len(), 300);
    let report = s.report();
    assert!(report.retransmissions > 0);
    assert!(report.rtt_samples > 0);
}

#[tokio::test]
async fn silent_receiver_only_sees_base_retransmitted() {
    let config = SenderConfig {
        window_size: 5,
        total_packets: 20,
        max_consecutive_timeouts: Some(3),
        ..Default::default()
    };
    let link = LinkConfig {
        ack_loss_rate: 1.0,
        ..fixed_latency(10)
    };
    let mut s = sender(config, link);

    let err = s.run().await.unwrap_err();
    assert!(matches!(
        err,
        SenderError::PeerUnresponsive {
            timeouts: 4,
            base: 0
        }
    ));

    let sent: Vec<u32> = s.link().transmissions.iter().map(|&(_, n)| n).collect();
    assert_eq!(sent, vec![0, 1, 2, 3, 4, 0, 0, 0]);
    assert_eq!(s.window().base(), 0);
}

#[tokio::test]
async fn dropped_packet_is_resent_exactly_once() {
    let config = SenderConfig {
        total_packets: 30,
        ..Default::default()
    };
    let mut link = SimulatedLink::new(fixed_latency(10));
    link.add_drop_data_once(3);
    let mut s = ArqSender::new(
        SenderConfig {
            verbosity: Verbosity::QUIET,
            ..config
        },
        link,
        Box::new(PatternSource::default()),
    )
    .unwrap();

    let report = s.run().await.unwrap();
    assert_eq!(report.retransmissions, 1);
    assert_eq!(report.transmissions, 31);
    assert_eq!(s.link().transmissions_of(3), 2);
    assert_eq!(s.link().receiver.delivered.len(), 30);
    assert_eq!(s.link().receiver.duplicates, 0);
}

#[tokio::test]
async fn corrupted_acks_are_discarded_and_recovered() {
    let config = SenderConfig {
        window_size: 10,
        total_packets: 100,
        ..Default::default()
    };
    let link = LinkConfig {
        corrupt_rate: 0.3,
        seed: 11,
        ..Default::default()
    };
    let mut s = sender(config, link);

    let report = s.run().await.unwrap();
    assert!(report.malformed_acks > 0);
    assert!(s.link().receiver.rejected > 0);
    assert_eq!(report.acks_received, 100);
    assert_eq!(s.link().receiver.delivered.len(), 100);
}

#[tokio::test]
async fn same_seed_same_session() {
    let config = SenderConfig {
        window_size: 6,
        total_packets: 80,
        ..Default::default()
    };
    let link = LinkConfig {
        loss_rate: 0.15,
        ack_loss_rate: 0.15,
        seed: 99,
        ..Default::default()
    };

    let mut a = sender(config.clone(), link.clone());
    let mut b = sender(config, link);
    let ra = a.run().await.unwrap();
    let rb = b.run().await.unwrap();

    assert_eq!(ra, rb);
    assert_eq!(a.link().transmissions, b.link().transmissions);
}

#[tokio::test]
async fn transfer_shorter_than_window() {
    let config = SenderConfig {
        window_size: 10,
        total_packets: 3,
        ..Default::default()
    };
    let mut s = sender(config, fixed_latency(5));
    let report = s.run().await.unwrap();
    assert_eq!(report.transmissions, 3);
    assert_eq!(report.retransmissions, 0);
    assert_eq!(s.link().current_time().as_millis(), 10);
}
