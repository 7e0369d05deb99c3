//! End-to-end tests through the public `Bus` handle.

use mbus_core::{sub_topic, unsub_topic, Bus, BusConfig, Conduit, Data, Warner};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingWarner {
    calls: Mutex<Vec<String>>,
}

impl Warner for RecordingWarner {
    fn warning(&self, values: &[&dyn fmt::Debug]) {
        let line = values
            .iter()
            .map(|v| format!("{v:?}"))
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().unwrap().push(line);
    }
}

#[derive(Debug, PartialEq)]
struct Order(u32);

#[tokio::test]
async fn test_orders_end_to_end() {
    let bus = Bus::new(CancellationToken::new(), None);
    let (c1, mut rx1) = Conduit::channel(8);

    bus.subscribe(&c1, ["orders", "done"]).await;

    let order1: Data = Arc::new(Order(1));
    bus.publish_shared("orders", order1.clone()).await;

    let msg = rx1.recv().await.unwrap();
    assert_eq!(msg.topic(), "orders");
    assert!(Arc::ptr_eq(msg.shared_data(), &order1));
    assert_eq!(msg.data::<Order>(), Some(&Order(1)));

    bus.unsubscribe(&c1, ["orders"]).await;
    bus.publish("orders", Order(2)).await;
    // Commands are handled in order: once "done" arrives, order 2 was already
    // fanned out.
    bus.publish("done", ()).await;

    let msg = rx1.recv().await.unwrap();
    assert_eq!(msg.topic(), "done");
    assert!(rx1.try_recv().is_err());
}

#[tokio::test]
async fn test_lifecycle_notifications() {
    let bus = Bus::new(CancellationToken::new(), None);
    let (observer, mut events) = Conduit::channel(16);
    let (c, _rx) = Conduit::channel(8);

    bus.subscribe(
        &observer,
        [sub_topic("a"), sub_topic("b"), unsub_topic("a")],
    )
    .await;
    bus.subscribe(&c, ["a", "b"]).await;
    bus.unsubscribe(&c, ["a"]).await;

    let mut seen = Vec::new();
    for _ in 0..3 {
        let msg = events.recv().await.unwrap();
        assert_eq!(msg.conduit(), Some(&c));
        assert!(msg.is_lifecycle());
        seen.push(msg.topic().to_string());
    }
    assert_eq!(seen, ["sub_a", "sub_b", "unsub_a"]);
}

#[tokio::test]
async fn test_fan_out_same_instance() {
    let bus = Bus::new(CancellationToken::new(), None);
    let (c1, mut rx1) = Conduit::channel(8);
    let (c2, mut rx2) = Conduit::channel(8);

    bus.subscribe(&c1, ["x"]).await;
    bus.subscribe(&c2, ["x"]).await;
    bus.publish("x", String::from("shared")).await;

    let m1 = rx1.recv().await.unwrap();
    let m2 = rx2.recv().await.unwrap();
    assert!(Arc::ptr_eq(&m1, &m2));
}

#[tokio::test(start_paused = true)]
async fn test_slow_consumer_evicted() {
    let warner = Arc::new(RecordingWarner::default());
    let config = BusConfig {
        drop_slow_consumers: true,
        ..BusConfig::default()
    };
    let bus = Bus::with_config(
        config,
        CancellationToken::new(),
        Some(warner.clone() as Arc<dyn Warner>),
    )
    .unwrap();

    let (observer, mut events) = Conduit::channel(8);
    let (slow, _slow_rx) = Conduit::channel(1);

    bus.subscribe(&observer, [unsub_topic("feed")]).await;
    bus.subscribe(&slow, ["feed"]).await;
    bus.publish("feed", 1_u32).await;
    bus.publish("feed", 2_u32).await;

    let notice = events.recv().await.unwrap();
    assert_eq!(notice.topic(), "unsub_feed");
    assert_eq!(notice.conduit(), Some(&slow));

    let calls = warner.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains(&slow.id().to_string()));
    assert!(calls[0].contains("\"feed\""));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_unblocks_waiting_publisher() {
    let token = CancellationToken::new();
    let config = BusConfig {
        queue_capacity: 1,
        ..BusConfig::default()
    };
    let bus = Bus::with_config(config, token.clone(), None).unwrap();
    let (stuck, mut stuck_rx) = Conduit::channel(1);

    bus.subscribe(&stuck, ["x"]).await;
    // The first fills the conduit, the second blocks the dispatcher, the rest
    // fill the queue.
    for i in 0..3_u32 {
        bus.publish("x", i).await;
    }

    let publisher = {
        let bus = bus.clone();
        tokio::spawn(async move { bus.publish("x", 99_u32).await })
    };
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!publisher.is_finished());

    token.cancel();
    tokio::time::timeout(Duration::from_secs(1), publisher)
        .await
        .unwrap()
        .unwrap();
    tokio::time::timeout(Duration::from_secs(1), bus.stopped())
        .await
        .unwrap();

    // Only the message that filled the conduit got through; the blocked
    // delivery and the waiting publish were both abandoned.
    let mut delivered = Vec::new();
    while let Ok(msg) = stuck_rx.try_recv() {
        delivered.extend(msg.data::<u32>().copied());
    }
    assert_eq!(delivered, [0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ids() {
    let bus = Bus::new(CancellationToken::new(), None);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let bus = bus.clone();
            tokio::spawn(async move { (0..500).map(|_| bus.next_id()).collect::<Vec<_>>() })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.extend(handle.await.unwrap());
    }

    let mut parsed: Vec<u64> = ids.iter().map(|id| id.parse().unwrap()).collect();
    let distinct: HashSet<u64> = parsed.iter().copied().collect();
    assert_eq!(distinct.len(), 4000);

    parsed.sort_unstable();
    assert!(parsed.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(parsed.first(), Some(&1));
    assert_eq!(parsed.last(), Some(&4000));
}
