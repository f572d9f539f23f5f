#![cfg(all(test, not(target_arch = "wasm32")))]

use std::sync::Arc;
use std::time::Duration;

use channel_scenarios::Collector;
use message_channel::{MessageHub, MessagePort, PortState, StateViolation};

const WAIT: Duration = Duration::from_secs(1);

/// Listens on `port` and collects text payloads.
fn texts(port: &MessagePort) -> Arc<Collector<String>> {
    let collector = Collector::new();
    let sink = Arc::clone(&collector);
    port.set_message_callback(
        move |message| sink.push(message.payload().as_text().unwrap_or_default().to_owned()),
        None,
    )
    .expect("listen");
    collector
}

/// Listens on `port` and collects every transferred port.
fn received_ports(port: &MessagePort) -> Arc<Collector<MessagePort>> {
    let collector = Collector::new();
    let sink = Arc::clone(&collector);
    port.set_message_callback(
        move |message| {
            for port in message.ports() {
                sink.push(port.clone());
            }
        },
        None,
    )
    .expect("listen");
    collector
}

#[test]
fn a_port_can_be_transferred_only_once() {
    let hub = MessageHub::new();
    let (a, b) = hub.create_channel().into_ports();
    let (carrier, inbox) = hub.create_channel().into_ports();
    let arrivals = received_ports(&inbox);

    carrier.post_message("take", &[b.clone()]).expect("first transfer");
    assert_eq!(b.state(), PortState::Transferred);

    let err = carrier
        .post_message("again", &[b.clone()])
        .expect_err("second transfer");
    assert_eq!(err.violation(), StateViolation::AlreadyTransferred);
    assert_eq!(err.port(), b.id());

    let moved = arrivals.wait_for(1, WAIT);
    assert_eq!(moved.len(), 1, "failed transfer must not deliver");
    assert_ne!(moved[0].id(), b.id());
    assert!(moved[0].is_entangled_with(&a));
}

#[test]
fn a_started_port_cannot_be_transferred() {
    let hub = MessageHub::new();
    let (a, _b) = hub.create_channel().into_ports();
    let (pending, _pending_peer) = hub.create_channel().into_ports();
    let (carrier, _inbox) = hub.create_channel().into_ports();

    a.post_message("start", &[]).expect("post starts the port");
    assert!(a.is_started());

    let err = carrier
        .post_message("carry", &[pending.clone(), a.clone()])
        .expect_err("started port in transfer list");
    assert_eq!(err.message(), "Port is already started");
    assert!(
        pending.is_pending(),
        "a rejected transfer list leaves every port untouched"
    );
    assert!(a.is_started());
}

#[test]
fn a_listening_port_counts_as_started() {
    let hub = MessageHub::new();
    let (a, _b) = hub.create_channel().into_ports();
    let (carrier, _inbox) = hub.create_channel().into_ports();
    a.set_message_callback(|_| {}, None).expect("listen");
    let err = carrier
        .post_message("carry", &[a.clone()])
        .expect_err("listening port");
    assert_eq!(err.violation(), StateViolation::AlreadyStarted);
}

#[test]
fn a_closed_port_rejects_every_operation() {
    let hub = MessageHub::new();
    let (a, b) = hub.create_channel().into_ports();
    let (carrier, _inbox) = hub.create_channel().into_ports();
    a.close().expect("close");

    let post = a.post_message("late", &[]).expect_err("post after close");
    assert_eq!(post.violation(), StateViolation::AlreadyClosed);
    let listen = a.set_message_callback(|_| {}, None).expect_err("listen after close");
    assert_eq!(listen.violation(), StateViolation::AlreadyClosed);
    let transfer = carrier.post_message("carry", &[a.clone()]).expect_err("transfer");
    assert_eq!(transfer.violation(), StateViolation::AlreadyClosed);

    a.close().expect("closing again is a no-op");
    b.post_message("to the closed side", &[]).expect("peer may still post");
    assert_eq!(a.metrics().dropped, 1);
}

#[test]
fn a_transferred_handle_cannot_close() {
    let hub = MessageHub::new();
    let (_a, b) = hub.create_channel().into_ports();
    let (carrier, _inbox) = hub.create_channel().into_ports();
    carrier.post_message("carry", &[b.clone()]).expect("transfer");
    let err = b.close().expect_err("close after transfer");
    assert_eq!(err.message(), "Port is already transferred");
    assert!(b.is_transferred());
}

#[test]
fn transferring_a_port_leaves_its_sibling_untouched() {
    let hub = MessageHub::new();
    let (a, b) = hub.create_channel().into_ports();
    let (carrier, inbox) = hub.create_channel().into_ports();
    let arrivals = received_ports(&inbox);

    carrier.post_message("take", &[b.clone()]).expect("transfer");
    assert!(b.is_transferred());
    assert!(a.is_pending(), "the sibling keeps its state");

    let moved = arrivals.wait_for(1, WAIT);
    let port = moved.first().expect("port arrived");
    assert!(port.is_entangled_with(&a));
    let at_moved = texts(port);
    a.post_message("to the new owner", &[]).expect("sibling still posts");
    assert_eq!(at_moved.wait_for(1, WAIT), vec!["to the new owner"]);

    let at_sibling = texts(&a);
    port.post_message("back", &[]).expect("moved port posts");
    assert_eq!(at_sibling.wait_for(1, WAIT), vec!["back"]);
    assert!(a.is_started());
}

#[test]
fn a_received_port_is_usable_immediately() {
    let hub = MessageHub::new();
    let (a, b) = hub.create_channel().into_ports();
    let (carrier, inbox) = hub.create_channel().into_ports();
    let arrivals = received_ports(&inbox);
    let replies = texts(&a);

    carrier.post_message("take", &[b]).expect("transfer");
    let moved = arrivals.wait_for(1, WAIT);
    let port = moved.first().expect("port arrived");
    assert!(port.is_pending());
    port.post_message("ping", &[]).expect("post without listening first");
    assert_eq!(replies.wait_for(1, WAIT), vec!["ping"]);
}

#[test]
fn messages_queued_before_transfer_follow_the_port() {
    let hub = MessageHub::new();
    let (a, b) = hub.create_channel().into_ports();
    let (carrier, inbox) = hub.create_channel().into_ports();
    let arrivals = received_ports(&inbox);

    a.post_message("one", &[]).expect("post");
    a.post_message("two", &[]).expect("post");
    assert_eq!(b.queued_len(), 2);
    carrier.post_message("take", &[b]).expect("transfer");

    let moved = arrivals.wait_for(1, WAIT);
    let port = moved.first().expect("port arrived");
    assert_eq!(port.queued_len(), 2);
    assert_eq!(texts(port).wait_for(2, WAIT), vec!["one", "two"]);
}

#[test]
fn closing_the_sender_keeps_messages_already_sent() {
    let hub = MessageHub::new();
    let (a, b) = hub.create_channel().into_ports();
    a.post_message("2", &[]).expect("post");
    a.post_message("3", &[]).expect("post");
    a.close().expect("close sender");

    let received = texts(&b);
    assert_eq!(received.wait_for(2, WAIT).concat(), "23");
}

#[test]
fn ids_are_never_reused() {
    let hub = MessageHub::new();
    let mut seen = std::collections::BTreeSet::new();
    let (carrier, inbox) = hub.create_channel().into_ports();
    let arrivals = received_ports(&inbox);
    for _ in 0..16 {
        let (a, b) = hub.create_channel().into_ports();
        assert!(seen.insert(a.id()));
        assert!(seen.insert(b.id()));
        carrier.post_message("take", &[b]).expect("transfer");
    }
    for port in arrivals.wait_for(16, WAIT) {
        assert!(seen.insert(port.id()), "{} was handed out twice", port.id());
    }
}
