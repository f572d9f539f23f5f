//! Property checks of the port state machine against a small reference model.

use std::sync::Arc;

use channel_scenarios::Collector;
use message_channel::{MessageHub, PortState, StateViolation};
use proptest::collection;
use proptest::prelude::*;
use runtime_native::TaskRuntime;

#[derive(Clone, Copy, Debug)]
enum Op {
    Post,
    Listen,
    Transfer,
    Close,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => Just(Op::Post),
        1 => Just(Op::Listen),
        1 => Just(Op::Transfer),
        1 => Just(Op::Close),
    ]
}

/// Expected outcome of `op` on a port in `state`, and the state afterwards.
fn model(state: PortState, op: Op) -> (Option<StateViolation>, PortState) {
    use PortState::*;
    match (state, op) {
        (Transferred, Op::Close) => (Some(StateViolation::AlreadyTransferred), Transferred),
        (_, Op::Close) => (None, Closed),
        (Transferred, _) => (Some(StateViolation::AlreadyTransferred), Transferred),
        (Closed, _) => (Some(StateViolation::AlreadyClosed), Closed),
        (Started, Op::Transfer) => (Some(StateViolation::AlreadyStarted), Started),
        (Pending, Op::Transfer) => (None, Transferred),
        (Pending | Started, Op::Post | Op::Listen) => (None, Started),
    }
}

proptest! {
    /// Every operation sequence agrees with the model, and the peer sees exactly the accepted posts.
    #[test]
    fn port_follows_the_state_model(ops in collection::vec(op(), 1..64)) {
        let hub = MessageHub::new();
        let (port, peer) = hub.create_channel().into_ports();
        let (carrier, _inbox) = hub.create_channel().into_ports();
        let delivered = Collector::new();
        let sink = Arc::clone(&delivered);
        peer.set_message_callback(
            move |message| sink.push(message.payload().as_text().unwrap_or_default().to_owned()),
            None,
        ).expect("listen on peer");

        let mut state = PortState::Pending;
        let mut accepted = Vec::new();
        for (step, op) in ops.into_iter().enumerate() {
            let outcome = match op {
                Op::Post => {
                    let text = step.to_string();
                    let result = port.post_message(text.as_str(), &[]);
                    if result.is_ok() {
                        accepted.push(text);
                    }
                    result
                }
                Op::Listen => port.set_message_callback(|_| {}, None),
                Op::Transfer => carrier.post_message("carry", &[port.clone()]),
                Op::Close => port.close(),
            };
            let (expected_err, next) = model(state, op);
            prop_assert_eq!(outcome.err().map(|err| err.violation()), expected_err);
            prop_assert_eq!(port.state(), next);
            state = next;
        }
        prop_assert_eq!(delivered.snapshot(), accepted);
    }

    /// Whatever the dispatch budget, delivery order matches posting order.
    #[test]
    fn budget_never_reorders(budget in 1usize..8, count in 1usize..200) {
        let runtime = Arc::new(TaskRuntime::new("prop"));
        let hub = MessageHub::builder()
            .default_executor(runtime.clone())
            .dispatch_budget(budget)
            .build();
        let (a, b) = hub.create_channel().into_ports();
        let delivered = Collector::new();
        let sink = Arc::clone(&delivered);
        b.set_message_callback(
            move |message| sink.push(message.payload().as_text().unwrap_or_default().to_owned()),
            None,
        ).expect("listen");

        let sent: Vec<String> = (0..count).map(|i| i.to_string()).collect();
        for text in &sent {
            a.post_message(text.as_str(), &[]).expect("post");
        }
        runtime.run_until_idle();
        prop_assert_eq!(delivered.snapshot(), sent);
    }
}
