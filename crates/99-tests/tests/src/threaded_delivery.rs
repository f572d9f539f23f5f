#![cfg(all(test, not(target_arch = "wasm32")))]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use channel_scenarios::{
    run_scenario, verify_report, Collector, EchoRealm, ScenarioConfig, ScenarioEnv,
};
use frame_bridge::MainFrameBridge;
use message_channel::{MessageHub, MessagePayload};
use runtime_native::{Looper, TaskRuntime};

const WAIT: Duration = Duration::from_secs(5);

fn looper(name: &str) -> Arc<Looper> {
    Arc::new(Looper::spawn(name).expect("spawn looper"))
}

#[test]
fn posts_from_many_threads_keep_per_sender_order() {
    const SENDERS: usize = 4;
    const PER_SENDER: usize = 250;

    let looper = looper("receiver");
    let hub = MessageHub::builder().default_executor(looper.clone()).build();
    let (a, b) = hub.create_channel().into_ports();
    let received = Collector::new();
    let sink = Arc::clone(&received);
    b.set_message_callback(
        move |message| sink.push(message.payload().as_text().unwrap_or_default().to_owned()),
        None,
    )
    .expect("listen");

    let senders: Vec<_> = (0..SENDERS)
        .map(|sender| {
            let port = a.clone();
            thread::spawn(move || {
                for i in 0..PER_SENDER {
                    port.post_message(format!("{sender}:{i}"), &[]).expect("post");
                }
            })
        })
        .collect();
    for sender in senders {
        sender.join().expect("sender thread");
    }

    let all = received.wait_for(SENDERS * PER_SENDER, WAIT);
    assert_eq!(all.len(), SENDERS * PER_SENDER);
    let mut next = [0usize; SENDERS];
    for text in &all {
        let (sender, index) = text.split_once(':').expect("tagged message");
        let sender: usize = sender.parse().expect("sender");
        let index: usize = index.parse().expect("index");
        assert_eq!(index, next[sender], "sender {sender} reordered");
        next[sender] += 1;
    }
    looper.shutdown();
}

#[test]
fn closing_while_a_sender_runs_delivers_a_prefix() {
    const TOTAL: usize = 2_000;

    let looper = looper("closing");
    let hub = MessageHub::builder().default_executor(looper.clone()).build();
    let (a, b) = hub.create_channel().into_ports();
    let received = Collector::new();
    let sink = Arc::clone(&received);
    b.set_message_callback(
        move |message| sink.push(message.payload().as_text().unwrap_or_default().to_owned()),
        None,
    )
    .expect("listen");

    let sender = thread::spawn(move || {
        for i in 0..TOTAL {
            a.post_message(i.to_string(), &[]).expect("sender stays open");
        }
    });
    thread::sleep(Duration::from_millis(1));
    b.close().expect("close receiver");
    sender.join().expect("sender thread");
    let deadline = Instant::now() + WAIT;
    while b.metrics().pending() > 0 && Instant::now() < deadline {
        looper.sync(WAIT);
    }
    assert!(looper.sync(WAIT), "looper drained");

    let delivered = received.snapshot();
    assert!(delivered.len() <= TOTAL);
    for (expected, text) in delivered.iter().enumerate() {
        assert_eq!(*text, expected.to_string(), "delivery must be a gap-free prefix");
    }
    let metrics = b.metrics();
    assert_eq!(
        metrics.delivered as usize + metrics.dropped as usize + metrics.discarded as usize,
        TOTAL
    );
    looper.shutdown();
}

#[test]
fn a_port_transferred_on_another_thread_keeps_every_message() {
    const TOTAL: usize = 1_000;

    let looper = looper("transfer");
    let hub = MessageHub::builder().default_executor(looper.clone()).build();
    let (a, b) = hub.create_channel().into_ports();
    let (carrier, inbox) = hub.create_channel().into_ports();
    let arrivals = Collector::new();
    let sink = Arc::clone(&arrivals);
    inbox
        .set_message_callback(
            move |message| {
                for port in message.ports() {
                    sink.push(port.clone());
                }
            },
            None,
        )
        .expect("listen on inbox");

    let sender = thread::spawn(move || {
        for i in 0..TOTAL {
            a.post_message(i.to_string(), &[]).expect("post while the peer moves");
        }
        a
    });
    let mover = thread::spawn(move || {
        carrier.post_message("take", &[b.clone()]).expect("transfer");
        assert!(b.is_transferred());
        carrier
    });
    let _carrier = mover.join().expect("mover thread");
    let _a = sender.join().expect("sender thread");

    let moved = arrivals.wait_for(1, WAIT);
    let port = moved.first().expect("port arrived");
    let received = Collector::new();
    let sink = Arc::clone(&received);
    port.set_message_callback(
        move |message| sink.push(message.payload().as_text().unwrap_or_default().to_owned()),
        None,
    )
    .expect("listen on moved port");

    let expected: Vec<String> = (0..TOTAL).map(|i| i.to_string()).collect();
    assert_eq!(received.wait_for(TOTAL, WAIT), expected);
    looper.shutdown();
}

#[test]
fn callbacks_follow_the_executor_they_were_registered_with() {
    let first = Arc::new(TaskRuntime::new("first"));
    let second = Arc::new(TaskRuntime::new("second"));
    let hub = MessageHub::new();
    let (a, b) = hub.create_channel().into_ports();

    let seen = Collector::new();
    let sink = Arc::clone(&seen);
    b.set_message_callback(
        move |message| sink.push(("first", message.payload().clone())),
        Some(first.clone()),
    )
    .expect("listen on first");
    a.post_message("one", &[]).expect("post");

    let sink = Arc::clone(&seen);
    b.set_message_callback(
        move |message| sink.push(("second", message.payload().clone())),
        Some(second.clone()),
    )
    .expect("switch to second");
    a.post_message("two", &[]).expect("post");

    first.run_until_idle();
    second.run_until_idle();
    assert_eq!(
        seen.snapshot(),
        vec![
            ("second", MessagePayload::text("one")),
            ("second", MessagePayload::text("two")),
        ]
    );
}

#[test]
fn a_listening_port_outlives_its_handles() {
    let looper = looper("keep-alive");
    let hub = MessageHub::builder().default_executor(looper.clone()).build();
    let (a, b) = hub.create_channel().into_ports();
    let received = Collector::new();
    let sink = Arc::clone(&received);
    b.set_message_callback(move |message| sink.push(message.payload().clone()), None)
        .expect("listen");
    drop(b);

    assert_eq!(hub.listening_ports(), 1);
    a.post_message("still here", &[]).expect("post");
    assert_eq!(
        received.wait_for(1, WAIT),
        vec![MessagePayload::text("still here")]
    );
    looper.shutdown();
}

#[test]
fn echo_page_on_its_own_thread() {
    let app_looper = looper("app");
    let page_looper = looper("page");
    let hub = MessageHub::builder().default_executor(app_looper.clone()).build();
    let bridge = MainFrameBridge::with_executor(hub.clone(), page_looper.clone());
    bridge.load(
        "https://echo.example/",
        EchoRealm::with_executor(page_looper.clone()),
    );

    let (app, page) = hub.create_channel().into_ports();
    bridge
        .post_message_to_main_frame("connect", "*", &[page])
        .expect("transfer");
    let replies = Collector::new();
    let sink = Arc::clone(&replies);
    app.set_message_callback(
        move |message| sink.push(message.payload().as_text().unwrap_or_default().to_owned()),
        None,
    )
    .expect("listen");
    for text in ["a", "b", "c"] {
        app.post_message(text, &[]).expect("post");
    }
    assert_eq!(
        replies.wait_for(3, WAIT),
        vec!["afrom_js", "bfrom_js", "cfrom_js"]
    );

    drop(bridge);
    app_looper.shutdown();
    page_looper.shutdown();
}

#[test]
fn scenarios_pass_on_a_looper() {
    let looper = looper("scenarios");
    let env = ScenarioEnv::new(looper.clone());
    for config in [
        ScenarioConfig::echo(),
        ScenarioConfig::array_buffer(512 * 1024),
        ScenarioConfig::ordering(100),
        ScenarioConfig::close_after_send(),
        ScenarioConfig::lifecycle(),
    ] {
        let report = run_scenario(&config, "HELLO", &env).expect("scenario runs");
        if let Err(reason) = verify_report(&config, "HELLO", &report) {
            panic!("{} failed: {reason}", config.kind.name());
        }
    }
    drop(env);
    looper.shutdown();
}
