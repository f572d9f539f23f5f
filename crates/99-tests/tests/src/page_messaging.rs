#![cfg(all(test, not(target_arch = "wasm32")))]

use std::sync::Arc;
use std::time::Duration;

use channel_scenarios::{
    pattern_bytes, Collector, CountingRealm, EchoRealm, TitleMode, TitleRealm,
};
use frame_bridge::{
    BridgeError, FrameHandle, MainFrameBridge, Realm, RealmMessage, WebMessageEvent,
};
use message_channel::{MessageHub, MessagePayload, MessagePort, StateViolation};
use parking_lot::Mutex;

const WAIT: Duration = Duration::from_secs(2);

fn payloads(port: &MessagePort) -> Arc<Collector<MessagePayload>> {
    let collector = Collector::new();
    let sink = Arc::clone(&collector);
    port.set_message_callback(move |message| sink.push(message.payload().clone()), None)
        .expect("listen");
    collector
}

/// Loads an echo page and returns the app's end of a fresh channel into it.
fn echo_page(bridge: &MainFrameBridge) -> MessagePort {
    bridge.load("https://echo.example/page.html", EchoRealm::new());
    let (app, page) = bridge.hub().create_channel().into_ports();
    bridge
        .post_message_to_main_frame("connect", "*", &[page])
        .expect("hand port to page");
    app
}

#[test]
fn text_round_trips_with_the_page_suffix() {
    let bridge = MainFrameBridge::new(MessageHub::new());
    let app = echo_page(&bridge);
    let replies = payloads(&app);
    app.post_message("HELLO", &[]).expect("post");
    assert_eq!(replies.wait_for(1, WAIT), vec![MessagePayload::text("HELLOfrom_js")]);
}

#[test]
fn array_buffers_come_back_byte_for_byte() {
    let bridge = MainFrameBridge::new(MessageHub::new());
    let app = echo_page(&bridge);
    let replies = payloads(&app);

    let large = pattern_bytes(512 * 1024);
    app.post_message(Vec::<u8>::new(), &[]).expect("empty buffer");
    app.post_message(large.clone(), &[]).expect("large buffer");

    let echoed = replies.wait_for(2, WAIT);
    assert_eq!(echoed.len(), 2);
    assert_eq!(echoed[0].as_array_buffer(), Some(&[][..]));
    let bytes = echoed[1].as_array_buffer().expect("array buffer reply");
    assert_eq!(bytes.len(), large.len());
    assert!(bytes == large.as_slice(), "echoed buffer differs");
}

#[test]
fn messages_sent_before_close_still_reach_the_page() {
    let bridge = MainFrameBridge::new(MessageHub::new());
    let realm = TitleRealm::new(TitleMode::Channel);
    bridge.load("https://title.example/", realm.clone());
    let (app, page) = bridge.hub().create_channel().into_ports();
    bridge
        .post_message_to_main_frame("connect", "*", &[page])
        .expect("hand port to page");

    app.post_message("2", &[]).expect("post");
    app.post_message("3", &[]).expect("post");
    app.close().expect("close");
    assert_eq!(realm.wait_for_title("23", WAIT), "23");
    assert!(app.is_closed());
}

#[test]
fn window_messages_with_a_foreign_target_are_dropped() {
    let bridge = MainFrameBridge::new(MessageHub::new());
    let realm = CountingRealm::new();
    bridge.load("https://app.example/index.html", realm.clone());
    let (_app, page) = bridge.hub().create_channel().into_ports();

    bridge
        .post_message_to_main_frame("secret", "https://evil.example", &[page.clone()])
        .expect("mismatch is silent");
    assert!(realm.received().is_empty());
    assert!(page.is_transferred(), "ports move even when the message is dropped");

    bridge
        .post_message_to_main_frame("hello", "https://app.example", &[])
        .expect("matching target");
    let received = realm.wait_for(1, WAIT);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].payload, MessagePayload::text("hello"));
    assert_eq!(received[0].origin, "");
    assert!(received[0].is_main_frame);
}

#[test]
fn malformed_target_origin_fails_before_transfer() {
    let bridge = MainFrameBridge::new(MessageHub::new());
    bridge.load("https://app.example/", CountingRealm::new());
    let (_app, page) = bridge.hub().create_channel().into_ports();
    let err = bridge
        .post_message_to_main_frame("x", "not a url", &[page.clone()])
        .expect_err("bad target");
    assert!(matches!(err, BridgeError::InvalidTargetOrigin(_)), "{err:?}");
    assert!(page.is_pending());
}

#[test]
fn started_port_in_window_transfer_is_rejected() {
    let bridge = MainFrameBridge::new(MessageHub::new());
    let realm = CountingRealm::new();
    bridge.load("https://app.example/", realm.clone());
    let (app, _page) = bridge.hub().create_channel().into_ports();
    app.post_message("start", &[]).expect("post");
    match bridge.post_message_to_main_frame("x", "*", &[app.clone()]) {
        Err(BridgeError::Port(err)) => assert_eq!(err.violation(), StateViolation::AlreadyStarted),
        other => panic!("expected a port error, got {other:?}"),
    }
    assert!(realm.received().is_empty());
}

#[test]
fn page_replies_on_the_transferred_port() {
    let bridge = MainFrameBridge::new(MessageHub::new());
    let realm = CountingRealm::new();
    bridge.load("https://app.example/", realm.clone());
    let (app, page) = bridge.hub().create_channel().into_ports();
    let replies = payloads(&app);
    bridge
        .post_message_to_main_frame("from_webview", "*", &[page])
        .expect("post");
    assert_eq!(realm.wait_for(1, WAIT)[0].port_count, 1);
    assert_eq!(replies.wait_for(1, WAIT), vec![MessagePayload::text("from_js")]);
}

#[test]
fn navigation_unloads_the_page_and_closes_its_ports() {
    let bridge = MainFrameBridge::new(MessageHub::new());
    let app = echo_page(&bridge);
    let first = bridge.current_document().expect("document loaded");

    bridge.load("https://next.example/", CountingRealm::new());
    assert_ne!(bridge.current_document(), Some(first));
    assert_eq!(bridge.hub().listening_ports(), 0);
    app.post_message("anyone there?", &[]).expect("posting to a closed peer is silent");
}

#[derive(Default)]
struct ObjectPage {
    replies: Mutex<Vec<(String, MessagePayload)>>,
}

impl Realm for ObjectPage {
    fn deliver(&self, _frame: &FrameHandle, _message: RealmMessage) {}

    fn deliver_to_object(&self, _frame: &FrameHandle, object_name: &str, payload: MessagePayload) {
        self.replies.lock().push((object_name.to_owned(), payload));
    }
}

#[test]
fn injected_object_round_trip() {
    let bridge = MainFrameBridge::new(MessageHub::new());
    let events = Collector::new();
    let sink = Arc::clone(&events);
    bridge
        .add_web_message_listener(
            "appBridge",
            &["https://*.example.com"],
            move |event: WebMessageEvent| {
                sink.push((
                    event.payload.as_text().unwrap_or_default().to_owned(),
                    event.source_origin.to_string(),
                    event.is_main_frame,
                ));
                event.reply_proxy.post_message("ack");
            },
        )
        .expect("register listener");

    let page = Arc::new(ObjectPage::default());
    let frame = bridge.load("https://www.example.com/app", page.clone());
    assert!(frame.has_object("appBridge"));
    frame
        .post_to_object("appBridge", "ready", &[])
        .expect("post to object");

    let seen = events.wait_for(1, WAIT);
    assert_eq!(
        seen,
        vec![("ready".to_owned(), "https://www.example.com".to_owned(), true)]
    );
    assert_eq!(
        *page.replies.lock(),
        vec![("appBridge".to_owned(), MessagePayload::text("ack"))]
    );
}

#[test]
fn object_is_missing_from_disallowed_origins() {
    let bridge = MainFrameBridge::new(MessageHub::new());
    bridge
        .add_web_message_listener("appBridge", &["https://example.com"], |_: WebMessageEvent| {})
        .expect("register listener");
    let frame = bridge.load("https://other.example/", Arc::new(ObjectPage::default()));
    assert!(!frame.has_object("appBridge"));
    let err = frame
        .post_to_object("appBridge", "hi", &[])
        .expect_err("object not injected");
    assert_eq!(err, BridgeError::ObjectNotInjected("appBridge".to_owned()));
}
