//! End-to-end tests: discovery, session, and façade against a fake browser

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cdp_pilot::{DevToolsClient, Error};
use common::FakeBrowser;
use serde_json::json;

#[tokio::test]
async fn adopts_a_blank_page_and_drives_it() {
    let browser = FakeBrowser::start().await;
    browser.add_page("tab-blank", "about:blank");

    let client = DevToolsClient::connect(&browser.base_url(), "https://example.com/")
        .await
        .unwrap();

    client.navigate("https://example.com/").await.unwrap();
    assert!(client.wait_for_ready(Duration::from_secs(2)).await);

    let title = client.evaluate("document.title").await.unwrap();
    assert_eq!(title, json!("Fake Page"));

    let shot = client.capture_screenshot(true, None).await.unwrap().unwrap();
    assert_eq!(&shot[1..4], b"PNG");

    let cookies = client.get_cookies().await.unwrap();
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].name, "sid");

    client.close().await;

    // An adopted page is never destroyed by the client.
    assert!(!browser
        .requests()
        .iter()
        .any(|r| r.contains("/json/close/")));
}

#[tokio::test]
async fn creates_a_target_when_nothing_is_reusable_and_closes_it() {
    let browser = FakeBrowser::start().await;

    let client = DevToolsClient::connect(&browser.base_url(), "https://example.com/")
        .await
        .unwrap();
    client.close().await;

    let requests = browser.requests();
    assert!(requests.iter().any(|r| r.starts_with("GET /json/new")));
    assert!(requests
        .iter()
        .any(|r| r == "GET /json/close/created-target"));
}

#[tokio::test]
async fn navigation_pushes_the_load_event_to_subscribers() {
    let browser = FakeBrowser::start().await;
    browser.add_page("tab", "about:blank");

    let client = DevToolsClient::connect(&browser.base_url(), "https://example.com/")
        .await
        .unwrap();

    let fired: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&fired);
    let _subscription = client.on("Page.loadEventFired", move |params| {
        if let Some(ts) = params.get("timestamp").and_then(|v| v.as_f64()) {
            sink.lock().unwrap().push(ts);
        }
        Ok(())
    });

    client.navigate("https://example.com/").await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        while fired.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("load event never arrived");

    assert_eq!(fired.lock().unwrap()[0], 1000.0);
    client.close().await;
}

#[tokio::test]
async fn unknown_methods_surface_the_protocol_error() {
    let browser = FakeBrowser::start().await;
    browser.add_page("tab", "about:blank");

    let client = DevToolsClient::connect(&browser.base_url(), "https://example.com/")
        .await
        .unwrap();

    let err = client.send("Bogus.method", None).await.unwrap_err();
    match err {
        Error::Protocol { code, method, .. } => {
            assert_eq!(code, -32601);
            assert_eq!(method, "Bogus.method");
        }
        other => panic!("expected protocol error, got {:?}", other),
    }
    client.close().await;
}

#[tokio::test]
async fn drag_gesture_round_trips_through_the_channel() {
    let browser = FakeBrowser::start().await;
    browser.add_page("tab", "about:blank");

    let client = DevToolsClient::connect(&browser.base_url(), "https://example.com/")
        .await
        .unwrap();

    client
        .drag_mouse((10.0, 10.0), (200.0, 120.0), Duration::from_millis(60), 3)
        .await
        .unwrap();

    client.close().await;
}
