//! Integration tests using wiremock to simulate the API.

use imgur_rest::clock::ManualClock;
use imgur_rest::error::REQUESTER_ERROR_CODE;
use imgur_rest::retry::RecordingSleeper;
use imgur_rest::routes::{account, gallery, image};
use imgur_rest::{
    ActionDefaults, Client, ClientBuilder, Error, PageParam, RequestBody, RetryPolicy,
    RetryStrategy,
};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Image {
    id: String,
    title: String,
}

fn envelope(data: serde_json::Value, status: u16) -> serde_json::Value {
    serde_json::json!({ "data": data, "success": status < 400, "status": status })
}

fn image_json() -> serde_json::Value {
    envelope(serde_json::json!({ "id": "aBc12", "title": "Cat" }), 200)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn builder(server: &MockServer) -> ClientBuilder {
    init_tracing();
    Client::builder()
        .base_url(server.uri())
        .unwrap()
        .client_id("test-client")
        .requester_threads(2)
}

fn recording_retry(sleeper: &RecordingSleeper) -> RetryPolicy {
    RetryPolicy::default().sleeper(Arc::new(sleeper.clone()))
}

#[tokio::test]
async fn test_get_decodes_data_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3/image/aBc12"))
        .and(query_param("format", "json"))
        .and(header("authorization", "Client-ID test-client"))
        .and(header("user-agent", "imgur-rest-tests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_json()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server)
        .user_agent("imgur-rest-tests")
        .build()
        .unwrap();

    let image = client
        .action(image::GET_IMAGE.compile(&["aBc12"]).unwrap(), |res| {
            res.data::<Image>()
        })
        .submit()
        .await
        .unwrap();

    assert_eq!(
        image,
        Image {
            id: "aBc12".to_string(),
            title: "Cat".to_string()
        }
    );
}

#[tokio::test]
async fn test_bearer_route_sends_access_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3/account/me"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(serde_json::json!({ "url": "me" }), 200)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server)
        .access_token("secret-token")
        .build()
        .unwrap();

    let profile = client
        .action(account::GET_USER_PROFILE.compile(&["me"]).unwrap(), |res| {
            res.data::<serde_json::Value>()
        })
        .submit()
        .await
        .unwrap();

    assert_eq!(profile["url"], "me");
}

#[tokio::test]
async fn test_bearer_route_without_token_never_sends() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).build().unwrap();

    let result = client
        .action(account::GET_USER_PROFILE.compile(&["me"]).unwrap(), |res| {
            res.data::<serde_json::Value>()
        })
        .submit()
        .await;

    assert!(matches!(result, Err(Error::Authorization(_))));
}

#[tokio::test]
async fn test_server_error_retried_four_times() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3/image/aBc12"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .expect(4)
        .mount(&mock_server)
        .await;

    let sleeper = RecordingSleeper::default();
    let client = builder(&mock_server)
        .retry_policy(recording_retry(&sleeper))
        .build()
        .unwrap();

    let result = client
        .action(image::GET_IMAGE.compile(&["aBc12"]).unwrap(), |res| {
            res.data::<Image>()
        })
        .submit()
        .await;

    match result {
        Err(Error::ErrorResponse { code, message, .. }) => {
            assert_eq!(code, 503);
            assert_eq!(message, "Service Unavailable");
        }
        other => panic!("Expected 503 error response, got {other:?}"),
    }
    assert_eq!(
        sleeper.delays(),
        vec![
            Duration::from_millis(50),
            Duration::from_millis(100),
            Duration::from_millis(150)
        ]
    );
}

#[tokio::test]
async fn test_server_error_then_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3/image/aBc12"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/3/image/aBc12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_json()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sleeper = RecordingSleeper::default();
    let client = builder(&mock_server)
        .retry_policy(recording_retry(&sleeper))
        .build()
        .unwrap();

    let image = client
        .action(image::GET_IMAGE.compile(&["aBc12"]).unwrap(), |res| {
            res.data::<Image>()
        })
        .submit()
        .await
        .unwrap();

    assert_eq!(image.id, "aBc12");
    assert_eq!(sleeper.delays().len(), 2);
}

#[tokio::test]
async fn test_client_error_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3/image/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(envelope(
            serde_json::json!({ "error": "Unable to find an image with the id, missing" }),
            404,
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sleeper = RecordingSleeper::default();
    let client = builder(&mock_server)
        .retry_policy(recording_retry(&sleeper))
        .build()
        .unwrap();

    let error = client
        .action(image::GET_IMAGE.compile(&["missing"]).unwrap(), |res| {
            res.data::<Image>()
        })
        .submit()
        .await
        .unwrap_err();

    assert!(error.is_client_error());
    assert_eq!(error.status_code(), Some(404));
    assert!(error.to_string().contains("Unable to find"));
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_timeout_replayed_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3/image/aBc12"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(image_json())
                .set_delay(Duration::from_millis(500)),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/3/image/aBc12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_json()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server)
        .request_timeout(Duration::from_millis(100))
        .build()
        .unwrap();

    let image = client
        .action(image::GET_IMAGE.compile(&["aBc12"]).unwrap(), |res| {
            res.data::<Image>()
        })
        .submit()
        .await
        .unwrap();

    assert_eq!(image.title, "Cat");
}

#[tokio::test]
async fn test_second_timeout_is_a_requester_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3/image/aBc12"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server)
        .request_timeout(Duration::from_millis(100))
        .build()
        .unwrap();

    let error = client
        .action(image::GET_IMAGE.compile(&["aBc12"]).unwrap(), |res| {
            res.data::<Image>()
        })
        .submit()
        .await
        .unwrap_err();

    assert!(error.is_timeout());
    assert!(error.is_requester_error());
    assert_eq!(error.status_code(), Some(REQUESTER_ERROR_CODE));
}

#[tokio::test]
async fn test_passed_deadline_skips_network() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_json()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let clock = ManualClock::default();
    let client = builder(&mock_server)
        .clock(Arc::new(clock.clone()))
        .build()
        .unwrap();

    let action = client
        .action(image::GET_IMAGE.compile(&["aBc12"]).unwrap(), |res| {
            res.data::<Image>()
        })
        .timeout(Duration::from_secs(5));
    clock.advance(Duration::from_secs(6));

    let result = action.submit().await;
    assert!(matches!(result, Err(Error::DeadlineExceeded)));
}

#[tokio::test]
async fn test_default_timeout_starts_at_trigger() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_json()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let clock = ManualClock::default();
    let client = builder(&mock_server)
        .clock(Arc::new(clock.clone()))
        .defaults(ActionDefaults::default().with_timeout(Duration::from_secs(5)))
        .build()
        .unwrap();

    let action = client.action(image::GET_IMAGE.compile(&["aBc12"]).unwrap(), |res| {
        res.data::<Image>()
    });
    // Time spent before triggering does not count against the default.
    clock.advance(Duration::from_secs(60));

    assert!(action.submit().await.is_ok());
}

#[tokio::test]
async fn test_post_without_body_sends_empty_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/3/image/aBc12/favorite"))
        .and(header("content-type", "application/json; charset=utf-8"))
        .and(body_string(""))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope("favorited".into(), 200)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server)
        .access_token("secret-token")
        .build()
        .unwrap();

    let state = client
        .action(
            image::POST_IMAGE_FAVORITE.compile(&["aBc12"]).unwrap(),
            |res| res.data::<String>(),
        )
        .submit()
        .await
        .unwrap();

    assert_eq!(state, "favorited");
}

#[tokio::test]
async fn test_json_body_is_sent() {
    let mock_server = MockServer::start().await;
    let update = serde_json::json!({ "title": "New title", "description": "A cat" });

    Mock::given(method("POST"))
        .and(path("/3/image/aBc12"))
        .and(body_json(&update))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(true.into(), 200)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server)
        .access_token("secret-token")
        .build()
        .unwrap();

    let updated = client
        .action_with_body(
            image::POST_IMAGE_UPDATE.compile(&["aBc12"]).unwrap(),
            RequestBody::json(&update).unwrap(),
            |res| res.data::<bool>(),
        )
        .submit()
        .await
        .unwrap();

    assert!(updated);
}

#[tokio::test]
async fn test_queue_runs_continuation_on_callback_pool() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_json()))
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).build().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel();

    client
        .action(image::GET_IMAGE.compile(&["aBc12"]).unwrap(), |res| {
            res.data::<Image>()
        })
        .queue_with(
            move |image| {
                let thread = std::thread::current().name().map(str::to_string);
                let _ = tx.send((image.id, thread));
            },
            |error| panic!("unexpected failure: {error}"),
        )
        .unwrap();

    let (id, thread) = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(id, "aBc12");
    assert_eq!(thread.as_deref(), Some("imgur-callback"));
}

#[tokio::test]
async fn test_queued_request_survives_dropped_client() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(image_json())
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let (tx, rx) = tokio::sync::oneshot::channel();
    {
        let client = builder(&mock_server).build().unwrap();
        client
            .action(image::GET_IMAGE.compile(&["aBc12"]).unwrap(), |res| {
                res.data::<Image>()
            })
            .queue_with(
                move |image| {
                    let _ = tx.send(image.id);
                },
                |error| panic!("unexpected failure: {error}"),
            )
            .unwrap();
    }

    let id = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(id, "aBc12");
}

#[tokio::test]
async fn test_panicking_decoder_reaches_failure_continuation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_json()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).build().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel();

    client
        .action(
            image::GET_IMAGE.compile(&["aBc12"]).unwrap(),
            |_| -> imgur_rest::Result<Image> { panic!("decoder bug") },
        )
        .queue_with(
            |image| panic!("unexpected success: {image:?}"),
            move |error| {
                let _ = tx.send(error);
            },
        )
        .unwrap();

    let error = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .unwrap()
        .unwrap();
    match error {
        Error::DeserializationFailed { serde_error, .. } => {
            assert!(serde_error.contains("decoder bug"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_queue_uses_default_continuations() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/3/image/aBc12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_json()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/3/image/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let failures = tx.clone();
    let defaults = ActionDefaults::default()
        .with_success(move |value| {
            if let Some(image) = value.downcast_ref::<Image>() {
                let _ = tx.send(Ok(image.id.clone()));
            }
        })
        .with_failure(move |error| {
            let _ = failures.send(Err(error.status_code()));
        });
    let client = builder(&mock_server).defaults(defaults).build().unwrap();

    client
        .action(image::GET_IMAGE.compile(&["aBc12"]).unwrap(), |res| {
            res.data::<Image>()
        })
        .queue()
        .unwrap();
    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap();
    assert_eq!(first, Some(Ok("aBc12".to_string())));

    client
        .action(image::GET_IMAGE.compile(&["missing"]).unwrap(), |res| {
            res.data::<Image>()
        })
        .queue()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap();
    assert_eq!(second, Some(Err(Some(404))));
}

#[tokio::test]
async fn test_cancel_stops_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(0..=1)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server)
        .retry_policy(RetryPolicy::new(RetryStrategy::Fixed {
            delay: Duration::from_millis(300),
            max_retries: 3,
        }))
        .build()
        .unwrap();

    let future = client
        .action(image::GET_IMAGE.compile(&["aBc12"]).unwrap(), |res| {
            res.data::<Image>()
        })
        .submit();
    tokio::time::sleep(Duration::from_millis(100)).await;
    future.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));

    // Past the backoff: the next attempt must have been skipped.
    tokio::time::sleep(Duration::from_millis(500)).await;
}

#[tokio::test]
async fn test_shutdown_rejects_new_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(image_json())
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).build().unwrap();
    let action = client.action(image::GET_IMAGE.compile(&["aBc12"]).unwrap(), |res| {
        res.data::<Image>()
    });

    let queued = action.submit();
    client.shutdown();

    // Admitted work still completes.
    assert!(queued.await.is_ok());

    let rejected = action.submit();
    assert!(rejected.handle().is_none());
    assert!(matches!(rejected.await, Err(Error::Rejected(_))));
    assert!(matches!(action.queue(), Err(Error::Rejected(_))));
}

#[tokio::test]
async fn test_paged_action_requests_successive_pages() {
    let mock_server = MockServer::start().await;

    for page in 0..3 {
        Mock::given(method("GET"))
            .and(path(format!("/3/gallery/hot/viral/{page}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(envelope(serde_json::json!([format!("post-{page}")]), 200)),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let client = builder(&mock_server).build().unwrap();
    let mut pages = client
        .paged(
            gallery::GET_GALLERY,
            vec!["hot".into(), "viral".into(), PageParam::Page],
            |res| res.data::<Vec<String>>(),
        )
        .unwrap();

    let mut posts = Vec::new();
    for _ in 0..3 {
        posts.extend(pages.next().unwrap().submit().await.unwrap());
    }

    assert_eq!(posts, vec!["post-0", "post-1", "post-2"]);
    assert_eq!(pages.page(), 3);
    assert_eq!(pages.cached_pages(), 3);
}

#[tokio::test]
async fn test_gzip_body_is_decoded() {
    let mock_server = MockServer::start().await;

    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(image_json().to_string().as_bytes())
        .unwrap();
    let compressed = encoder.finish().unwrap();

    Mock::given(method("GET"))
        .and(header("accept-encoding", "gzip"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-encoding", "gzip")
                .insert_header("content-type", "application/json")
                .set_body_bytes(compressed),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).build().unwrap();

    let image = client
        .action(image::GET_IMAGE.compile(&["aBc12"]).unwrap(), |res| {
            res.data::<Image>()
        })
        .submit()
        .await
        .unwrap();

    assert_eq!(image.id, "aBc12");
}

#[tokio::test]
async fn test_rate_limit_headers_reach_decoder() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-userlimit", "2000")
                .insert_header("x-ratelimit-userremaining", "1500")
                .insert_header("x-ratelimit-clientremaining", "0")
                .set_body_json(image_json()),
        )
        .mount(&mock_server)
        .await;

    let client = builder(&mock_server).build().unwrap();

    let info = client
        .action(image::GET_IMAGE.compile(&["aBc12"]).unwrap(), |res| {
            Ok(res.rate_limit())
        })
        .submit()
        .await
        .unwrap();

    assert_eq!(info.user_limit, Some(2000));
    assert_eq!(info.user_remaining, Some(1500));
    assert!(info.is_rate_limited());
}

#[tokio::test]
async fn test_token_provider_consulted_every_attempt() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer token-3"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(serde_json::json!({ "url": "me" }), 200)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let sleeper = RecordingSleeper::default();
    let client = builder(&mock_server)
        .token_provider(Arc::new(move || -> imgur_rest::Result<String> {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("token-{n}"))
        }))
        .retry_policy(recording_retry(&sleeper))
        .build()
        .unwrap();

    let profile = client
        .action(account::GET_USER_PROFILE.compile(&["me"]).unwrap(), |res| {
            res.data::<serde_json::Value>()
        })
        .submit()
        .await
        .unwrap();

    assert_eq!(profile["url"], "me");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_complete_blocks_until_outcome() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mock_server = runtime.block_on(MockServer::start());

    runtime.block_on(
        Mock::given(method("GET"))
            .and(path("/3/image/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .expect(1)
            .mount(&mock_server),
    );
    runtime.block_on(
        Mock::given(method("GET"))
            .and(path("/3/image/aBc12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(image_json()))
            .expect(1)
            .mount(&mock_server),
    );

    let client = builder(&mock_server).build().unwrap();

    let image = client
        .action(image::GET_IMAGE.compile(&["aBc12"]).unwrap(), |res| {
            res.data::<Image>()
        })
        .complete()
        .unwrap();
    assert_eq!(image.title, "Cat");

    // The failure is returned as-is, not wrapped.
    match client
        .action(image::GET_IMAGE.compile(&["missing"]).unwrap(), |res| {
            res.data::<Image>()
        })
        .complete()
    {
        Err(Error::ErrorResponse { code, message, .. }) => {
            assert_eq!(code, 404);
            assert_eq!(message, "Not Found");
        }
        other => panic!("Expected 404 error response, got {other:?}"),
    }

    client.shutdown_now();
}
