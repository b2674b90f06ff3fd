use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use chrono::{SecondsFormat, TimeDelta, Utc};
use serde_json::json;
use ticker_publish::{DocumentRecord, PublishError, PublishTarget, RepositoryPatchTarget, RepositorySettings};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = r#"<html>
  <body>
    <div class="tweet">
      <p class="tweet-text">old tweet</p>
      <span class="tweet-time">· 2h</span>
    </div>
  </body>
</html>"#;

fn settings(server: &MockServer) -> RepositorySettings {
    RepositorySettings {
        token: "ghp_test".to_string(),
        owner: "anil".to_string(),
        repo: "tweet-site".to_string(),
        path: "index.html".to_string(),
        branch: "main".to_string(),
        commit_message: "Update tweet display".to_string(),
        api_base: server.uri(),
    }
}

fn contents_body(html: &str, sha: &str) -> serde_json::Value {
    // the live API wraps base64 at 60 columns; reproduce that here
    let raw = BASE64_STANDARD.encode(html);
    let wrapped = raw
        .as_bytes()
        .chunks(60)
        .map(|c| std::str::from_utf8(c).unwrap())
        .collect::<Vec<_>>()
        .join("\n");
    json!({ "content": wrapped, "sha": sha, "encoding": "base64" })
}

async fn mount_fetch(server: &MockServer, html: &str, sha: &str) {
    Mock::given(method("GET"))
        .and(path("/repos/anil/tweet-site/contents/index.html"))
        .and(query_param("ref", "main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(contents_body(html, sha)))
        .expect(1)
        .mount(server)
        .await;
}

/// Decode the base64 `content` field out of the recorded PUT request.
async fn committed_html(server: &MockServer) -> (String, serde_json::Value) {
    let requests = server.received_requests().await.expect("recording enabled");
    let put = requests
        .iter()
        .find(|r| r.method.to_string() == "PUT")
        .expect("one PUT request");
    let body: serde_json::Value = serde_json::from_slice(&put.body).expect("json body");
    let decoded = BASE64_STANDARD
        .decode(body["content"].as_str().expect("content field"))
        .expect("base64 content");
    (String::from_utf8(decoded).expect("utf-8 content"), body)
}

#[tokio::test]
async fn publishes_escaped_text_and_age_label() {
    let server = MockServer::start().await;
    mount_fetch(&server, PAGE, "abc123").await;

    Mock::given(method("PUT"))
        .and(path("/repos/anil/tweet-site/contents/index.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "content": { "sha": "def456" }, "commit": { "sha": "c0ffee" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let five_minutes_ago = (Utc::now() - TimeDelta::seconds(300))
        .to_rfc3339_opts(SecondsFormat::Secs, true);
    let record = DocumentRecord {
        text: r#"Hello <world> & "friends""#.to_string(),
        timestamp: Some(five_minutes_ago),
    };

    let target = RepositoryPatchTarget::new(settings(&server)).unwrap();
    let receipt = target.publish(&record).await.unwrap();
    assert_eq!(receipt.commit_sha.as_deref(), Some("c0ffee"));

    let (html, body) = committed_html(&server).await;
    assert!(html.contains("Hello &lt;world&gt; &amp; &quot;friends&quot;"));
    assert!(html.contains(r#"<span class="tweet-time">· 5m</span>"#));
    // conditional write carries the fetched revision and target branch
    assert_eq!(body["sha"], "abc123");
    assert_eq!(body["branch"], "main");
    assert_eq!(body["message"], "Update tweet display");
}

#[tokio::test]
async fn revision_conflict_is_terminal_and_not_retried() {
    let server = MockServer::start().await;
    mount_fetch(&server, PAGE, "abc123").await;

    Mock::given(method("PUT"))
        .and(path("/repos/anil/tweet-site/contents/index.html"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": "index.html does not match abc123"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record = DocumentRecord {
        text: "racing update".to_string(),
        timestamp: None,
    };

    let target = RepositoryPatchTarget::new(settings(&server)).unwrap();
    let err = target.publish(&record).await.unwrap_err();
    assert!(err.is_conflict(), "expected conflict, got {err}");
    assert!(matches!(err, PublishError::UpstreamCommit { .. }));
}

#[tokio::test]
async fn stale_sha_rejection_maps_to_conflict() {
    let server = MockServer::start().await;
    mount_fetch(&server, PAGE, "abc123").await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "index.html does not match the expected sha"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let target = RepositoryPatchTarget::new(settings(&server)).unwrap();
    let record = DocumentRecord {
        text: "stale".to_string(),
        timestamp: None,
    };
    assert!(target.publish(&record).await.unwrap_err().is_conflict());
}

#[tokio::test]
async fn fetch_failure_short_circuits_before_any_write() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/anil/tweet-site/contents/index.html"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let target = RepositoryPatchTarget::new(settings(&server)).unwrap();
    let record = DocumentRecord {
        text: "text".to_string(),
        timestamp: None,
    };
    let err = target.publish(&record).await.unwrap_err();
    assert!(matches!(err, PublishError::UpstreamFetch(_)), "got {err}");
}

#[tokio::test]
async fn missing_tweet_block_fails_without_committing() {
    let server = MockServer::start().await;
    mount_fetch(&server, "<html><body>no tweet here</body></html>", "abc123").await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let target = RepositoryPatchTarget::new(settings(&server)).unwrap();
    let record = DocumentRecord {
        text: "text".to_string(),
        timestamp: None,
    };
    let err = target.publish(&record).await.unwrap_err();
    assert!(matches!(err, PublishError::PatchTargetNotFound(_)), "got {err}");
}

#[tokio::test]
async fn missing_timestamp_span_still_publishes_the_text() {
    let server = MockServer::start().await;
    let page = r#"<body><p class="tweet-text">old</p></body>"#;
    mount_fetch(&server, page, "abc123").await;

    Mock::given(method("PUT"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "commit": { "sha": "beef" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let target = RepositoryPatchTarget::new(settings(&server)).unwrap();
    let record = DocumentRecord {
        text: "fresh".to_string(),
        timestamp: None,
    };
    let receipt = target.publish(&record).await.unwrap();
    assert_eq!(receipt.commit_sha.as_deref(), Some("beef"));

    let (html, _) = committed_html(&server).await;
    assert!(html.contains(r#"<p class="tweet-text">fresh</p>"#));
    assert!(!html.contains("tweet-time"));
}
