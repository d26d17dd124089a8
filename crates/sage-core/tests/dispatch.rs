use std::io::Write;
use std::time::{Duration, Instant};

use sage_core::{
    ApiSettings, AudioClip, AudioSource, Category, CategoryContext, ChatRole, CompletionClient,
    DisplayState, Dispatcher, RecordOutcome, RecordingSession, RevealTiming, SageResult,
    SubmitOutcome, ERROR_MESSAGE, NO_RESPONSE,
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct ToneSource;

struct ToneSession;

impl AudioSource for ToneSource {
    fn start(&self) -> SageResult<Box<dyn RecordingSession>> {
        Ok(Box::new(ToneSession))
    }
}

impl RecordingSession for ToneSession {
    fn finish(self: Box<Self>) -> SageResult<AudioClip> {
        Ok(AudioClip {
            samples: vec![0.25; 320],
            sample_rate: 16000,
        })
    }
}

fn dispatcher_for(uri: &str, category: Category) -> Dispatcher {
    let client = CompletionClient::new(&ApiSettings {
        base_url: uri.to_string(),
        api_key: "test-key".to_string(),
        timeout: Duration::from_secs(5),
    });
    Dispatcher::new(
        client,
        CategoryContext::new(category),
        RevealTiming::default(),
        Box::new(ToneSource),
    )
}

fn temp_file(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::File::create(&path).unwrap().write_all(bytes).unwrap();
    path
}

#[tokio::test]
async fn empty_submission_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut d = dispatcher_for(&server.uri(), Category::Law);
    assert_eq!(d.submit_and_wait("").await, SubmitOutcome::Rejected);
    assert!(d.conversation().is_empty());
}

#[tokio::test]
async fn text_prompt_hits_text_endpoint_with_category() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/text"))
        .and(query_param("category", "law"))
        .and(query_param("prompt", "hello"))
        .and(header("X-API-Key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "42" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut d = dispatcher_for(&server.uri(), Category::Law);
    assert_eq!(d.submit_and_wait("hello").await, SubmitOutcome::Submitted);

    let turns = d.conversation().turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, ChatRole::User);
    assert_eq!(turns[0].content, "hello");
    assert_eq!(turns[1].role, ChatRole::Assistant);
    assert_eq!(turns[1].content, "42");
    assert!(turns[1].is_streaming());
}

#[tokio::test]
async fn category_change_applies_to_next_submission() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/text"))
        .and(query_param("category", "finance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut d = dispatcher_for(&server.uri(), Category::Medical);
    let selector = d.category().clone();
    selector.set(Category::Finance);

    d.submit_and_wait("rates?").await;
    assert_eq!(d.conversation().turns()[1].content, "ok");
}

#[tokio::test]
async fn pdf_prompt_uploads_file_to_pdfs_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pdfs"))
        .and(query_param("category", "law"))
        .and(query_param("prompt", "summarize"))
        .and(header("Accept", "application/json"))
        .and(body_string_contains("name=\"file\""))
        .and(body_string_contains("%PDF-1.4 lease body"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "A lease." })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/text"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let pdf = temp_file(&dir, "lease.pdf", b"%PDF-1.4 lease body");

    let mut d = dispatcher_for(&server.uri(), Category::Law);
    d.select_file(&pdf).await.unwrap();
    d.submit_and_wait("summarize").await;

    let turns = d.conversation().turns();
    assert_eq!(turns[0].content, "[PDF: lease.pdf] summarize");
    assert_eq!(turns[1].content, "A lease.");
    assert!(d.attachment().is_none());
}

#[tokio::test]
async fn image_prompt_uploads_file_to_image_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/image"))
        .and(query_param("category", "medical"))
        .and(query_param("prompt", "what is this"))
        .and(header("Accept", "application/json"))
        .and(body_string_contains("name=\"file\""))
        .and(body_string_contains("filename=\"xray.png\""))
        .and(body_string_contains("chest xray pixels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "A rib." })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/text"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let png = temp_file(&dir, "xray.png", b"chest xray pixels");

    let mut d = dispatcher_for(&server.uri(), Category::Medical);
    d.select_file(&png).await.unwrap();
    d.submit_and_wait("what is this").await;

    let turns = d.conversation().turns();
    assert_eq!(turns[0].content, "[Image: xray.png] what is this");
    assert_eq!(turns[1].content, "A rib.");
    assert!(d.attachment().is_none());
}

#[tokio::test]
async fn text_prompt_does_not_ask_for_json_or_send_a_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/text"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut d = dispatcher_for(&server.uri(), Category::Tech);
    d.submit_and_wait("plain question").await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let accept = requests[0]
        .headers
        .get("accept")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert_ne!(accept, "application/json");
    assert!(requests[0].body.is_empty());
}

#[tokio::test]
async fn web_search_takes_priority_over_attachment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(query_param("prompt", "latest rulings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "found" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let image = temp_file(&dir, "chart.png", b"png-bytes");

    let mut d = dispatcher_for(&server.uri(), Category::Law);
    d.select_file(&image).await.unwrap();
    d.toggle_web_search();
    d.submit_and_wait("latest rulings").await;

    assert_eq!(d.conversation().turns()[0].content, "[Web Search] latest rulings");
    assert_eq!(d.conversation().turns()[1].content, "found");
    assert!(d.attachment().is_none());
}

#[tokio::test]
async fn selecting_image_clears_pdf_and_vice_versa() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = temp_file(&dir, "a.pdf", b"%PDF");
    let image = temp_file(&dir, "b.webp", b"RIFF");

    let mut d = dispatcher_for("http://127.0.0.1:1", Category::Tech);
    d.select_file(&pdf).await.unwrap();
    d.select_file(&image).await.unwrap();
    assert_eq!(d.attachment().badge().as_deref(), Some("Image: b.webp"));

    d.select_file(&pdf).await.unwrap();
    assert_eq!(d.attachment().badge().as_deref(), Some("PDF: a.pdf"));
}

#[tokio::test]
async fn missing_response_field_uses_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/text"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "detail": "nothing" })))
        .mount(&server)
        .await;

    let mut d = dispatcher_for(&server.uri(), Category::Medical);
    d.submit_and_wait("anything").await;
    assert_eq!(d.conversation().turns()[1].content, NO_RESPONSE);
}

#[tokio::test]
async fn network_failure_becomes_error_message_and_clears_attachment() {
    // Bind then release a port so the connection is refused
    let uri = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };

    let dir = tempfile::tempdir().unwrap();
    let pdf = temp_file(&dir, "report.pdf", b"%PDF");

    let mut d = dispatcher_for(&uri, Category::Finance);
    d.select_file(&pdf).await.unwrap();
    d.submit_and_wait("summarize").await;

    let reply = &d.conversation().turns()[1];
    assert_eq!(reply.content, ERROR_MESSAGE);
    assert_eq!(reply.display, DisplayState::Complete);
    assert!(d.attachment().is_none());
    assert!(!d.is_loading());
}

#[tokio::test]
async fn server_error_and_non_json_become_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/text"))
        .and(query_param("prompt", "boom"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "detail": "boom" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/text"))
        .and(query_param("prompt", "html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let mut d = dispatcher_for(&server.uri(), Category::Tech);
    d.submit_and_wait("boom").await;
    d.submit_and_wait("html").await;

    let turns = d.conversation().turns();
    assert_eq!(turns[1].content, ERROR_MESSAGE);
    assert_eq!(turns[3].content, ERROR_MESSAGE);
}

#[tokio::test]
async fn second_submission_is_busy_while_request_outstanding() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/text"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "response": "slow" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut d = dispatcher_for(&server.uri(), Category::Literature);
    assert_eq!(d.submit("first"), SubmitOutcome::Submitted);
    assert!(d.conversation().last().unwrap().is_pending());

    assert_eq!(d.submit("second"), SubmitOutcome::Busy);
    assert_eq!(d.start_recording(), RecordOutcome::Busy);
    assert_eq!(d.conversation().len(), 2);

    while !d.poll().await {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(d.conversation().turns()[1].content, "slow");
    assert!(!d.is_busy());
}

#[tokio::test]
async fn reveal_completes_after_ticks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "abcdef" })))
        .mount(&server)
        .await;

    let mut d = dispatcher_for(&server.uri(), Category::Medical);
    d.submit_and_wait("go").await;
    assert!(d.conversation().has_streaming());

    d.tick(Instant::now() + Duration::from_secs(10));
    assert_eq!(d.conversation().turns()[1].display, DisplayState::Complete);
    assert_eq!(d.conversation().turns()[1].visible_text(), "abcdef");
}

#[tokio::test]
async fn voice_prompt_posts_wav_and_appends_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/audio"))
        .and(query_param("category", "architecture"))
        .and(header("X-API-Key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "heard you" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut d = dispatcher_for(&server.uri(), Category::Architecture);
    assert_eq!(d.start_recording(), RecordOutcome::Started);
    assert_eq!(d.conversation().turns()[0].content, "Recording...");

    assert!(d.stop_recording());
    assert_eq!(d.conversation().turns()[0].content, "Audio message sent");
    assert!(d.awaiting_voice_reply());
    assert_eq!(d.conversation().len(), 1);

    d.wait().await;
    let turns = d.conversation().turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].role, ChatRole::Assistant);
    assert_eq!(turns[1].content, "heard you");

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap_or_default().to_string();
    assert!(!query.contains("prompt="), "audio carries no prompt: {query}");

    let body = &requests[0].body;
    let needle = b"filename=\"recording.wav\"";
    assert!(body.windows(needle.len()).any(|w| w == needle));
    let riff = b"RIFF";
    assert!(body.windows(riff.len()).any(|w| w == riff));
}

#[tokio::test]
async fn paper_prompt_forwards_paper_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/papers"))
        .and(query_param("category", "tech"))
        .and(query_param("prompt", "key findings"))
        .and(query_param("paper", "attention is all you need"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "transformers" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut d = dispatcher_for(&server.uri(), Category::Tech);
    assert_eq!(
        d.submit_paper("key findings", "attention is all you need"),
        SubmitOutcome::Submitted
    );
    d.wait().await;
    assert_eq!(d.conversation().turns()[1].content, "transformers");
}

#[tokio::test]
async fn clear_documents_calls_nuke() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/nuke"))
        .and(header("X-API-Key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .expect(1)
        .mount(&server)
        .await;

    let d = dispatcher_for(&server.uri(), Category::Tech);
    d.client().unwrap().clear_documents().await.unwrap();
}
