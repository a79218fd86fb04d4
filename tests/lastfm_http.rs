use std::sync::Arc;

use rnowplaying::clients::{
    Document, LastFmClient, MemoryDocument,
    errors::ErrorKind,
    lastfm::LastFmSettings,
};
use rnowplaying::widget::{ConfigBuilder, DEFAULT_TARGET_ID, Mode, RefreshOutcome, Widget};
use serde_json::json;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    task::JoinHandle,
};

// Serves one canned response per connection and records each request line
async fn serve(responses: Vec<(u16, String)>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let root = format!("http://{}/2.0/", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let mut request_lines = Vec::new();
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let request = String::from_utf8_lossy(&request);
            request_lines.push(request.lines().next().unwrap_or_default().to_string());

            let response = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        }
        request_lines
    });

    (root, server)
}

async fn setup(root: String) -> (Widget, Arc<MemoryDocument>) {
    let client = LastFmClient::from_settings(LastFmSettings {
        user: Some("tester".into()),
        api_key: Some("secret".into()),
        api_root: Some(root),
        timeout: None,
    })
    .unwrap();
    let document = Arc::new(MemoryDocument::with_elements([DEFAULT_TARGET_ID]));
    let config = ConfigBuilder::new()
        .api(Arc::new(client))
        .document(document.clone())
        .mode(Mode::NowPlaying)
        .build()
        .await
        .unwrap();
    (Widget::new(config), document)
}

#[tokio::test]
async fn test_falls_back_to_top_tracks_over_http() {
    let recent = json!({
        "recenttracks": {"track": [{
            "name": "Xtal",
            "artist": {"#text": "Aphex Twin"},
            "image": [],
            "date": {"uts": "1700000000"}
        }]}
    });
    let top = json!({
        "toptracks": {"track": [{
            "name": "Avril 14th",
            "artist": {"name": "Aphex Twin"},
            "image": [{"#text": "s"}, {"#text": "m"}, {"#text": "https://img/l.jpg"}],
            "@attr": {"rank": "1"}
        }]}
    });
    let (root, server) = serve(vec![(200, recent.to_string()), (200, top.to_string())]).await;
    let (widget, document) = setup(root).await;

    let outcome = widget.refresh().await;

    let requests = server.await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].starts_with(
        "GET /2.0/?method=user.getrecenttracks&user=tester&api_key=secret&format=json&limit=1 "
    ));
    assert!(requests[1].starts_with(
        "GET /2.0/?method=user.gettoptracks&user=tester&api_key=secret&format=json&period=7day&limit=1 "
    ));

    assert!(matches!(outcome, RefreshOutcome::Ok(_)));
    let html = document.inner_html(DEFAULT_TARGET_ID).await.unwrap();
    assert!(html.contains("On Repeat This Week:"));
    assert!(html.contains("Avril 14th"));
    assert!(html.contains(r#"src="https://img/l.jpg""#));
}

#[tokio::test]
async fn test_now_playing_needs_a_single_request() {
    let recent = json!({
        "recenttracks": {"track": [{
            "name": "Xtal",
            "artist": {"#text": "Aphex Twin"},
            "@attr": {"nowplaying": "true"}
        }]}
    });
    let (root, server) = serve(vec![(200, recent.to_string())]).await;
    let (widget, document) = setup(root).await;

    widget.refresh().await;

    assert_eq!(server.await.unwrap().len(), 1);
    let html = document.inner_html(DEFAULT_TARGET_ID).await.unwrap();
    assert!(html.contains("Now Playing:"));
    assert!(html.contains(r#"src="""#));
}

#[tokio::test]
async fn test_broken_recent_track_still_falls_back() {
    let recent = json!({
        "recenttracks": {"track": [{"name": "Xtal", "@attr": {"nowplaying": true}}]}
    });
    let top = json!({
        "toptracks": {"track": [{
            "name": "Flim",
            "artist": {"name": "Aphex Twin"},
            "image": [{"#text": null}, {"#text": null}, {"#text": null}]
        }]}
    });
    let (root, server) = serve(vec![(200, recent.to_string()), (200, top.to_string())]).await;
    let (widget, document) = setup(root).await;

    let outcome = widget.refresh().await;

    assert_eq!(server.await.unwrap().len(), 2);
    assert!(matches!(outcome, RefreshOutcome::Ok(_)));
    let html = document.inner_html(DEFAULT_TARGET_ID).await.unwrap();
    assert!(html.contains("On Repeat This Week:"));
    assert!(html.contains(">Flim</div>"));
    assert!(html.contains(r#"<img src="" alt="Album artwork""#));
}

#[tokio::test]
async fn test_error_body_clears_target() {
    let body = json!({"error": 17, "message": "Login: User required to be logged in"});
    let (root, server) = serve(vec![(403, body.to_string())]).await;
    let (widget, document) = setup(root).await;
    document
        .set_inner_html(DEFAULT_TARGET_ID, "<p>old</p>")
        .await
        .unwrap();

    let outcome = widget.refresh().await;

    server.await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Error(ErrorKind::Api));
    assert_eq!(document.inner_html(DEFAULT_TARGET_ID).await.unwrap(), "");
}

#[tokio::test]
async fn test_malformed_body_clears_target() {
    let (root, server) = serve(vec![(200, "<html>oops</html>".to_string())]).await;
    let (widget, document) = setup(root).await;
    document
        .set_inner_html(DEFAULT_TARGET_ID, "<p>old</p>")
        .await
        .unwrap();

    let outcome = widget.refresh().await;

    server.await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Error(ErrorKind::Parse));
    assert_eq!(document.inner_html(DEFAULT_TARGET_ID).await.unwrap(), "");
}
