//! Integration tests for the scrape engine
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! scrape cycle end-to-end: config, fetch, evaluation and export.

use serde_json::{json, Value};
use weft::config::{load_config, Config, Settings};
use weft::scrape::{run_scrape, Engine, HttpFetcher};
use weft::sitemap::SiteMap;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration for the given export format and sitemap.
fn create_test_config(export: &str, output_file: &str, sitemap: SiteMap) -> Config {
    Config {
        settings: Settings {
            javascript: false,
            workers: 2,
            export: export.to_string(),
            user_agents: vec!["weft-test/1.0".to_string()],
            proxy: vec![],
            captcha: None,
            log: false,
            log_file: None,
            output_file: output_file.to_string(),
        },
        sitemap,
    }
}

fn sitemap_from_json(start_urls: Vec<String>, selectors: Value) -> SiteMap {
    serde_json::from_value(json!({
        "_id": "integration",
        "startUrl": start_urls,
        "selectors": selectors,
    }))
    .unwrap()
}

async fn mock_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_scrape_with_nested_links_exports_json() {
    let server = MockServer::start().await;
    mock_page(
        &server,
        "/list",
        r#"<html><body>
            <h1>Catalog</h1>
            <a class="item" href="/detail/1">first</a>
            <a class="item" href="/detail/2">second</a>
        </body></html>"#,
    )
    .await;
    mock_page(&server, "/detail/1", "<h2>Alpha</h2><span class=\"price\">10 EUR</span>").await;
    mock_page(&server, "/detail/2", "<h2>Beta</h2><span class=\"price\">20 EUR</span>").await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("records.json");
    let list_url = format!("{}/list", server.uri());
    let config = create_test_config(
        "json",
        out.to_str().unwrap(),
        sitemap_from_json(
            vec![list_url.clone()],
            json!([
                {"id": "heading", "type": "SelectorText",
                 "parentSelectors": ["_root"], "selector": "h1", "multiple": false},
                {"id": "items", "type": "SelectorLink",
                 "parentSelectors": ["_root"], "selector": "a.item", "multiple": true},
                {"id": "name", "type": "SelectorText",
                 "parentSelectors": ["items"], "selector": "h2", "multiple": false},
                {"id": "price", "type": "SelectorText",
                 "parentSelectors": ["items"], "selector": ".price", "multiple": false,
                 "regex": "\\d+"}
            ]),
        ),
    );

    run_scrape(config, None).await.unwrap();

    let exported: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(
        exported[&list_url],
        json!({
            "heading": "Catalog",
            "items": {
                (format!("{}/detail/1", server.uri())): {"name": "Alpha", "price": "10"},
                (format!("{}/detail/2", server.uri())): {"name": "Beta", "price": "20"}
            }
        })
    );
}

#[tokio::test]
async fn range_pattern_scrapes_each_expanded_page() {
    let server = MockServer::start().await;
    for n in 1..=3 {
        mock_page(&server, &format!("/page/{n}"), &format!("<h1>page {n}</h1>")).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("records.json");
    let config = create_test_config(
        "json",
        out.to_str().unwrap(),
        sitemap_from_json(
            vec![format!("{}/page/[1-3]", server.uri())],
            json!([
                {"id": "title", "type": "SelectorText",
                 "parentSelectors": ["_root"], "selector": "h1", "multiple": false}
            ]),
        ),
    );

    run_scrape(config, None).await.unwrap();

    let exported: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    let records = exported.as_object().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[&format!("{}/page/2", server.uri())], json!({"title": "page 2"}));
}

#[tokio::test]
async fn pagination_follows_next_links_exactly_once() {
    let server = MockServer::start().await;
    // Each page is mounted with expect(1): a revisit fails the test.
    for (route, body) in [
        ("/p1", r#"<p class="row">a</p><a class="next" href="/p2">next</a>"#),
        ("/p2", r#"<p class="row">b</p><a class="next" href="/p3">next</a>"#),
        // The last page links back to the first; dedup must stop the run.
        ("/p3", r#"<p class="row">c</p><a class="next" href="/p1">next</a>"#),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("records.json");
    let config = create_test_config(
        "json",
        out.to_str().unwrap(),
        sitemap_from_json(
            vec![format!("{}/p1", server.uri())],
            json!([
                {"id": "row", "type": "SelectorText",
                 "parentSelectors": ["_root"], "selector": "p.row", "multiple": true},
                {"id": "next", "type": "SelectorLink",
                 "parentSelectors": ["_root", "next"], "selector": "a.next",
                 "multiple": true}
            ]),
        ),
    );

    run_scrape(config, None).await.unwrap();

    let exported: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    let records = exported.as_object().unwrap();
    assert_eq!(records.len(), 3);
    // The pagination selector itself never appears as a field.
    assert_eq!(records[&format!("{}/p1", server.uri())], json!({"row": "a"}));
}

#[tokio::test]
async fn configured_user_agent_is_sent_with_every_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ua"))
        .and(header("user-agent", "weft-test/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>ok</h1>"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("records.json");
    let config = create_test_config(
        "json",
        out.to_str().unwrap(),
        sitemap_from_json(
            vec![format!("{}/ua", server.uri())],
            json!([
                {"id": "title", "type": "SelectorText",
                 "parentSelectors": ["_root"], "selector": "h1", "multiple": false}
            ]),
        ),
    );

    run_scrape(config, None).await.unwrap();

    let exported: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(exported[format!("{}/ua", server.uri())], json!({"title": "ok"}));
}

#[tokio::test]
async fn csv_export_appends_one_row_per_page() {
    let server = MockServer::start().await;
    mock_page(&server, "/a", "<h1>first</h1>").await;
    mock_page(&server, "/b", "<h1>second</h1>").await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("records.csv");
    let config = create_test_config(
        "csv",
        out.to_str().unwrap(),
        sitemap_from_json(
            vec![format!("{}/a", server.uri()), format!("{}/b", server.uri())],
            json!([
                {"id": "title", "type": "SelectorText",
                 "parentSelectors": ["_root"], "selector": "h1", "multiple": false}
            ]),
        ),
    );

    run_scrape(config, None).await.unwrap();

    let csv = std::fs::read_to_string(&out).unwrap();
    let rows: Vec<&str> = csv.lines().collect();
    assert_eq!(rows.len(), 2);
    assert!(csv.contains("first"));
    assert!(csv.contains("second"));
}

#[tokio::test]
async fn xml_export_writes_page_elements() {
    let server = MockServer::start().await;
    mock_page(&server, "/x", "<h1>rendered</h1>").await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("records.xml");
    let config = create_test_config(
        "xml",
        out.to_str().unwrap(),
        sitemap_from_json(
            vec![format!("{}/x", server.uri())],
            json!([
                {"id": "title", "type": "SelectorText",
                 "parentSelectors": ["_root"], "selector": "h1", "multiple": false}
            ]),
        ),
    );

    run_scrape(config, None).await.unwrap();

    let xml = std::fs::read_to_string(&out).unwrap();
    assert!(xml.contains("<scrape>"));
    assert!(xml.contains("<title>rendered</title>"));
}

#[tokio::test]
async fn non_success_status_bodies_are_still_evaluated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("<h1>not here</h1>"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("records.json");
    let config = create_test_config(
        "json",
        out.to_str().unwrap(),
        sitemap_from_json(
            vec![format!("{}/gone", server.uri())],
            json!([
                {"id": "title", "type": "SelectorText",
                 "parentSelectors": ["_root"], "selector": "h1", "multiple": false}
            ]),
        ),
    );

    run_scrape(config, None).await.unwrap();

    let exported: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(exported[format!("{}/gone", server.uri())], json!({"title": "not here"}));
}

#[tokio::test]
async fn unreachable_pages_are_dropped_without_failing_the_run() {
    let server = MockServer::start().await;
    mock_page(&server, "/up", "<h1>alive</h1>").await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("records.json");
    let config = create_test_config(
        "json",
        out.to_str().unwrap(),
        sitemap_from_json(
            vec![
                "http://127.0.0.1:1/down".to_string(),
                format!("{}/up", server.uri()),
            ],
            json!([
                {"id": "title", "type": "SelectorText",
                 "parentSelectors": ["_root"], "selector": "h1", "multiple": false}
            ]),
        ),
    );

    run_scrape(config, None).await.unwrap();

    let exported: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    let records = exported.as_object().unwrap();
    assert_eq!(records.len(), 1);
    assert!(records.contains_key(&format!("{}/up", server.uri())));
}

#[tokio::test]
async fn config_file_drives_an_end_to_end_run() {
    let server = MockServer::start().await;
    mock_page(&server, "/home", "<h1>from disk</h1>").await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("records.json");
    let config_path = dir.path().join("sitemap.json");
    std::fs::write(
        &config_path,
        serde_json::to_string_pretty(&json!({
            "settings": {
                "workers": 1,
                "export": "json",
                "output_filename": out.to_str().unwrap()
            },
            "sitemap": {
                "_id": "from-disk",
                "startUrl": [format!("{}/home", server.uri())],
                "selectors": [
                    {"id": "title", "type": "SelectorText",
                     "parentSelectors": ["_root"], "selector": "h1",
                     "multiple": false}
                ]
            }
        }))
        .unwrap(),
    )
    .unwrap();

    let config = load_config(&config_path).unwrap();
    run_scrape(config, None).await.unwrap();

    let exported: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(exported[format!("{}/home", server.uri())], json!({"title": "from disk"}));
}

#[tokio::test]
async fn engine_with_http_fetcher_exports_records() {
    let server = MockServer::start().await;
    mock_page(&server, "/only", "<h1>solo</h1>").await;

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("records.json");
    let config = create_test_config(
        "json",
        out.to_str().unwrap(),
        sitemap_from_json(
            vec![format!("{}/only", server.uri())],
            json!([
                {"id": "title", "type": "SelectorText",
                 "parentSelectors": ["_root"], "selector": "h1", "multiple": false}
            ]),
        ),
    );

    let fetcher = HttpFetcher::new(&config.settings).unwrap();
    let engine = Engine::new(config.settings, fetcher).unwrap();
    engine.run(config.sitemap).await.unwrap();

    let exported: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(exported[format!("{}/only", server.uri())], json!({"title": "solo"}));
}
