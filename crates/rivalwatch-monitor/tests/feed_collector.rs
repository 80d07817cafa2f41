//! `FeedCollector` against RSS and YouTube-style Atom feeds served by
//! `wiremock`.

use std::collections::BTreeMap;

use rivalwatch_core::{Competitor, CompetitorStatus, Platform};
use rivalwatch_crawler::FetchSettings;
use rivalwatch_monitor::{CollectorError, CollectorRegistry, FeedCollector, PlatformCollector};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Acme blog</title>
    <link>https://acme.example/blog</link>
    <item>
      <title>Older post</title>
      <link>https://acme.example/blog/older</link>
      <guid>acme-1</guid>
      <pubDate>Mon, 02 Mar 2026 09:00:00 GMT</pubDate>
      <description>Plain summary</description>
    </item>
    <item>
      <title>Spring launch</title>
      <link>https://acme.example/blog/spring</link>
      <guid>acme-2</guid>
      <pubDate>Tue, 10 Mar 2026 09:00:00 GMT</pubDate>
      <description><![CDATA[<p>New <b>pricing</b> tiers</p>]]></description>
    </item>
  </channel>
</rss>"#;

const YOUTUBE_ATOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"
      xmlns:yt="http://www.youtube.com/xml/schemas/2015"
      xmlns:media="http://search.yahoo.com/mrss/">
  <title>Acme</title>
  <id>yt:channel:UC123</id>
  <updated>2026-03-10T09:00:00+00:00</updated>
  <entry>
    <id>yt:video:abc123</id>
    <title>Product demo</title>
    <link rel="alternate" href="https://www.youtube.com/watch?v=abc123"/>
    <published>2026-03-10T09:00:00+00:00</published>
    <updated>2026-03-10T09:00:00+00:00</updated>
    <media:group>
      <media:title>Product demo</media:title>
      <media:description>A walkthrough of the new dashboard</media:description>
    </media:group>
  </entry>
</feed>"#;

fn competitor(handles: &[(Platform, String)]) -> Competitor {
    Competitor {
        id: 7,
        name: "Acme".to_string(),
        website_url: Some("https://acme.example".to_string()),
        handles: handles.iter().cloned().collect::<BTreeMap<_, _>>(),
        platforms: handles.iter().map(|(p, _)| *p).collect(),
        scan_frequency_minutes: 60,
        status: CompetitorStatus::Active,
        last_scan_at: None,
    }
}

fn collector() -> FeedCollector {
    FeedCollector::new(&FetchSettings {
        timeout_secs: 5,
        ..FetchSettings::default()
    })
    .expect("client builds")
}

#[tokio::test]
async fn rss_items_come_back_newest_first_with_guid_identity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string(RSS),
        )
        .mount(&server)
        .await;

    let acme = competitor(&[(Platform::Rss, format!("{}/feed.xml", server.uri()))]);
    let items = collector()
        .collect(&acme, Platform::Rss)
        .await
        .expect("feed collects");

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].post_id.as_deref(), Some("acme-2"));
    assert_eq!(items[0].url, "https://acme.example/blog/spring");
    assert_eq!(items[0].title.as_deref(), Some("Spring launch"));
    assert!(items[0].text.starts_with("Spring launch\n\n"));
    assert!(items[0].text.contains("New pricing tiers"));
    assert!(!items[0].text.contains("<b>"));
    assert_eq!(items[1].post_id.as_deref(), Some("acme-1"));
}

#[tokio::test]
async fn youtube_channel_id_is_read_through_the_channel_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feeds/videos.xml"))
        .and(query_param("channel_id", "UC123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(YOUTUBE_ATOM))
        .expect(1)
        .mount(&server)
        .await;

    let acme = competitor(&[(Platform::Youtube, "UC123".to_string())]);
    let items = collector()
        .with_youtube_feed_base(format!("{}/feeds/videos.xml", server.uri()))
        .collect(&acme, Platform::Youtube)
        .await
        .expect("feed collects");

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].url, "https://www.youtube.com/watch?v=abc123");
    assert!(items[0].text.contains("walkthrough of the new dashboard"));
    assert!(items[0].published_at.is_some());
}

#[tokio::test]
async fn http_error_is_reported_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let acme = competitor(&[(Platform::Rss, format!("{}/feed.xml", server.uri()))]);
    let err = collector()
        .collect(&acme, Platform::Rss)
        .await
        .expect_err("410 must fail");

    assert!(matches!(err, CollectorError::UnexpectedStatus { status: 410, .. }));
}

#[tokio::test]
async fn malformed_feed_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not a feed</html>"))
        .mount(&server)
        .await;

    let acme = competitor(&[(Platform::Rss, format!("{}/feed.xml", server.uri()))]);
    let err = collector()
        .collect(&acme, Platform::Rss)
        .await
        .expect_err("html is not a feed");

    assert!(matches!(err, CollectorError::Parse { .. }));
}

#[tokio::test]
async fn missing_handle_fails_without_a_request() {
    let acme = competitor(&[]);
    let err = collector()
        .collect(&acme, Platform::Rss)
        .await
        .expect_err("no handle");
    assert!(matches!(err, CollectorError::MissingHandle(Platform::Rss)));
}

#[tokio::test]
async fn registry_routes_feed_platforms_and_rejects_the_rest() {
    let registry = CollectorRegistry::with_feeds(collector());
    assert!(registry.get(Platform::Rss).is_some());
    assert!(registry.get(Platform::Youtube).is_some());

    let acme = competitor(&[]);
    let err = registry
        .collect(&acme, Platform::Linkedin)
        .await
        .expect_err("no collector");
    assert!(matches!(err, CollectorError::NoCollector(Platform::Linkedin)));
}
