use async_trait::async_trait;
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use serde_json::{json, Value};
use url::Url;

use super::{CaptionEntry, CaptionTrack, TranscriptError, TranscriptProvider};
use crate::config::Config;
use crate::utils::strip_markup;
use crate::Result;

static API_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).expect("Invalid API key regex")
});

/// Caption listing and download through YouTube's InnerTube player API
pub struct YoutubeTranscriptClient {
    client: reqwest::Client,
    base_url: String,
    client_name: String,
    client_version: String,
}

impl YoutubeTranscriptClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.youtube.accept_language)?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.youtube.base_url.trim_end_matches('/').to_string(),
            client_name: config.youtube.innertube_client_name.clone(),
            client_version: config.youtube.innertube_client_version.clone(),
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> std::result::Result<Url, TranscriptError> {
        Url::parse_with_params(&format!("{}{}", self.base_url, path), params)
            .map_err(|e| TranscriptError::Http(format!("Invalid YouTube URL {}{}: {}", self.base_url, path, e)))
    }

    async fn fetch_video_html(&self, video_id: &str) -> std::result::Result<String, TranscriptError> {
        tracing::debug!("Fetching watch page for: {}", video_id);

        let url = self.endpoint("/watch", &[("v", video_id)])?;
        let response = self.client.get(url).send().await?;
        check_http_status(&response, video_id)?;

        Ok(response.text().await?)
    }

    async fn fetch_innertube_data(
        &self,
        video_id: &str,
        api_key: &str,
    ) -> std::result::Result<Value, TranscriptError> {
        let url = self.endpoint("/youtubei/v1/player", &[("key", api_key)])?;

        let body = json!({
            "context": {
                "client": {
                    "clientName": self.client_name,
                    "clientVersion": self.client_version,
                }
            },
            "videoId": video_id,
        });

        tracing::debug!("Requesting InnerTube player data for: {}", video_id);

        let response = self.client.post(url).json(&body).send().await?;
        check_http_status(&response, video_id)?;

        response
            .json()
            .await
            .map_err(|e| TranscriptError::Parse(format!("InnerTube response: {}", e)))
    }
}

#[async_trait]
impl TranscriptProvider for YoutubeTranscriptClient {
    async fn list_transcripts(&self, video_id: &str) -> std::result::Result<Vec<CaptionTrack>, TranscriptError> {
        let html = self.fetch_video_html(video_id).await?;
        let api_key = extract_innertube_api_key(&html, video_id)?;
        let data = self.fetch_innertube_data(video_id, &api_key).await?;

        parse_caption_tracks(video_id, &data)
    }

    async fn fetch_transcript(&self, track: &CaptionTrack) -> std::result::Result<Vec<CaptionEntry>, TranscriptError> {
        if track.base_url.contains("&exp=xpe") {
            return Err(TranscriptError::PoTokenRequired(track.language_code.clone()));
        }

        tracing::debug!("Fetching {} caption track", track.language_code);

        let response = self.client.get(&track.base_url).send().await?;
        check_http_status(&response, &track.language_code)?;

        let xml = response.text().await?;
        if xml.trim().is_empty() {
            return Err(TranscriptError::NoTranscriptFound(track.language_code.clone()));
        }

        parse_timed_text(&xml)
    }

    fn provider_name(&self) -> &'static str {
        "YouTube InnerTube"
    }
}

fn check_http_status(response: &reqwest::Response, video_id: &str) -> std::result::Result<(), TranscriptError> {
    let status = response.status();

    if status.as_u16() == 429 {
        return Err(TranscriptError::TooManyRequests(video_id.to_string()));
    }

    if !status.is_success() {
        return Err(TranscriptError::Http(format!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown error")
        )));
    }

    Ok(())
}

/// Pull the InnerTube API key out of a watch page
pub fn extract_innertube_api_key(html: &str, video_id: &str) -> std::result::Result<String, TranscriptError> {
    if html.contains("g-recaptcha") {
        return Err(TranscriptError::RequestBlocked(video_id.to_string()));
    }

    API_KEY_RE
        .captures(html)
        .and_then(|captures| captures.get(1))
        .map(|key| key.as_str().to_string())
        .ok_or_else(|| TranscriptError::YouTubeDataUnparsable(video_id.to_string()))
}

/// Classify a non-OK playability status
pub fn assert_playability(video_id: &str, data: &Value) -> std::result::Result<(), TranscriptError> {
    let playability = match data.get("playabilityStatus") {
        Some(status) => status,
        None => return Ok(()),
    };

    let status = playability.get("status").and_then(Value::as_str).unwrap_or("");
    if status == "OK" {
        return Ok(());
    }

    let reason = playability.get("reason").and_then(Value::as_str).unwrap_or("");

    match status {
        "LOGIN_REQUIRED" if reason.contains("not a bot") => {
            Err(TranscriptError::RequestBlocked(video_id.to_string()))
        }
        "LOGIN_REQUIRED" if reason.contains("inappropriate") => {
            Err(TranscriptError::AgeRestricted(video_id.to_string()))
        }
        "ERROR" if reason.contains("unavailable") => {
            Err(TranscriptError::VideoUnavailable(video_id.to_string()))
        }
        _ => Err(TranscriptError::VideoUnplayable(video_id.to_string(), reason.to_string())),
    }
}

/// Turn InnerTube player data into an ordered track list: manual tracks first, then generated
pub fn parse_caption_tracks(video_id: &str, data: &Value) -> std::result::Result<Vec<CaptionTrack>, TranscriptError> {
    assert_playability(video_id, data)?;

    let renderer = data
        .get("captions")
        .and_then(|c| c.get("playerCaptionsTracklistRenderer"))
        .ok_or_else(|| TranscriptError::TranscriptsDisabled(video_id.to_string()))?;

    let mut manually_created = Vec::new();
    let mut generated = Vec::new();

    let caption_tracks = renderer
        .get("captionTracks")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for caption in caption_tracks {
        let language_code = match caption.get("languageCode").and_then(Value::as_str) {
            Some(code) => code.to_string(),
            None => continue,
        };

        let base_url = match caption.get("baseUrl").and_then(Value::as_str) {
            Some(url) => url.replace("&fmt=srv3", ""),
            None => continue,
        };

        let language_name = track_display_name(caption).unwrap_or(language_code.as_str()).to_string();
        let is_generated = caption.get("kind").and_then(Value::as_str) == Some("asr");

        let track = CaptionTrack {
            language_code,
            language_name,
            is_generated,
            base_url,
        };

        if is_generated {
            generated.push(track);
        } else {
            manually_created.push(track);
        }
    }

    if manually_created.is_empty() && generated.is_empty() {
        return Err(TranscriptError::TranscriptsDisabled(video_id.to_string()));
    }

    manually_created.extend(generated);
    Ok(manually_created)
}

fn track_display_name(caption: &Value) -> Option<&str> {
    let name = caption.get("name")?;

    name.get("simpleText").and_then(Value::as_str).or_else(|| {
        name.get("runs")?
            .as_array()?
            .first()?
            .get("text")?
            .as_str()
    })
}

/// Parse a timed-text XML document into caption entries.
///
/// Cue text is decoded twice: once as XML, then once more as HTML, since YouTube
/// escapes entities such as `&#39;` before embedding them in the document.
pub fn parse_timed_text(xml: &str) -> std::result::Result<Vec<CaptionEntry>, TranscriptError> {
    let mut reader = Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut is_timed_text = false;
    let mut current: Option<CaptionEntry> = None;
    let mut raw_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"transcript" | b"timedtext" => is_timed_text = true,
                b"text" => {
                    raw_text.clear();
                    current = Some(cue(e));
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"transcript" | b"timedtext" => is_timed_text = true,
                b"text" => entries.push(cue(e)),
                _ => {}
            },
            Ok(Event::Text(ref e)) if current.is_some() => raw_text.push_str(&unescape_xml(e)),
            Ok(Event::CData(ref e)) if current.is_some() => {
                raw_text.push_str(&String::from_utf8_lossy(e))
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"text" => {
                if let Some(mut entry) = current.take() {
                    let text = html_escape::decode_html_entities(&raw_text);
                    entry.text = Some(strip_markup(&text));
                    entries.push(entry);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(TranscriptError::Parse(format!(
                    "timed-text XML at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    if !is_timed_text {
        return Err(TranscriptError::Parse("not a timed-text document".to_string()));
    }

    Ok(entries)
}

/// An entry with the timing of a `<text>` element and no text yet
fn cue(element: &BytesStart) -> CaptionEntry {
    let mut start = 0.0;
    let mut duration = 0.0;

    for attr in element.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value);
        match attr.key.as_ref() {
            b"start" => start = value.parse().unwrap_or(0.0),
            b"dur" => duration = value.parse().unwrap_or(0.0),
            _ => {}
        }
    }

    CaptionEntry {
        text: None,
        start,
        duration,
    }
}

// quick-xml only knows the five XML entities; anything else (`&eacute;`) is left to the HTML pass
fn unescape_xml(text: &BytesText) -> String {
    match text.unescape() {
        Ok(unescaped) => unescaped.into_owned(),
        Err(_) => {
            let raw = String::from_utf8_lossy(text);
            html_escape::decode_html_entities(&raw).into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CaptionError;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WATCH_PAGE: &str = r#"<html><script>ytcfg.set({"INNERTUBE_API_KEY": "AIzaSyA-key_123"})</script></html>"#;

    const TIMED_TEXT: &str = r#"<?xml version="1.0" encoding="utf-8" ?><transcript><text start="0" dur="5.2">Hello &amp; welcome</text><text start="5.2" dur="1"/><text start="6.2" dur="3.1">&lt;font color=&quot;#E5E5E5&quot;&gt;it&#39;s&lt;/font&gt; here</text></transcript>"#;

    fn player_data() -> Value {
        json!({
            "playabilityStatus": { "status": "OK" },
            "captions": {
                "playerCaptionsTracklistRenderer": {
                    "captionTracks": [
                        {
                            "baseUrl": "https://www.youtube.com/api/timedtext?v=x&lang=ja&kind=asr&fmt=srv3",
                            "name": { "runs": [{ "text": "Japanese (auto-generated)" }] },
                            "languageCode": "ja",
                            "kind": "asr"
                        },
                        {
                            "baseUrl": "https://www.youtube.com/api/timedtext?v=x&lang=en-US",
                            "name": { "simpleText": "English (United States)" },
                            "languageCode": "en-US"
                        },
                        {
                            "baseUrl": "https://www.youtube.com/api/timedtext?v=x&lang=fr",
                            "languageCode": "fr"
                        },
                        { "name": { "simpleText": "Broken" } }
                    ]
                }
            }
        })
    }

    #[test]
    fn test_extract_api_key() {
        let html = r#"<script>ytcfg.set({"INNERTUBE_API_KEY": "AIzaSyA-key_123","X":1})</script>"#;
        assert_eq!(extract_innertube_api_key(html, "vid").unwrap(), "AIzaSyA-key_123");
    }

    #[test]
    fn test_extract_api_key_failures() {
        assert!(matches!(
            extract_innertube_api_key("<div class=\"g-recaptcha\"></div>", "vid"),
            Err(TranscriptError::RequestBlocked(_))
        ));
        assert!(matches!(
            extract_innertube_api_key("<html></html>", "vid"),
            Err(TranscriptError::YouTubeDataUnparsable(_))
        ));
    }

    #[test]
    fn test_parse_caption_tracks_orders_manual_first() {
        let tracks = parse_caption_tracks("vid", &player_data()).unwrap();
        let codes: Vec<&str> = tracks.iter().map(|t| t.language_code.as_str()).collect();
        assert_eq!(codes, vec!["en-US", "fr", "ja"]);

        assert_eq!(tracks[0].language_name, "English (United States)");
        assert!(!tracks[0].is_generated);
        // Missing name falls back to the code
        assert_eq!(tracks[1].language_name, "fr");
        assert_eq!(tracks[2].language_name, "Japanese (auto-generated)");
        assert!(tracks[2].is_generated);
        assert!(!tracks[2].base_url.contains("fmt=srv3"));
    }

    #[test]
    fn test_parse_caption_tracks_disabled() {
        let data = json!({ "playabilityStatus": { "status": "OK" } });
        assert!(matches!(
            parse_caption_tracks("vid", &data),
            Err(TranscriptError::TranscriptsDisabled(_))
        ));

        let data = json!({
            "captions": { "playerCaptionsTracklistRenderer": { "captionTracks": [] } }
        });
        assert!(matches!(
            parse_caption_tracks("vid", &data),
            Err(TranscriptError::TranscriptsDisabled(_))
        ));
    }

    #[test]
    fn test_playability_classification() {
        let unavailable = json!({
            "playabilityStatus": { "status": "ERROR", "reason": "This video is unavailable" }
        });
        assert!(matches!(
            assert_playability("vid", &unavailable),
            Err(TranscriptError::VideoUnavailable(_))
        ));

        let bot = json!({
            "playabilityStatus": { "status": "LOGIN_REQUIRED", "reason": "Sign in to confirm you're not a bot" }
        });
        assert!(matches!(assert_playability("vid", &bot), Err(TranscriptError::RequestBlocked(_))));

        let age = json!({
            "playabilityStatus": { "status": "LOGIN_REQUIRED", "reason": "This video may be inappropriate for some users." }
        });
        assert!(matches!(assert_playability("vid", &age), Err(TranscriptError::AgeRestricted(_))));

        let private = json!({
            "playabilityStatus": { "status": "UNPLAYABLE", "reason": "Private video" }
        });
        match assert_playability("vid", &private) {
            Err(TranscriptError::VideoUnplayable(id, reason)) => {
                assert_eq!(id, "vid");
                assert_eq!(reason, "Private video");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_timed_text() {
        let entries = parse_timed_text(TIMED_TEXT).unwrap();
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].text.as_deref(), Some("Hello & welcome"));
        assert_eq!(entries[0].start, 0.0);
        assert_eq!(entries[0].duration, 5.2);

        assert_eq!(entries[1].text, None);
        assert_eq!(entries[1].start, 5.2);

        assert_eq!(entries[2].text.as_deref(), Some("it's here"));
        assert_eq!(entries[2].duration, 3.1);
    }

    #[test]
    fn test_parse_timed_text_decodes_escaped_entities() {
        let xml = concat!(
            r#"<transcript><text start="0" dur="1">I&amp;#39;m here&amp;nbsp;now &amp;quot;ok&amp;quot;</text>"#,
            r#"<text start="1" dur="1">caf&eacute; &nbsp;x</text></transcript>"#
        );
        let entries = parse_timed_text(xml).unwrap();

        assert_eq!(entries[0].text.as_deref(), Some("I'm here\u{a0}now \"ok\""));
        assert_eq!(entries[1].text.as_deref(), Some("caf\u{e9} \u{a0}x"));
    }

    #[test]
    fn test_parse_timed_text_rejects_other_documents() {
        assert!(matches!(parse_timed_text("<html>nope</html>"), Err(TranscriptError::Parse(_))));
    }

    #[test]
    fn test_client_builds_from_default_config() {
        let client = YoutubeTranscriptClient::new(&Config::default()).unwrap();
        assert_eq!(client.client_name, "ANDROID");
        assert_eq!(client.provider_name(), "YouTube InnerTube");
    }

    fn client_for(server: &MockServer) -> YoutubeTranscriptClient {
        let mut config = Config::default();
        config.youtube.base_url = server.uri();
        YoutubeTranscriptClient::new(&config).unwrap()
    }

    fn track_at(server: &MockServer, base_url_suffix: &str) -> CaptionTrack {
        CaptionTrack {
            language_code: "en".to_string(),
            language_name: "English".to_string(),
            is_generated: false,
            base_url: format!("{}/api/timedtext?v=vid&lang=en{}", server.uri(), base_url_suffix),
        }
    }

    #[tokio::test]
    async fn test_list_transcripts_follows_watch_page_and_player() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/watch"))
            .and(query_param("v", "vid"))
            .respond_with(ResponseTemplate::new(200).set_body_string(WATCH_PAGE))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/player"))
            .and(query_param("key", "AIzaSyA-key_123"))
            .and(body_partial_json(json!({
                "videoId": "vid",
                "context": { "client": { "clientName": "ANDROID" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(player_data()))
            .expect(1)
            .mount(&server)
            .await;

        let tracks = client_for(&server).list_transcripts("vid").await.unwrap();
        let codes: Vec<&str> = tracks.iter().map(|t| t.language_code.as_str()).collect();
        assert_eq!(codes, vec!["en-US", "fr", "ja"]);
    }

    #[tokio::test]
    async fn test_rate_limited_watch_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/watch"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client_for(&server).list_transcripts("vid").await.unwrap_err();
        assert!(matches!(err, TranscriptError::TooManyRequests(ref id) if id == "vid"));
    }

    #[tokio::test]
    async fn test_player_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/watch"))
            .respond_with(ResponseTemplate::new(200).set_body_string(WATCH_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/youtubei/v1/player"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        match client_for(&server).list_transcripts("vid").await {
            Err(TranscriptError::Http(message)) => assert!(message.contains("503")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_transcript_parses_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/timedtext"))
            .and(query_param("lang", "en"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TIMED_TEXT))
            .mount(&server)
            .await;

        let entries = client_for(&server).fetch_transcript(&track_at(&server, "")).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].text.as_deref(), Some("Hello & welcome"));
    }

    #[tokio::test]
    async fn test_empty_transcript_body_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/timedtext"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_transcript(&track_at(&server, ""))
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptError::NoTranscriptFound(_)));
        assert_eq!(
            CaptionError::from(err).to_string(),
            "Captions are not available or have been disabled for this video."
        );
    }

    #[tokio::test]
    async fn test_po_token_track_is_not_requested() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TIMED_TEXT))
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_transcript(&track_at(&server, "&exp=xpe"))
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptError::PoTokenRequired(ref code) if code == "en"));
    }
}
