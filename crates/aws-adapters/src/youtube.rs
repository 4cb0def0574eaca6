//! `VideoPlatformClient` and `LiveChatSourceFactory` against the real
//! YouTube surfaces named in §6.1-§6.3, using `reqwest` the way the
//! teacher's `youtube/src/main.rs` builds and drives an HTTP client for
//! the OAuth token exchange.

use async_trait::async_trait;
use quick_xml::de::from_str as xml_from_str;
use serde::Deserialize;
use std::time::Duration;
use time::OffsetDateTime;

use youtube_chat_archiver_core::capability::{
    ChannelMetadata, ChatEvent, FeedEntry, LiveBroadcastContent, LiveChatSource,
    LiveChatSourceFactory, VideoPlatformClient, VideoState,
};
use youtube_chat_archiver_core::error::{OrchestratorError, Result};
use youtube_chat_archiver_core::model::AuthorFlags;

use crate::credential::CachedApiKey;

/// Every upstream HTTP call uses this timeout (§5 "Cancellation &
/// timeouts").
const HTTP_TIMEOUT: Duration = Duration::from_secs(12);

const FEED_URL: &str = "https://www.youtube.com/feeds/videos.xml";
const VIDEOS_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/videos";
const CHANNELS_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/channels";

pub struct YouTubeApiClient {
    http: reqwest::Client,
    api_key: CachedApiKey,
}

impl YouTubeApiClient {
    pub fn new(api_key: CachedApiKey) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| OrchestratorError::Programmer(format!("failed to build http client: {e}")))?;
        Ok(Self { http, api_key })
    }
}

// --- Atom feed (§6.1) -------------------------------------------------

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    // quick-xml matches element names literally, including namespace
    // prefixes, so the `yt:` prefix on `videoId` is part of the tag name
    // rather than something resolved away.
    #[serde(rename = "yt:videoId")]
    video_id: String,
    title: String,
    published: String,
}

fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>> {
    let feed: AtomFeed = xml_from_str(xml)
        .map_err(|e| OrchestratorError::UpstreamTransient(format!("failed to parse feed xml: {e}")))?;
    feed.entries
        .into_iter()
        .map(|entry| {
            let published = OffsetDateTime::parse(
                &entry.published,
                &time::format_description::well_known::Rfc3339,
            )
            .map_err(|e| {
                OrchestratorError::UpstreamTransient(format!(
                    "failed to parse published timestamp {}: {e}",
                    entry.published
                ))
            })?;
            Ok(FeedEntry {
                video_id: entry.video_id,
                title: entry.title,
                published,
            })
        })
        .collect()
}

// --- Videos / channels control API (§6.2) -----------------------------

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    snippet: VideoSnippet,
    #[serde(rename = "liveStreamingDetails", default)]
    live_streaming_details: Option<LiveStreamingDetails>,
}

#[derive(Debug, Deserialize)]
struct VideoSnippet {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "liveBroadcastContent")]
    live_broadcast_content: String,
}

#[derive(Debug, Deserialize)]
struct LiveStreamingDetails {
    #[serde(rename = "scheduledStartTime", default)]
    scheduled_start_time: Option<String>,
    #[serde(rename = "actualStartTime", default)]
    actual_start_time: Option<String>,
    #[serde(rename = "actualEndTime", default)]
    actual_end_time: Option<String>,
    #[serde(rename = "concurrentViewers", default)]
    concurrent_viewers: Option<String>,
}

fn parse_rfc3339(s: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339).ok()
}

#[derive(Debug, Deserialize)]
struct ChannelsResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    snippet: ChannelSnippet,
    #[serde(default)]
    statistics: ChannelStatistics,
}

#[derive(Debug, Default, Deserialize)]
struct ChannelSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    thumbnails: Option<ChannelThumbnails>,
}

#[derive(Debug, Deserialize)]
struct ChannelThumbnails {
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChannelStatistics {
    #[serde(default)]
    subscriber_count: Option<String>,
    #[serde(default)]
    video_count: Option<String>,
    #[serde(default)]
    view_count: Option<String>,
}

#[async_trait]
impl VideoPlatformClient for YouTubeApiClient {
    async fn fetch_channel_feed(&self, channel_id: &str) -> Result<Vec<FeedEntry>> {
        let response = self
            .http
            .get(FEED_URL)
            .query(&[("channel_id", channel_id)])
            .send()
            .await
            .map_err(|e| OrchestratorError::UpstreamTransient(format!("feed request failed: {e}")))?;
        let body = response
            .text()
            .await
            .map_err(|e| OrchestratorError::UpstreamTransient(format!("feed body read failed: {e}")))?;
        parse_feed(&body)
    }

    async fn fetch_video_state(&self, video_id: &str) -> Result<VideoState> {
        let api_key = self.api_key.get().await?;
        let response: VideosResponse = self
            .http
            .get(VIDEOS_ENDPOINT)
            .query(&[
                ("id", video_id),
                ("part", "liveStreamingDetails,snippet,status"),
                ("key", api_key),
            ])
            .send()
            .await
            .map_err(|e| OrchestratorError::UpstreamTransient(format!("videos request failed: {e}")))?
            .json()
            .await
            .map_err(|e| OrchestratorError::UpstreamTransient(format!("videos response parse failed: {e}")))?;

        let item = response.items.into_iter().next().ok_or_else(|| {
            OrchestratorError::UpstreamPermanent(format!("video {video_id} not found"))
        })?;

        let live_broadcast_content = match item.snippet.live_broadcast_content.as_str() {
            "live" => LiveBroadcastContent::Live,
            "upcoming" => LiveBroadcastContent::Upcoming,
            "none" => LiveBroadcastContent::None,
            other => LiveBroadcastContent::Other(other.to_string()),
        };

        let details = item.live_streaming_details;
        Ok(VideoState {
            live_broadcast_content,
            has_live_streaming_details: details.is_some(),
            title: item.snippet.title,
            description: item.snippet.description,
            scheduled_start_time: details
                .as_ref()
                .and_then(|d| d.scheduled_start_time.as_deref())
                .and_then(parse_rfc3339),
            actual_start_time: details
                .as_ref()
                .and_then(|d| d.actual_start_time.as_deref())
                .and_then(parse_rfc3339),
            actual_end_time: details
                .as_ref()
                .and_then(|d| d.actual_end_time.as_deref())
                .and_then(parse_rfc3339),
            concurrent_viewers: details
                .as_ref()
                .and_then(|d| d.concurrent_viewers.as_deref())
                .and_then(|v| v.parse().ok()),
        })
    }

    async fn fetch_channel_metadata(&self, channel_id: &str) -> Result<ChannelMetadata> {
        let api_key = self.api_key.get().await?;
        let response: ChannelsResponse = self
            .http
            .get(CHANNELS_ENDPOINT)
            .query(&[
                ("id", channel_id),
                ("part", "snippet,statistics,brandingSettings"),
                ("key", api_key),
            ])
            .send()
            .await
            .map_err(|e| OrchestratorError::UpstreamTransient(format!("channels request failed: {e}")))?
            .json()
            .await
            .map_err(|e| OrchestratorError::UpstreamTransient(format!("channels response parse failed: {e}")))?;

        let item = response.items.into_iter().next().ok_or_else(|| {
            OrchestratorError::UpstreamPermanent(format!("channel {channel_id} not found"))
        })?;

        Ok(ChannelMetadata {
            display_name: item.snippet.title,
            description: item.snippet.description,
            subscriber_count: item.statistics.subscriber_count.and_then(|v| v.parse().ok()),
            video_count: item.statistics.video_count.and_then(|v| v.parse().ok()),
            view_count: item.statistics.view_count.and_then(|v| v.parse().ok()),
            thumbnail_url: item
                .snippet
                .thumbnails
                .and_then(|t| t.default)
                .map(|t| t.url),
        })
    }
}

// --- Live chat source (§6.3, SPEC_FULL.md Open Question 2) ------------

const LIVE_CHAT_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/liveChat/messages";

#[derive(Debug, Deserialize)]
struct LiveChatMessagesResponse {
    #[serde(rename = "nextPageToken", default)]
    next_page_token: Option<String>,
    #[serde(rename = "pollingIntervalMillis", default)]
    polling_interval_millis: Option<u64>,
    #[serde(default)]
    items: Vec<LiveChatMessageItem>,
}

#[derive(Debug, Deserialize)]
struct LiveChatMessageItem {
    id: String,
    snippet: LiveChatMessageSnippet,
    #[serde(rename = "authorDetails")]
    author_details: LiveChatAuthorDetails,
}

#[derive(Debug, Deserialize)]
struct LiveChatMessageSnippet {
    #[serde(rename = "displayMessage", default)]
    display_message: String,
    #[serde(rename = "publishedAt")]
    published_at: String,
}

#[derive(Debug, Deserialize)]
struct LiveChatAuthorDetails {
    #[serde(rename = "displayName")]
    display_name: String,
    #[serde(rename = "channelId")]
    channel_id: String,
    #[serde(rename = "isChatOwner", default)]
    is_chat_owner: bool,
    #[serde(rename = "isChatModerator", default)]
    is_chat_moderator: bool,
    #[serde(rename = "isVerified", default)]
    is_verified: bool,
}

/// A live-chat subscription that polls the `liveChat/messages` API
/// surface, carrying the live-chat-id discovered from the video resource
/// and the continuation token YouTube hands back each poll.
pub struct PollingLiveChatSource {
    http: reqwest::Client,
    api_key: String,
    live_chat_id: String,
    page_token: Option<String>,
    alive: bool,
}

#[async_trait]
impl LiveChatSource for PollingLiveChatSource {
    fn is_alive(&self) -> bool {
        self.alive
    }

    async fn poll(&mut self) -> Result<Vec<ChatEvent>> {
        let mut request = self.http.get(LIVE_CHAT_ENDPOINT).query(&[
            ("liveChatId", self.live_chat_id.as_str()),
            ("part", "snippet,authorDetails"),
            ("key", self.api_key.as_str()),
        ]);
        if let Some(token) = &self.page_token {
            request = request.query(&[("pageToken", token.as_str())]);
        }

        let response: LiveChatMessagesResponse = request
            .send()
            .await
            .map_err(|e| OrchestratorError::UpstreamTransient(format!("live chat poll failed: {e}")))?
            .json()
            .await
            .map_err(|e| OrchestratorError::UpstreamTransient(format!("live chat response parse failed: {e}")))?;

        if response.next_page_token.is_none() {
            // YouTube stops returning a continuation token once the
            // chat closes; treat that as end-of-stream (§6.3 `is_alive`).
            self.alive = false;
        } else {
            self.page_token = response.next_page_token;
        }

        Ok(response
            .items
            .into_iter()
            .filter_map(|item| {
                let datetime = parse_rfc3339(&item.snippet.published_at)?;
                Some(ChatEvent {
                    platform_message_id: item.id,
                    author_name: item.author_details.display_name,
                    author_channel_id: item.author_details.channel_id,
                    body: item.snippet.display_message,
                    datetime,
                    author_flags: AuthorFlags {
                        is_owner: item.author_details.is_chat_owner,
                        is_moderator: item.author_details.is_chat_moderator,
                        is_verified: item.author_details.is_verified,
                    },
                })
            })
            .collect())
    }

    async fn terminate(&mut self) {
        self.alive = false;
    }
}

pub struct PollingLiveChatSourceFactory {
    http: reqwest::Client,
    api_key: CachedApiKey,
}

impl PollingLiveChatSourceFactory {
    pub fn new(api_key: CachedApiKey) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| OrchestratorError::Programmer(format!("failed to build http client: {e}")))?;
        Ok(Self { http, api_key })
    }

    async fn resolve_live_chat_id(&self, video_id: &str) -> Result<String> {
        let api_key = self.api_key.get().await?;
        #[derive(Deserialize)]
        struct Resp {
            items: Vec<Item>,
        }
        #[derive(Deserialize)]
        struct Item {
            #[serde(rename = "liveStreamingDetails")]
            live_streaming_details: Option<Details>,
        }
        #[derive(Deserialize)]
        struct Details {
            #[serde(rename = "activeLiveChatId")]
            active_live_chat_id: Option<String>,
        }

        let response: Resp = self
            .http
            .get(VIDEOS_ENDPOINT)
            .query(&[("id", video_id), ("part", "liveStreamingDetails"), ("key", api_key)])
            .send()
            .await
            .map_err(|e| OrchestratorError::UpstreamTransient(format!("video lookup failed: {e}")))?
            .json()
            .await
            .map_err(|e| OrchestratorError::UpstreamTransient(format!("video lookup parse failed: {e}")))?;

        response
            .items
            .into_iter()
            .next()
            .and_then(|item| item.live_streaming_details)
            .and_then(|d| d.active_live_chat_id)
            .ok_or_else(|| {
                OrchestratorError::UpstreamPermanent(format!(
                    "video {video_id} has no active live chat"
                ))
            })
    }
}

#[async_trait]
impl LiveChatSourceFactory for PollingLiveChatSourceFactory {
    type Source = PollingLiveChatSource;

    async fn connect(&self, video_id: &str) -> Result<Self::Source> {
        let live_chat_id = self.resolve_live_chat_id(video_id).await?;
        let api_key = self.api_key.get().await?.to_string();
        Ok(PollingLiveChatSource {
            http: self.http.clone(),
            api_key,
            live_chat_id,
            page_token: None,
            alive: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_atom_feed_entries() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:yt="http://www.youtube.com/xml/schemas/2015">
  <entry>
    <yt:videoId>abc123</yt:videoId>
    <title>Live now</title>
    <published>2026-07-26T12:00:00+00:00</published>
  </entry>
</feed>"#;
        let entries = parse_feed(xml).expect("feed parses");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].video_id, "abc123");
        assert_eq!(entries[0].title, "Live now");
    }

    #[test]
    fn rejects_feed_entry_with_unparseable_timestamp() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:yt="http://www.youtube.com/xml/schemas/2015">
  <entry>
    <yt:videoId>abc123</yt:videoId>
    <title>Live now</title>
    <published>not-a-timestamp</published>
  </entry>
</feed>"#;
        assert!(parse_feed(xml).is_err());
    }

    #[test]
    fn unknown_live_broadcast_content_falls_back_to_other() {
        let content = "private";
        let mapped = match content {
            "live" => LiveBroadcastContent::Live,
            "upcoming" => LiveBroadcastContent::Upcoming,
            "none" => LiveBroadcastContent::None,
            other => LiveBroadcastContent::Other(other.to_string()),
        };
        assert_eq!(mapped, LiveBroadcastContent::Other("private".to_string()));
    }
}
