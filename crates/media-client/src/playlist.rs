//! Variant-selecting stream engine.
//!
//! Fetches the master playlist, picks the highest-bandwidth rendition, and
//! hands that media playlist to the element.  A playlist without
//! `#EXT-X-STREAM-INF` entries is already a media playlist and is bound as-is.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Method, Url};
use tracing::{debug, info};

use crate::error::PlayerError;
use crate::player::{EngineFactory, MediaElement, StreamEngine};
use crate::transport::{Body, RequestOptions, Transport};

const PLAYLIST_ACCEPT: &str = "application/vnd.apple.mpegurl, application/x-mpegurl, */*";

#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub bandwidth: u64,
    pub resolution: Option<String>,
    pub uri: String,
}

/// Parse the `#EXT-X-STREAM-INF` entries of a master playlist.
pub fn parse_variants(content: &str) -> Vec<Variant> {
    let mut variants = Vec::new();
    let mut pending: Option<(u64, Option<String>)> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(attrs) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            let bandwidth = attribute(attrs, "BANDWIDTH")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let resolution = attribute(attrs, "RESOLUTION").map(str::to_string);
            pending = Some((bandwidth, resolution));
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        if let Some((bandwidth, resolution)) = pending.take() {
            variants.push(Variant {
                bandwidth,
                resolution,
                uri: line.to_string(),
            });
        }
    }

    variants
}

/// Attribute lookup in an `A=B,C="D,E"` list.  Quoted values may contain commas.
fn attribute<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    let mut rest = attrs;
    while !rest.is_empty() {
        let eq = rest.find('=')?;
        let key = rest[..eq].trim();
        let after = &rest[eq + 1..];
        let (value, tail) = if let Some(quoted) = after.strip_prefix('"') {
            let end = quoted.find('"')?;
            let tail = quoted[end + 1..].trim_start_matches(',');
            (&quoted[..end], tail)
        } else {
            match after.find(',') {
                Some(comma) => (&after[..comma], &after[comma + 1..]),
                None => (after, ""),
            }
        };
        if key.eq_ignore_ascii_case(name) {
            return Some(value.trim());
        }
        rest = tail;
    }
    None
}

pub fn select_variant(variants: &[Variant]) -> Option<&Variant> {
    variants.iter().max_by_key(|v| v.bandwidth)
}

pub struct VariantEngine {
    transport: Transport,
    bound: Option<String>,
}

impl VariantEngine {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            bound: None,
        }
    }

    async fn resolve(&self, master_url: &str) -> Result<String, PlayerError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(PLAYLIST_ACCEPT));
        let options = RequestOptions {
            headers,
            ..Default::default()
        };
        let content = match self
            .transport
            .request(Method::GET, master_url, options)
            .await
            .map_err(|e| PlayerError::Backend(format!("playlist fetch failed: {}", e)))?
        {
            Body::Text(text) => text,
            Body::Json(_) => {
                return Err(PlayerError::Backend(
                    "playlist endpoint returned JSON".to_string(),
                ))
            }
        };

        if !content.trim_start().starts_with("#EXTM3U") {
            return Err(PlayerError::Backend(format!(
                "{} is not an m3u8 playlist",
                master_url
            )));
        }

        let variants = parse_variants(&content);
        let Some(best) = select_variant(&variants) else {
            debug!("playlist: {} is a media playlist", master_url);
            return Ok(master_url.to_string());
        };

        let base = Url::parse(master_url)
            .map_err(|_| PlayerError::Backend(format!("invalid playlist url '{}'", master_url)))?;
        let resolved = base
            .join(&best.uri)
            .map_err(|_| PlayerError::Backend(format!("invalid variant uri '{}'", best.uri)))?;
        info!(
            "playlist: selected {} bps variant of {} ({})",
            best.bandwidth,
            variants.len(),
            best.resolution.as_deref().unwrap_or("unknown resolution")
        );
        Ok(resolved.to_string())
    }
}

#[async_trait::async_trait]
impl StreamEngine for VariantEngine {
    async fn attach(
        &mut self,
        url: &str,
        element: &mut dyn MediaElement,
    ) -> Result<(), PlayerError> {
        let target = self.resolve(url).await?;
        element.set_source(Some(&target)).await?;
        self.bound = Some(target);
        Ok(())
    }

    async fn destroy(&mut self, element: &mut dyn MediaElement) {
        if self.bound.take().is_some() {
            if let Err(e) = element.set_source(None).await {
                debug!("playlist: detach failed: {}", e);
            }
        }
    }
}

pub struct VariantEngineFactory {
    transport: Transport,
    enabled: bool,
}

impl VariantEngineFactory {
    pub fn new(transport: Transport, enabled: bool) -> Self {
        Self { transport, enabled }
    }
}

impl EngineFactory for VariantEngineFactory {
    fn is_supported(&self) -> bool {
        self.enabled
    }

    fn create(&self) -> Box<dyn StreamEngine> {
        Box::new(VariantEngine::new(self.transport.clone()))
    }
}
