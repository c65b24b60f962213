//! Player adapter: one lifecycle over two playback paths.
//!
//! A [`MediaElement`] is the long-lived output (an mpv window in the binary).
//! A [`StreamEngine`] is an attachable, per-stream helper that resolves the
//! adaptive playlist and binds the result to the element.  The library path
//! (engine) is preferred when its factory reports support; otherwise the
//! playlist goes straight to the element if it can play HLS natively.
//!
//! At most one engine is attached at a time: `load` destroys the previous
//! engine before creating the next.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::error::PlayerError;

#[async_trait]
pub trait MediaElement: Send {
    fn can_play_hls(&self) -> bool;
    /// Bind `url`, or unbind with `None`.
    async fn set_source(&mut self, url: Option<&str>) -> Result<(), PlayerError>;
    async fn play(&mut self) -> Result<(), PlayerError>;
    async fn pause(&mut self) -> Result<(), PlayerError>;
    async fn seek_start(&mut self) -> Result<(), PlayerError>;
    async fn apply_preferences(&mut self, _volume: u8, _looping: bool) -> Result<(), PlayerError> {
        Ok(())
    }
}

#[async_trait]
pub trait StreamEngine: Send {
    /// Resolve `url` and bind the result to `element`.
    async fn attach(&mut self, url: &str, element: &mut dyn MediaElement)
        -> Result<(), PlayerError>;
    /// Release everything the engine holds, including its element binding.
    async fn destroy(&mut self, element: &mut dyn MediaElement);
}

pub trait EngineFactory: Send + Sync {
    fn is_supported(&self) -> bool;
    fn create(&self) -> Box<dyn StreamEngine>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPath {
    Library,
    Native,
}

#[derive(Debug, Clone)]
pub struct PlayerOptions {
    /// Host serving `/hls/{stream_id}/playlist.m3u8`.
    pub hls_base_url: String,
    pub autoplay: bool,
    pub volume: u8,
    pub looping: bool,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            hls_base_url: "http://localhost:8080".to_string(),
            autoplay: true,
            volume: 80,
            looping: false,
        }
    }
}

pub struct PlayerAdapter {
    element: Box<dyn MediaElement>,
    factory: Option<Arc<dyn EngineFactory>>,
    engine: Option<Box<dyn StreamEngine>>,
    options: PlayerOptions,
    stream_id: Option<String>,
    path: Option<PlaybackPath>,
}

impl PlayerAdapter {
    pub fn new(
        element: Box<dyn MediaElement>,
        factory: Option<Arc<dyn EngineFactory>>,
        options: PlayerOptions,
    ) -> Self {
        Self {
            element,
            factory,
            engine: None,
            options,
            stream_id: None,
            path: None,
        }
    }

    pub fn playlist_url(&self, stream_id: &str) -> String {
        format!(
            "{}/hls/{}/playlist.m3u8",
            self.options.hls_base_url.trim_end_matches('/'),
            stream_id
        )
    }

    pub fn stream_id(&self) -> Option<&str> {
        self.stream_id.as_deref()
    }

    pub fn path(&self) -> Option<PlaybackPath> {
        self.path
    }

    /// True iff a supported playback path was engaged.  Failures are logged,
    /// never propagated.
    pub async fn load(&mut self, stream_id: &str) -> bool {
        match self.try_load(stream_id).await {
            Ok(path) => {
                info!("player: loaded {} via {:?} path", stream_id, path);
                true
            }
            Err(e) => {
                error!("player: cannot load {}: {}", stream_id, e);
                false
            }
        }
    }

    pub async fn try_load(&mut self, stream_id: &str) -> Result<PlaybackPath, PlayerError> {
        if stream_id.is_empty() {
            return Err(PlayerError::Backend("stream id is required".to_string()));
        }
        self.release_engine().await;

        let url = self.playlist_url(stream_id);
        debug!("player: loading {}", url);

        let path = match self.factory.as_ref().filter(|f| f.is_supported()) {
            Some(factory) => {
                let mut engine = factory.create();
                if let Err(e) = engine.attach(&url, self.element.as_mut()).await {
                    engine.destroy(self.element.as_mut()).await;
                    return Err(e);
                }
                self.engine = Some(engine);
                PlaybackPath::Library
            }
            None if self.element.can_play_hls() => {
                self.element.set_source(Some(&url)).await?;
                PlaybackPath::Native
            }
            None => return Err(PlayerError::Capability),
        };

        self.stream_id = Some(stream_id.to_string());
        self.path = Some(path);

        if let Err(e) = self
            .element
            .apply_preferences(self.options.volume, self.options.looping)
            .await
        {
            warn!("player: could not apply preferences: {}", e);
        }
        if self.options.autoplay {
            if let Err(e) = self.element.play().await {
                warn!("player: autoplay failed: {}", e);
            }
        }
        Ok(path)
    }

    pub async fn play(&mut self) -> Result<(), PlayerError> {
        self.element.play().await
    }

    pub async fn pause(&mut self) -> Result<(), PlayerError> {
        self.element.pause().await
    }

    /// Pause, rewind, and release the streaming engine.
    pub async fn stop(&mut self) -> Result<(), PlayerError> {
        let paused = self.element.pause().await;
        let rewound = self.element.seek_start().await;
        self.release_engine().await;
        paused.and(rewound)
    }

    /// `stop` plus unbinding the element's source.
    pub async fn destroy(&mut self) -> Result<(), PlayerError> {
        let stopped = self.stop().await;
        let unbound = self.element.set_source(None).await;
        self.stream_id = None;
        self.path = None;
        stopped.and(unbound)
    }

    async fn release_engine(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            debug!("player: destroying attached engine");
            engine.destroy(self.element.as_mut()).await;
        }
    }
}
