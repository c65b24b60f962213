//! Typed wrappers for the media server's endpoints.
//!
//! [`MediaApi`] is the production implementation of the two seams the core
//! depends on: [`CatalogSource`] for the catalog store and [`StreamApi`] for
//! the session orchestrator.  Tests substitute in-memory fakes.

use async_trait::async_trait;
use media_proto::model::{
    CreateStreamAck, MediaList, MediaRecord, ScanResult, ServerStatus, SessionTicket,
    StopStreamAck, StreamList, StreamStatus,
};

use crate::error::TransportError;
use crate::transport::Transport;

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn media_list(&self) -> Result<Vec<MediaRecord>, TransportError>;
    async fn media_details(&self, id: &str) -> Result<MediaRecord, TransportError>;
    async fn rescan(&self) -> Result<ScanResult, TransportError>;
}

#[async_trait]
pub trait StreamApi: Send + Sync {
    async fn create_stream(&self, media_id: &str) -> Result<CreateStreamAck, TransportError>;
    async fn stream_status(&self, stream_id: &str) -> Result<StreamStatus, TransportError>;
    async fn stop_stream(&self, stream_id: &str) -> Result<StopStreamAck, TransportError>;
}

#[derive(Debug, Clone)]
pub struct MediaApi {
    transport: Transport,
}

impl MediaApi {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub async fn server_status(&self) -> Result<ServerStatus, TransportError> {
        self.transport.get_json("/api/status", &[]).await
    }

    /// Legacy direct session; the HLS path goes through [`StreamApi`].
    pub async fn create_session(
        &self,
        media_id: &str,
        filename: &str,
    ) -> Result<SessionTicket, TransportError> {
        let mut query = Vec::new();
        if !media_id.is_empty() {
            query.push(("media_id", media_id));
        }
        if !filename.is_empty() {
            query.push(("filename", filename));
        }
        self.transport
            .get_json("/api/session/create", &query)
            .await
    }

    pub async fn list_streams(&self) -> Result<Vec<String>, TransportError> {
        let list: StreamList = self.transport.get_json("/api/hls/list", &[]).await?;
        Ok(list.streams)
    }
}

#[async_trait]
impl CatalogSource for MediaApi {
    async fn media_list(&self) -> Result<Vec<MediaRecord>, TransportError> {
        let list: MediaList = self.transport.get_json("/api/media/list", &[]).await?;
        Ok(list.media_files)
    }

    async fn media_details(&self, id: &str) -> Result<MediaRecord, TransportError> {
        let url = self.transport.endpoint(&["api", "media", id])?;
        self.transport.get_json(url.as_str(), &[]).await
    }

    async fn rescan(&self) -> Result<ScanResult, TransportError> {
        self.transport.get_json("/api/media/scan", &[]).await
    }
}

#[async_trait]
impl StreamApi for MediaApi {
    async fn create_stream(&self, media_id: &str) -> Result<CreateStreamAck, TransportError> {
        self.transport
            .get_json("/api/hls/create", &[("media_id", media_id)])
            .await
    }

    async fn stream_status(&self, stream_id: &str) -> Result<StreamStatus, TransportError> {
        let url = self.transport.endpoint(&["api", "hls", "status", stream_id])?;
        self.transport.get_json(url.as_str(), &[]).await
    }

    async fn stop_stream(&self, stream_id: &str) -> Result<StopStreamAck, TransportError> {
        let url = self.transport.endpoint(&["api", "hls", "stop", stream_id])?;
        self.transport.get_json(url.as_str(), &[]).await
    }
}
