//! Client for a remote media server: catalog cache, HLS session orchestration
//! and player hand-off.

pub mod api;
pub mod catalog;
pub mod error;
pub mod mpv;
pub mod player;
pub mod playlist;
pub mod session;
pub mod transport;

pub use api::{CatalogSource, MediaApi, StreamApi};
pub use catalog::{CatalogSnapshot, CatalogStats, CatalogStore};
pub use error::{CatalogError, PlayerError, SessionError, TransportError};
pub use player::{PlayerAdapter, PlayerOptions};
pub use session::{PlaybackSession, SessionHandle, SessionOrchestrator, SessionState, Severity};
pub use transport::Transport;
