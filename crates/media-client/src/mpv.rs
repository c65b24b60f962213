//! mpv as a media element, driven over its JSON IPC socket.
//!
//! ```text
//!   MpvDriver::spawn_and_connect()
//!         │
//!         ├── writer_task   ← receives PendingRequest via mpsc, serialises → socket
//!         └── reader_task   ← reads JSON lines from socket
//!                                ├── response (has request_id) → matched oneshot::Sender
//!                                └── event                     → event_tx channel
//! ```
//!
//! mpv plays HLS playlists itself, so the element reports native HLS
//! capability whenever an mpv binary is available.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

use crate::error::PlayerError;
use crate::player::MediaElement;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String,
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// An unsolicited mpv event (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// e.g. "end-file", "start-file", "file-loaded".
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }
}

/// Cloneable handle to the writer task.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    pub async fn load(&self, url: &str) -> anyhow::Result<()> {
        debug!("mpv: loadfile {}", url);
        self.send(json!(["loadfile", url, "replace"])).await?;
        Ok(())
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.send(json!(["stop"])).await?;
        Ok(())
    }

    pub async fn set_pause(&self, paused: bool) -> anyhow::Result<()> {
        self.send(json!(["set_property", "pause", paused])).await?;
        Ok(())
    }

    pub async fn seek_to(&self, secs: f64) -> anyhow::Result<()> {
        self.send(json!(["seek", secs, "absolute"])).await?;
        Ok(())
    }

    pub async fn set_volume(&self, percent: u8) -> anyhow::Result<()> {
        let vol = f64::from(percent.min(100));
        self.send(json!(["set_property", "volume", vol])).await?;
        Ok(())
    }

    pub async fn set_loop(&self, looping: bool) -> anyhow::Result<()> {
        let value = if looping { "inf" } else { "no" };
        self.send(json!(["set_property", "loop-file", value])).await?;
        Ok(())
    }
}

/// Owns the mpv child process.
pub struct MpvDriver {
    socket_name: String,
    binary: Option<PathBuf>,
    process: Option<tokio::process::Child>,
}

impl MpvDriver {
    pub fn new(binary_override: Option<&PathBuf>) -> Self {
        Self {
            socket_name: media_proto::platform::mpv_socket_name(),
            binary: media_proto::platform::find_mpv_binary(binary_override),
            process: None,
        }
    }

    pub fn binary(&self) -> Option<&PathBuf> {
        self.binary.as_ref()
    }

    pub fn process_alive(&mut self) -> bool {
        match self.process.as_mut().map(|c| c.try_wait()) {
            Some(Ok(None)) => true,
            Some(Ok(Some(status))) => {
                warn!("mpv process exited: {}", status);
                false
            }
            Some(Err(e)) => {
                warn!("mpv process_alive check failed: {}", e);
                false
            }
            None => false,
        }
    }

    pub async fn kill(&mut self) {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
    }

    fn spawn_process(&mut self) -> anyhow::Result<()> {
        let binary = self
            .binary
            .clone()
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;
        let ipc_arg = media_proto::platform::mpv_socket_arg(&self.socket_name);

        info!("mpv: spawning {}", binary.display());
        let child = tokio::process::Command::new(&binary)
            .arg("--idle=yes")
            .arg("--keep-open=yes")
            .arg("--force-window=yes")
            .arg("--quiet")
            .arg(&ipc_arg)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        info!("mpv: spawned process with pid {:?}", child.id());
        self.process = Some(child);
        Ok(())
    }

    #[cfg(unix)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        let socket_path = PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;
        self.spawn_process()?;

        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(BufReader::new(read_half), write_half, event_tx))
    }

    #[cfg(windows)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;
        self.spawn_process()?;

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(start_io_tasks(BufReader::new(read_half), write_half, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }
}

fn start_io_tasks<R, W>(
    reader: BufReader<R>,
    writer: W,
    event_tx: mpsc::Sender<MpvEvent>,
) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

    tokio::spawn(writer_task(writer, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(reader, pending, event_tx));

    MpvHandle { tx: cmd_tx }
}

async fn fail_pending(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("{}", reason)));
    }
}

async fn reader_task<R>(
    mut reader: BufReader<R>,
    pending: PendingMap,
    event_tx: mpsc::Sender<MpvEvent>,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_pending(&pending, "mpv IPC connection closed").await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    let mut map = pending.lock().await;
                    if let Some(tx) = map.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            Ok(val)
                        } else {
                            let err = val["error"].as_str().unwrap_or("unknown error").to_string();
                            debug!("mpv reader: response req={} err={}", req_id, err);
                            Err(anyhow::anyhow!("mpv error: {}", err))
                        };
                        let _ = tx.send(result);
                    }
                } else {
                    let _ = event_tx.send(MpvEvent { raw: val }).await;
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_pending(&pending, "mpv IPC read error").await;
                break;
            }
        }
    }
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register reply channel before writing so reader can match it
        pending.lock().await.insert(req.req_id, req.reply);
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

/// The media element: one long-lived mpv process, spawned on first use.
pub struct MpvElement {
    driver: MpvDriver,
    handle: Option<MpvHandle>,
    event_task: Option<tokio::task::JoinHandle<()>>,
}

impl MpvElement {
    pub fn new(binary_override: Option<&PathBuf>) -> Self {
        Self {
            driver: MpvDriver::new(binary_override),
            handle: None,
            event_task: None,
        }
    }

    async fn connected(&mut self) -> Result<MpvHandle, PlayerError> {
        if let Some(handle) = &self.handle {
            if self.driver.process_alive() {
                return Ok(handle.clone());
            }
            warn!("mpv: process died, respawning");
            self.handle = None;
        }

        let (event_tx, mut event_rx) = mpsc::channel::<MpvEvent>(64);
        let handle = self.driver.spawn_and_connect(event_tx).await?;
        if let Some(old) = self.event_task.take() {
            old.abort();
        }
        self.event_task = Some(tokio::spawn(async move {
            while let Some(evt) = event_rx.recv().await {
                if let Some(name) = evt.event_name() {
                    debug!("mpv event: {}", name);
                }
            }
        }));
        self.handle = Some(handle.clone());
        Ok(handle)
    }

    /// Kill the mpv process.
    pub async fn shutdown(&mut self) {
        self.handle = None;
        if let Some(task) = self.event_task.take() {
            task.abort();
        }
        self.driver.kill().await;
    }
}

#[async_trait]
impl MediaElement for MpvElement {
    fn can_play_hls(&self) -> bool {
        self.driver.binary().is_some()
    }

    async fn set_source(&mut self, url: Option<&str>) -> Result<(), PlayerError> {
        match url {
            Some(url) => Ok(self.connected().await?.load(url).await?),
            // Nothing to unbind if mpv never started.
            None => match &self.handle {
                Some(handle) => Ok(handle.stop().await?),
                None => Ok(()),
            },
        }
    }

    async fn play(&mut self) -> Result<(), PlayerError> {
        Ok(self.connected().await?.set_pause(false).await?)
    }

    async fn pause(&mut self) -> Result<(), PlayerError> {
        match &self.handle {
            Some(handle) => Ok(handle.set_pause(true).await?),
            None => Ok(()),
        }
    }

    async fn seek_start(&mut self) -> Result<(), PlayerError> {
        match &self.handle {
            Some(handle) => Ok(handle.seek_to(0.0).await?),
            None => Ok(()),
        }
    }

    async fn apply_preferences(&mut self, volume: u8, looping: bool) -> Result<(), PlayerError> {
        let handle = self.connected().await?;
        handle.set_volume(volume).await?;
        handle.set_loop(looping).await?;
        Ok(())
    }
}
