//! Filesystem queue: one directory per topic, lock-file-guarded poll loop
//! (spec §4.3 "Local filesystem implementation").

use super::{ConsumeHandle, MessageBus, MessageHandler, QueueError, Result};
use async_trait::async_trait;
use fs2::FileExt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

pub struct LocalFileQueue {
    root: PathBuf,
    poll_interval: Duration,
    stop_senders: Mutex<Vec<watch::Sender<bool>>>,
}

impl LocalFileQueue {
    pub fn new(root: impl AsRef<Path>, poll_interval: Duration) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            poll_interval,
            stop_senders: Mutex::new(Vec::new()),
        })
    }

    fn topic_dir(&self, topic: &str) -> PathBuf {
        self.root.join(topic)
    }
}

#[async_trait]
impl MessageBus for LocalFileQueue {
    async fn publish(&self, topic: &str, message: &[u8]) -> Result<()> {
        let dir = self.topic_dir(topic);
        tokio::fs::create_dir_all(&dir).await?;
        let timestamp = chrono::Utc::now().format("%Y%m%d%H%M%S%3f");
        let filename = format!("{timestamp}-{}.json", uuid::Uuid::new_v4());
        let path = dir.join(filename);
        tokio::fs::write(&path, message).await?;
        tracing::info!(topic, bytes = message.len(), "published message to local queue");
        Ok(())
    }

    async fn start_consume(&self, topic: &str, handler: Arc<dyn MessageHandler>) -> Result<ConsumeHandle> {
        let dir = self.topic_dir(topic);
        std::fs::create_dir_all(&dir)?;
        let poll_interval = self.poll_interval;
        let (stop_tx, mut stop_rx) = watch::channel(false);
        self.stop_senders.lock().await.push(stop_tx.clone());

        let topic_owned = topic.to_string();
        let join = tokio::spawn(async move {
            loop {
                if *stop_rx.borrow() {
                    break;
                }
                if let Err(e) = poll_once(&dir, handler.as_ref()).await {
                    tracing::error!(topic = %topic_owned, error = %e, "local queue poll failed");
                }
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = stop_rx.changed() => {}
                }
                if *stop_rx.borrow() {
                    break;
                }
            }
        });

        Ok(ConsumeHandle::new(stop_tx, join))
    }

    async fn stop_all(&self) {
        let senders = self.stop_senders.lock().await;
        for tx in senders.iter() {
            let _ = tx.send(true);
        }
    }
}

/// One scan of the topic directory: files are sorted lexicographically
/// (the timestamp prefix yields FIFO), each opened with an exclusive lock
/// to detect concurrent consumers. Lock contention means "in progress
/// elsewhere" and the file is skipped, not treated as an error.
async fn poll_once(dir: &Path, handler: &dyn MessageHandler) -> Result<()> {
    let mut entries: Vec<PathBuf> = match tokio::fs::read_dir(dir).await {
        Ok(mut read_dir) => {
            let mut paths = Vec::new();
            while let Some(entry) = read_dir.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("json") {
                    paths.push(path);
                }
            }
            paths
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(QueueError::Io(e)),
    };
    entries.sort();

    for path in entries {
        match try_claim_and_handle(&path, handler).await {
            Ok(Claim::Handled) | Ok(Claim::SkippedContention) => {}
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to process queue message");
            }
        }
    }
    Ok(())
}

enum Claim {
    Handled,
    SkippedContention,
}

async fn try_claim_and_handle(path: &Path, handler: &dyn MessageHandler) -> Result<Claim> {
    let owned_path = path.to_path_buf();
    let lock_path = owned_path.clone();
    let payload = tokio::task::spawn_blocking(move || -> std::io::Result<Option<Vec<u8>>> {
        let file = OpenOptions::new().read(true).write(true).open(&lock_path)?;
        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == std::io::ErrorKind::WouldBlock {
                return Ok(None);
            }
            return Err(e);
        }
        let bytes = std::fs::read(&lock_path)?;
        FileExt::unlock(&file)?;
        Ok(Some(bytes))
    })
    .await
    .map_err(|e| QueueError::Backend(e.to_string()))??;

    let Some(bytes) = payload else {
        return Ok(Claim::SkippedContention);
    };

    match handler.handle(bytes).await {
        Ok(()) => {
            tokio::fs::remove_file(&owned_path).await.ok();
            Ok(Claim::Handled)
        }
        Err(e) => {
            // Handler panics/errors leave the file in place; it is
            // re-processed on the next scan (spec §4.3).
            tracing::warn!(error = %e, "queue handler failed, message left for redelivery");
            Ok(Claim::Handled)
        }
    }
}
