//! Confirmed payments log
//!
//! One JSON object per line in `~/.nudge/payments.jsonl`. Appends are
//! serialized through a lock so concurrent confirmations of the same
//! signature record it once.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use nudge_engine::config::nudge_dir;
use nudge_engine::registry::{ConfirmedPayment, PaymentRecorder, RecordOutcome};
use nudge_engine::EngineError;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

const PAYMENTS_FILE: &str = "payments.jsonl";

pub struct JsonlPaymentRecorder {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlPaymentRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        nudge_dir().map(|dir| dir.join(PAYMENTS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every recorded payment; unreadable lines are skipped
    pub async fn load_all(&self) -> Result<Vec<ConfirmedPayment>, EngineError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_error(&self.path, e)),
        };

        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(payment) => Some(payment),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "skipping malformed payment line");
                    None
                }
            })
            .collect())
    }

    async fn contains(&self, signature: &str) -> Result<bool, EngineError> {
        Ok(self
            .load_all()
            .await?
            .iter()
            .any(|payment| payment.signature == signature))
    }

    async fn append(&self, payment: &ConfirmedPayment) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(parent, e))?;
        }

        let mut line = serde_json::to_string(payment)
            .map_err(|e| EngineError::InvalidInput(format!("unserializable payment: {e}")))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| storage_error(&self.path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| storage_error(&self.path, e))?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| storage_error(&self.path, e))?;
        }

        Ok(())
    }
}

fn storage_error(path: &Path, err: std::io::Error) -> EngineError {
    EngineError::Configuration(format!("payment log {}: {err}", path.display()))
}

#[async_trait]
impl PaymentRecorder for JsonlPaymentRecorder {
    async fn is_recorded(&self, signature: &str) -> Result<bool, EngineError> {
        self.contains(signature).await
    }

    async fn record(&self, payment: &ConfirmedPayment) -> Result<RecordOutcome, EngineError> {
        let _guard = self.write_lock.lock().await;
        if self.contains(&payment.signature).await? {
            return Ok(RecordOutcome::Duplicate);
        }
        self.append(payment).await?;
        Ok(RecordOutcome::Recorded)
    }
}
