use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{error, warn};

use crate::receipt::DeliveryStatus;

use super::{Provider, ShortMessage};

/// Reference `Provider`: authenticates every `system_id`/`password` pair
/// unless an explicit account list is configured, and appends each
/// delivered message to a flat append-only log file. Grounded on
/// `examples/original_source/smpp/external/logging.py`.
pub struct LoggingProvider {
    file_path: PathBuf,
    accounts: Vec<(String, String)>,
}

impl LoggingProvider {
    pub fn new(file_path: impl Into<PathBuf>, accounts: Vec<(String, String)>) -> Self {
        Self {
            file_path: file_path.into(),
            accounts,
        }
    }
}

#[async_trait]
impl Provider for LoggingProvider {
    async fn authenticate(&self, system_id: &str, password: &str) -> bool {
        if self.accounts.is_empty() {
            return true;
        }
        self.accounts
            .iter()
            .any(|(id, pw)| id == system_id && pw == password)
    }

    async fn deliver(&self, sm: &ShortMessage) -> DeliveryStatus {
        if let Some(parent) = self.file_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                error!(error = %e, path = %self.file_path.display(), "failed to create log directory");
                return DeliveryStatus::GenericError;
            }
        }

        let line = format!(
            "system_id={} source={}/{} dest={}/{} body={:?}\n",
            sm.system_id,
            sm.source_addr_ton,
            sm.source_addr,
            sm.dest_addr_ton,
            sm.destination_addr,
            String::from_utf8_lossy(&sm.body),
        );

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .await;

        let mut file = match file {
            Ok(f) => f,
            Err(e) => {
                error!(error = %e, path = %self.file_path.display(), "failed to open delivery log");
                return DeliveryStatus::GenericError;
            }
        };

        if let Err(e) = file.write_all(line.as_bytes()).await {
            warn!(error = %e, "failed to append delivery log entry");
            return DeliveryStatus::GenericError;
        }

        DeliveryStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn authenticates_everyone_with_no_configured_accounts() {
        let provider = LoggingProvider::new("/tmp/smpp_gateway_test_unused.log", vec![]);
        assert!(provider.authenticate("anybody", "anything").await);
    }

    #[tokio::test]
    async fn restricts_to_configured_accounts_when_present() {
        let provider = LoggingProvider::new(
            "/tmp/smpp_gateway_test_unused.log",
            vec![("mtc".to_string(), "pwd".to_string())],
        );
        assert!(provider.authenticate("mtc", "pwd").await);
        assert!(!provider.authenticate("mtc", "wrong").await);
        assert!(!provider.authenticate("someone_else", "pwd").await);
    }

    #[tokio::test]
    async fn deliver_appends_to_file_and_reports_ok() {
        let path = std::env::temp_dir().join(format!(
            "smpp_gateway_test_{}.log",
            generate_test_suffix()
        ));
        let provider = LoggingProvider::new(&path, vec![]);
        let sm = ShortMessage {
            system_id: "mtc".to_string(),
            password: "pwd".to_string(),
            source_addr_ton: 1,
            source_addr_npi: 1,
            source_addr: "12345".to_string(),
            dest_addr_ton: 1,
            dest_addr_npi: 1,
            destination_addr: "67890".to_string(),
            body: b"Hello world!".to_vec(),
        };

        let status = provider.deliver(&sm).await;
        assert_eq!(status, DeliveryStatus::Ok);

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("Hello world!"));

        let _ = tokio::fs::remove_file(&path).await;
    }

    fn generate_test_suffix() -> String {
        format!("{:?}", std::thread::current().id()).replace(['(', ')'], "_")
    }
}
