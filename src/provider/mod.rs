//! The downstream delivery collaborator. `Provider` is the one seam the
//! dispatcher never implements itself: authentication and actual message
//! delivery are somebody else's problem, reached through this trait.

mod logging;

pub use logging::LoggingProvider;

use async_trait::async_trait;

use crate::receipt::DeliveryStatus;

/// A submitted short message, built from `submit_sm` fields plus the
/// credentials the session bound with.
#[derive(Debug, Clone)]
pub struct ShortMessage {
    pub system_id: String,
    pub password: String,
    pub source_addr_ton: u8,
    pub source_addr_npi: u8,
    pub source_addr: String,
    pub dest_addr_ton: u8,
    pub dest_addr_npi: u8,
    pub destination_addr: String,
    pub body: Vec<u8>,
}

/// Authentication and delivery, as far as the engine is concerned. Both
/// methods may suspend; neither is allowed to take down the caller:
/// a panic inside an implementation's `deliver`/`authenticate` future is
/// caught by the caller (the connection handler's bind path, the
/// dispatcher's submit path) and mapped to a failure status, never
/// propagated.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn authenticate(&self, system_id: &str, password: &str) -> bool;
    async fn deliver(&self, sm: &ShortMessage) -> DeliveryStatus;
}
