//! Driving Ports (API - Inbound)

use crate::domain::{BumpRequest, BumpResult};
use crate::error::BumperResult;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Primary fee bumper API.
#[async_trait]
pub trait FeeBumpApi: Send + Sync {
    /// Builds, validates and broadcasts a sweep for `request`.
    ///
    /// An error means nothing was stored. On success the receiver yields
    /// `Published` (or `Failed` if the broadcast itself failed), then any
    /// `Replaced` results, then exactly one `Confirmed` or `Failed`, after
    /// which it closes. The first result is buffered before this returns.
    async fn broadcast(&self, request: BumpRequest) -> BumperResult<mpsc::Receiver<BumpResult>>;
}
