pub mod cdp;
pub mod linkedin;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;

use crate::error::Result;

/// Authenticated actions against the social network.
///
/// Targets are identified by their profile URL.
#[async_trait]
pub trait AutomationClient: Send + Sync {
    /// Sign in. Fails with `AppError::Authentication` if the signed-in landing
    /// page is not reached in time.
    async fn login(&self) -> Result<()>;

    /// Profile URLs matching `query`, in page order, at most `limit`.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>>;

    /// Send a connection request with a note. `Ok(false)` when the connect
    /// affordance is unavailable (e.g. already connected).
    async fn connect(&self, target: &str, note: &str) -> Result<bool>;

    /// Send a direct message. `Ok(false)` when the message flow did not complete.
    async fn send_message(&self, target: &str, text: &str) -> Result<bool>;

    /// Release the underlying session.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
