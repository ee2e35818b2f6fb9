//! The context adapter contract.
//!
//! Every prompt section (timestamp, memories, history, the user turn) comes
//! from a [`ContextAdapter`]. The pipeline treats them uniformly: the only
//! thing it asks an adapter is whether it wants the user's request.

use async_trait::async_trait;
use juliet_core::error::RetrievalError;
use juliet_core::message::PromptMessage;

#[async_trait]
pub trait ContextAdapter: Send + Sync {
    /// Whether [`build_messages`](Self::build_messages) should receive the
    /// user's request.
    fn requires_user_request(&self) -> bool {
        false
    }

    /// Produce zero or more prompt messages.
    ///
    /// `user_request` is `Some` exactly when
    /// [`requires_user_request`](Self::requires_user_request) is true.
    async fn build_messages(&self, user_request: Option<&str>) -> Result<Vec<PromptMessage>, RetrievalError>;
}
