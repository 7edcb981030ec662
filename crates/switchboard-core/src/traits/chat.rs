// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat aggregation API surface polled by watches.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SwitchboardError;
use crate::types::{ListQuery, MessageQuery};

/// Read-only access to conversations and messages on the chat aggregator.
///
/// Items are relayed to clients untouched, so they stay as raw JSON.
#[async_trait]
pub trait ChatAggregator: Send + Sync + 'static {
    /// Lists conversation summaries for a page.
    async fn list_conversations(&self, query: &ListQuery) -> Result<Vec<Value>, SwitchboardError>;

    /// Searches conversations on a page by free text.
    async fn search_conversations(
        &self,
        scope: &str,
        token: &str,
        text: &str,
    ) -> Result<Vec<Value>, SwitchboardError>;

    /// Fetches the message window of one conversation.
    async fn fetch_messages(&self, query: &MessageQuery) -> Result<Vec<Value>, SwitchboardError>;
}
