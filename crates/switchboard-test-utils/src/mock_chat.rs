// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat aggregator with scripted responses.
//!
//! Each endpoint has its own FIFO queue. When a queue runs dry the mock
//! answers with an empty list, so long-running watches keep ticking.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use switchboard_core::{ChatAggregator, ListQuery, MessageQuery, SwitchboardError};
use tokio::sync::Mutex;

type Scripted = Result<Vec<Value>, String>;

#[derive(Debug, Default)]
pub struct MockChat {
    lists: Mutex<VecDeque<Scripted>>,
    searches: Mutex<VecDeque<Scripted>>,
    messages: Mutex<VecDeque<Scripted>>,
    list_queries: Mutex<Vec<ListQuery>>,
    message_queries: Mutex<Vec<MessageQuery>>,
    search_terms: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl MockChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_list(&self, items: Vec<Value>) {
        self.lists.lock().await.push_back(Ok(items));
    }

    pub async fn push_list_error(&self, message: &str) {
        self.lists.lock().await.push_back(Err(message.to_string()));
    }

    pub async fn push_search(&self, items: Vec<Value>) {
        self.searches.lock().await.push_back(Ok(items));
    }

    pub async fn push_messages(&self, items: Vec<Value>) {
        self.messages.lock().await.push_back(Ok(items));
    }

    pub async fn push_messages_error(&self, message: &str) {
        self.messages.lock().await.push_back(Err(message.to_string()));
    }

    /// Makes every request wait `delay` before answering.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.lock().await = Some(delay);
    }

    pub async fn list_queries(&self) -> Vec<ListQuery> {
        self.list_queries.lock().await.clone()
    }

    pub async fn message_queries(&self) -> Vec<MessageQuery> {
        self.message_queries.lock().await.clone()
    }

    pub async fn search_terms(&self) -> Vec<String> {
        self.search_terms.lock().await.clone()
    }

    /// Total requests across all endpoints.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer(&self, queue: &Mutex<VecDeque<Scripted>>) -> Result<Vec<Value>, SwitchboardError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = queue.lock().await.pop_front();
        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match next {
            Some(Ok(items)) => Ok(items),
            Some(Err(message)) => Err(SwitchboardError::provider(message)),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatAggregator for MockChat {
    async fn list_conversations(&self, query: &ListQuery) -> Result<Vec<Value>, SwitchboardError> {
        self.list_queries.lock().await.push(query.clone());
        self.answer(&self.lists).await
    }

    async fn search_conversations(
        &self,
        _scope: &str,
        _token: &str,
        text: &str,
    ) -> Result<Vec<Value>, SwitchboardError> {
        self.search_terms.lock().await.push(text.to_string());
        self.answer(&self.searches).await
    }

    async fn fetch_messages(&self, query: &MessageQuery) -> Result<Vec<Value>, SwitchboardError> {
        self.message_queries.lock().await.push(query.clone());
        self.answer(&self.messages).await
    }
}
