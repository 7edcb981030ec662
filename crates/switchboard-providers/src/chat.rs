// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the chat aggregation API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::HeaderMap;
use serde_json::Value;
use switchboard_config::model::ChatConfig;
use switchboard_core::conversation::is_platform_prefixed;
use switchboard_core::{ChatAggregator, ListQuery, MessageQuery, SwitchboardError};

use crate::http;

const UPSTREAM: &str = "chat aggregator";

/// Stateless client for page conversations and messages.
#[derive(Debug, Clone)]
pub struct ChatAggregatorClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ChatAggregatorClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SwitchboardError> {
        Ok(Self {
            client: http::build_client(timeout, HeaderMap::new())?,
            base_url: http::parse_base(base_url)?,
        })
    }

    pub fn from_config(config: &ChatConfig) -> Result<Self, SwitchboardError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    fn conversations_url(&self, scope: &str, tail: &[&str]) -> Result<Url, SwitchboardError> {
        let mut segments = vec!["pages", scope, "conversations"];
        segments.extend_from_slice(tail);
        http::endpoint(&self.base_url, &segments)
    }

    async fn get(&self, url: Url) -> Result<Value, SwitchboardError> {
        let response = http::send(self.client.get(url), UPSTREAM).await?;
        http::read_json(response, UPSTREAM).await
    }
}

/// Path segment for a conversation's messages.
fn message_path(scope: &str, item_key: &str) -> String {
    if is_platform_prefixed(item_key) {
        item_key.to_string()
    } else {
        format!("{scope}_{item_key}")
    }
}

fn conversations_of(body: Value) -> Vec<Value> {
    match body {
        Value::Object(mut map) => match map.remove("conversations") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn messages_of(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("messages") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[async_trait]
impl ChatAggregator for ChatAggregatorClient {
    async fn list_conversations(&self, query: &ListQuery) -> Result<Vec<Value>, SwitchboardError> {
        let mut url = self.conversations_url(&query.scope, &[])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("unread_first", "true")
                .append_pair("mode", "NONE")
                .append_pair("tags", "\"ALL\"")
                .append_pair("except_tags[]", "")
                .append_pair("access_token", &query.token)
                .append_pair("cursor_mode", "true")
                .append_pair("from_platform", "web");
            if query.resume_count > 0 {
                pairs.append_pair("current_count", &query.resume_count.to_string());
            }
        }
        Ok(conversations_of(self.get(url).await?))
    }

    async fn search_conversations(
        &self,
        scope: &str,
        token: &str,
        text: &str,
    ) -> Result<Vec<Value>, SwitchboardError> {
        let mut url = self.conversations_url(scope, &["search"])?;
        url.query_pairs_mut()
            .append_pair("q", text)
            .append_pair("access_token", token)
            .append_pair("cursor_mode", "true");
        Ok(conversations_of(self.get(url).await?))
    }

    async fn fetch_messages(&self, query: &MessageQuery) -> Result<Vec<Value>, SwitchboardError> {
        let path = message_path(&query.scope, &query.item_key);
        let mut url = self.conversations_url(&query.scope, &[path.as_str(), "messages"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("access_token", &query.token)
                .append_pair("is_new_api", "true")
                .append_pair("customer_id", query.owner_key.as_deref().unwrap_or_default());
            if query.count > 0 {
                pairs.append_pair("current_count", &query.count.to_string());
            }
        }
        Ok(messages_of(self.get(url).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ChatAggregatorClient {
        ChatAggregatorClient::new(&server.uri(), Duration::from_secs(5)).expect("client")
    }

    fn list_query(resume_count: u64) -> ListQuery {
        ListQuery {
            scope: "pageA".into(),
            token: "tok".into(),
            resume_count,
        }
    }

    #[tokio::test]
    async fn list_sends_fixed_filters_and_returns_conversations() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pages/pageA/conversations"))
            .and(query_param("access_token", "tok"))
            .and(query_param("unread_first", "true"))
            .and(query_param("tags", "\"ALL\""))
            .and(query_param("cursor_mode", "true"))
            .and(query_param_is_missing("current_count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "conversations": [{"id": "pageA_1"}, {"id": "pageA_2"}]
            })))
            .mount(&server)
            .await;

        let items = client(&server)
            .list_conversations(&list_query(0))
            .await
            .expect("list");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["id"], "pageA_1");
    }

    #[tokio::test]
    async fn list_passes_resume_count_when_positive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pages/pageA/conversations"))
            .and(query_param("current_count", "40"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"conversations": []})))
            .expect(1)
            .mount(&server)
            .await;

        let items = client(&server)
            .list_conversations(&list_query(40))
            .await
            .expect("list");
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn missing_conversations_field_reads_as_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&server)
            .await;

        let items = client(&server)
            .list_conversations(&list_query(0))
            .await
            .expect("list");
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn search_hits_search_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pages/pageA/conversations/search"))
            .and(query_param("q", "ann lee"))
            .and(query_param("access_token", "tok"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"conversations": [{"id": "pageA_9"}]})),
            )
            .mount(&server)
            .await;

        let items = client(&server)
            .search_conversations("pageA", "tok", "ann lee")
            .await
            .expect("search");
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn messages_use_composite_path_and_accept_bare_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pages/pageA/conversations/pageA_123/messages"))
            .and(query_param("is_new_api", "true"))
            .and(query_param("customer_id", "cust-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "m1"}])))
            .mount(&server)
            .await;

        let items = client(&server)
            .fetch_messages(&MessageQuery {
                scope: "pageA".into(),
                token: "tok".into(),
                item_key: "123".into(),
                owner_key: Some("cust-1".into()),
                count: 0,
            })
            .await
            .expect("messages");
        assert_eq!(items, vec![json!({"id": "m1"})]);
    }

    #[tokio::test]
    async fn platform_messages_keep_their_id_and_read_messages_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pages/pageA/conversations/ttm_abc/messages"))
            .and(query_param("current_count", "25"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"messages": [{"id": "m1"}, {"id": "m2"}]})),
            )
            .mount(&server)
            .await;

        let items = client(&server)
            .fetch_messages(&MessageQuery {
                scope: "pageA".into(),
                token: "tok".into(),
                item_key: "ttm_abc".into(),
                owner_key: None,
                count: 25,
            })
            .await
            .expect("messages");
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn non_success_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
            .mount(&server)
            .await;

        let err = client(&server)
            .list_conversations(&list_query(0))
            .await
            .unwrap_err();
        match err {
            SwitchboardError::Provider { message, status, .. } => {
                assert_eq!(status, Some(401));
                assert!(message.contains("token expired"), "got: {message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
