//! The chat engine: one user message in, one assistant reply out.

use crate::context::ContextStore;
use confab_core::message::{Message, SessionId};
use confab_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use tracing::{debug, info};

/// System prompt prepended to every outbound window.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, friendly, and knowledgeable AI assistant. \
You provide clear, accurate, and concise responses. \
You maintain context throughout the conversation and can reference previous messages. \
Be conversational and engaging while staying professional and helpful.";

/// The engine that orchestrates provider calls over the context store.
///
/// Stateless between calls: all session state lives in the [`ContextStore`],
/// all generation parameters are fixed at construction.
pub struct ChatEngine {
    /// The completion provider to use
    provider: Arc<dyn Provider>,

    /// Shared session state
    store: Arc<ContextStore>,

    /// The model to request
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Max tokens per reply
    max_tokens: Option<u32>,

    /// Trim threshold, counting user and assistant turns together
    max_context_messages: usize,

    /// Prompt prepended to every outbound window
    system_prompt: String,
}

impl ChatEngine {
    /// Create a new engine.
    pub fn new(
        provider: Arc<dyn Provider>,
        store: Arc<ContextStore>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            provider,
            store,
            model: model.into(),
            temperature,
            max_tokens: None,
            max_context_messages: 10,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Set the max tokens per reply.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the context window size.
    pub fn with_max_context_messages(mut self, max: usize) -> Self {
        self.max_context_messages = max;
        self
    }

    /// Replace the default system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Generate a reply to `message` within the given session.
    ///
    /// The full exchange:
    /// 1. Append the user turn to the session
    /// 2. Trim the session to the configured window (the new turn counts)
    /// 3. Build the outbound list: system prompt + trimmed context
    /// 4. Call the provider, the single await on the network
    /// 5. Append the reply to the session and return its text
    ///
    /// On provider failure the user turn stays recorded and the error is
    /// returned as-is; there is no retry. After a success the stored
    /// sequence holds the trimmed window plus the new reply, so its length
    /// can sit one above the window until the next call trims again.
    pub async fn generate(
        &self,
        message: impl Into<String>,
        session: &SessionId,
    ) -> confab_core::Result<String> {
        let message = message.into();

        self.store.append(session, Message::user(message)).await;
        self.store.trim(session, self.max_context_messages).await;

        let context = self.store.get(session).await;
        info!(
            session_id = %session,
            context_len = context.len(),
            "Generating reply"
        );

        let mut messages = Vec::with_capacity(context.len() + 1);
        messages.push(Message::system(&self.system_prompt));
        messages.extend(context);

        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self.provider.complete(request).await?;

        if let Some(usage) = &response.usage {
            debug!(
                session_id = %session,
                model = %response.model,
                tokens = usage.total_tokens,
                "Completion finished"
            );
        }

        let reply = response.message.content.clone();
        self.store.append(session, response.message).await;

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_core::error::{Error, ProviderError};
    use confab_core::message::Role;
    use confab_core::provider::{ProviderResponse, Usage};
    use std::sync::Mutex;

    /// A provider that returns a fixed reply.
    struct MockProvider {
        response: String,
    }

    #[async_trait::async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                message: Message::assistant(&self.response),
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
                model: "mock-model".into(),
            })
        }
    }

    /// A provider that records every request it sees.
    struct RecordingProvider {
        response: String,
        seen: Mutex<Vec<ProviderRequest>>,
    }

    impl RecordingProvider {
        fn new(response: impl Into<String>) -> Self {
            Self {
                response: response.into(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Provider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            self.seen.lock().unwrap().push(request);
            Ok(ProviderResponse {
                message: Message::assistant(&self.response),
                usage: None,
                model: "mock-model".into(),
            })
        }
    }

    /// A provider that always fails with a transport error.
    struct FailingProvider;

    #[async_trait::async_trait]
    impl Provider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }
    }

    fn engine_with(provider: Arc<dyn Provider>, store: Arc<ContextStore>) -> ChatEngine {
        ChatEngine::new(provider, store, "mock-model", 0.7).with_max_tokens(500)
    }

    #[tokio::test]
    async fn fresh_session_round_trip() {
        let store = Arc::new(ContextStore::new());
        let provider = Arc::new(MockProvider {
            response: "hi".into(),
        });
        let engine = engine_with(provider, store.clone());
        let session = SessionId::from("s1");

        let reply = engine.generate("hello", &session).await.unwrap();
        assert_eq!(reply, "hi");

        // Exactly two messages, user then assistant, no stored system prompt
        let messages = store.get(&session).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "hi");
    }

    #[tokio::test]
    async fn existing_session_keeps_growing() {
        let store = Arc::new(ContextStore::new());
        let session = SessionId::from("s1");
        store.append(&session, Message::user("earlier")).await;
        store.append(&session, Message::assistant("noted")).await;

        let provider = Arc::new(MockProvider {
            response: "again".into(),
        });
        let engine = engine_with(provider, store.clone());

        engine.generate("more", &session).await.unwrap();
        assert_eq!(store.get(&session).await.len(), 4);
    }

    #[tokio::test]
    async fn window_is_trimmed_before_dispatch() {
        let store = Arc::new(ContextStore::new());
        let session = SessionId::from("s2");
        for i in 0..10 {
            store.append(&session, Message::user(format!("old{i}"))).await;
        }

        let recorder = Arc::new(RecordingProvider::new("four"));
        let engine = ChatEngine::new(recorder.clone(), store.clone(), "mock-model", 0.7)
            .with_max_context_messages(4);

        engine.generate("new", &session).await.unwrap();

        // The outbound list is the system prompt plus the trimmed window,
        // with the just-appended user turn counted in the trim
        let seen = recorder.seen.lock().unwrap();
        let outbound = &seen[0].messages;
        assert_eq!(outbound.len(), 5);
        assert_eq!(outbound[0].role, Role::System);
        assert_eq!(outbound[1].content, "old8");
        assert_eq!(outbound[4].content, "new");

        // Stored length is the window plus the untrimmed reply
        let stored = store.get(&session).await;
        assert_eq!(stored.len(), 5);
        assert_eq!(stored[4].content, "four");
    }

    #[tokio::test]
    async fn stored_length_can_exceed_window_by_one_reply() {
        let store = Arc::new(ContextStore::new());
        let provider = Arc::new(MockProvider {
            response: "ok".into(),
        });
        let engine = ChatEngine::new(provider, store.clone(), "mock-model", 0.7)
            .with_max_context_messages(2);
        let session = SessionId::from("s1");

        engine.generate("one", &session).await.unwrap();
        engine.generate("two", &session).await.unwrap();

        // Trimmed to 2 before dispatch, then the reply lands untrimmed
        assert_eq!(store.get(&session).await.len(), 3);
    }

    #[tokio::test]
    async fn provider_failure_leaves_user_turn_recorded() {
        let store = Arc::new(ContextStore::new());
        let engine = engine_with(Arc::new(FailingProvider), store.clone());
        let session = SessionId::from("s1");

        let err = engine.generate("hello?", &session).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::Network(_))
        ));

        let messages = store.get(&session).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hello?");
    }

    #[tokio::test]
    async fn system_prompt_leads_every_request() {
        let store = Arc::new(ContextStore::new());
        let recorder = Arc::new(RecordingProvider::new("ok"));
        let engine = ChatEngine::new(recorder.clone(), store, "mock-model", 0.7)
            .with_system_prompt("Answer in French.");
        let session = SessionId::from("s1");

        engine.generate("bonjour", &session).await.unwrap();
        engine.generate("encore", &session).await.unwrap();

        let seen = recorder.seen.lock().unwrap();
        for request in seen.iter() {
            assert_eq!(request.messages[0].role, Role::System);
            assert_eq!(request.messages[0].content, "Answer in French.");
        }
        // One system message per request, never stored between calls
        assert_eq!(
            seen[1]
                .messages
                .iter()
                .filter(|m| m.role == Role::System)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn generation_parameters_are_fixed() {
        let store = Arc::new(ContextStore::new());
        let recorder = Arc::new(RecordingProvider::new("ok"));
        let engine = ChatEngine::new(recorder.clone(), store, "gpt-3.5-turbo", 0.7)
            .with_max_tokens(500);

        engine
            .generate("hi", &SessionId::from("s1"))
            .await
            .unwrap();

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen[0].model, "gpt-3.5-turbo");
        assert!((seen[0].temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(seen[0].max_tokens, Some(500));
    }
}
