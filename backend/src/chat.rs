use std::io;
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::conversation_store::{ConversationStore, MessageRecord, StoreError};
use crate::llm::{ChatMessage, LanguageModel, ModelError};
use crate::models::{ChatResponse, Role};
use crate::prompt_loader::PromptLoader;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to read system prompt: {0}")]
    Prompt(#[source] io::Error),
}

/// Outbound message list: system prompt, the newest `max_history`
/// user/assistant records, then the new user turn.
pub fn build_messages(
    system_prompt: &str,
    history: &[MessageRecord],
    user_text: &str,
    max_history: Option<usize>,
) -> Vec<ChatMessage> {
    let keep_from = max_history.map_or(0, |cap| history.len().saturating_sub(cap));

    let mut messages = Vec::with_capacity(history.len() - keep_from + 2);
    messages.push(ChatMessage::new(Role::System, system_prompt));
    messages.extend(
        history[keep_from..]
            .iter()
            .filter(|record| matches!(record.role, Role::User | Role::Assistant))
            .map(|record| ChatMessage::new(record.role, record.content.as_str())),
    );
    messages.push(ChatMessage::new(Role::User, user_text));
    messages
}

pub struct ChatService {
    model: Arc<dyn LanguageModel>,
    prompts: PromptLoader,
    store: ConversationStore,
    max_history: Option<usize>,
}

impl ChatService {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        prompts: PromptLoader,
        store: ConversationStore,
        max_history: Option<usize>,
    ) -> Self {
        tracing::debug!(
            "chat service model={} max_history={:?}",
            model.model_name(),
            max_history
        );
        Self {
            model,
            prompts,
            store,
            max_history,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// One chat turn. The user and assistant records are written only
    /// once the model has answered, so a failed turn leaves no trace.
    pub async fn chat(
        &self,
        user_text: &str,
        conversation_id: Option<Uuid>,
    ) -> Result<ChatResponse, ChatError> {
        let conversation_id = conversation_id.unwrap_or_else(Uuid::new_v4);
        tracing::info!("chat conversation_id={conversation_id}");

        let _turn = self.store.lock(conversation_id).await;

        let system_prompt = self.prompts.load().await.map_err(ChatError::Prompt)?;
        let history = self.store.load(conversation_id).await?;
        tracing::debug!(
            "system prompt {} chars, history {} messages",
            system_prompt.chars().count(),
            history.len()
        );

        let messages = build_messages(&system_prompt, &history, user_text, self.max_history);
        tracing::debug!("built {} messages", messages.len());

        let completion = self.model.complete(&messages).await?;

        self.store
            .append(&MessageRecord::new(conversation_id, Role::User, user_text))
            .await?;
        self.store
            .append(
                &MessageRecord::new(conversation_id, Role::Assistant, completion.text.as_str())
                    .with_model(self.model.model_name(), completion.response_id.clone()),
            )
            .await?;

        Ok(ChatResponse {
            conversation_id,
            assistant_text: completion.text,
            response_id: completion.response_id,
        })
    }
}
