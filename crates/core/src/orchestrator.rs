use crate::catalog::CatalogStore;
use crate::chat::{AssistantTurn, ChatMessage, ToolCall, ToolDefinition};
use crate::config::ChainSettings;
use crate::embeddings::Embedder;
use crate::prompts::{system_prompt, user_message};
use crate::retriever::Retriever;
use crate::tools::{SummaryTool, ToolDispatcher, ToolRequest, ToolResult};
use crate::traits::{ReasoningService, VectorIndex};
use crate::{ChainError, ChainResult, ConfigError, ModelError, SearchError};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChainState {
    Retrieving,
    AwaitingModelDecision,
    ExecutingTool,
    Completed,
    RetrievalFailed,
    ModelFailed,
    ToolMismatch,
}

/// Runs one recommendation turn: retrieve candidates, let the model pick a
/// title through the summary tool, resolve it against the catalog.
///
/// Holds only read-only state, so one instance can serve concurrent requests.
pub struct ChainOrchestrator<E, V, R> {
    retriever: Retriever<E, V>,
    reasoning: R,
    tools: ToolDispatcher,
    settings: ChainSettings,
}

impl<E, V, R> ChainOrchestrator<E, V, R>
where
    E: Embedder + Send + Sync,
    V: VectorIndex + Send + Sync,
    R: ReasoningService + Send + Sync,
{
    pub fn new(
        retriever: Retriever<E, V>,
        reasoning: R,
        catalog: Arc<CatalogStore>,
        settings: ChainSettings,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let tools = ToolDispatcher::new(SummaryTool::new(catalog, settings.resolver));

        Ok(Self {
            retriever,
            reasoning,
            tools,
            settings,
        })
    }

    pub fn settings(&self) -> &ChainSettings {
        &self.settings
    }

    pub async fn answer(&self, user_prompt: &str) -> Result<ChainResult, ChainError> {
        let prompt = user_prompt.trim();
        if prompt.is_empty() {
            return Err(failed(ChainError::EmptyPrompt));
        }

        info!(state = ?ChainState::Retrieving, top_k = self.settings.top_k, "chain step");
        let candidates = self
            .retriever
            .retrieve(prompt, self.settings.top_k)
            .await
            .map_err(|error| failed(ChainError::RetrievalFailed(error)))?;

        if candidates.is_empty() {
            return Err(failed(ChainError::RetrievalFailed(SearchError::NotReady(
                "vector index returned no candidates".to_string(),
            ))));
        }

        info!(
            state = ?ChainState::AwaitingModelDecision,
            candidate_count = candidates.len(),
            "chain step"
        );
        let mut messages = vec![
            ChatMessage::system(system_prompt()),
            ChatMessage::user(user_message(prompt, &candidates)),
        ];
        let definitions = self.tools.definitions();

        let turn = self
            .reasoning
            .complete(&messages, &definitions)
            .await
            .map_err(model_failed)?;
        let (call, request) = select_tool_call(&turn).map_err(model_failed)?;

        let ToolRequest::GetSummaryByTitle { requested_title } = &request;
        info!(
            state = ?ChainState::ExecutingTool,
            tool = request.name(),
            requested_title = %requested_title,
            "chain step"
        );
        let result = self.tools.execute(&request);
        let tool_content = result.to_tool_content();

        let (matched, full_summary) = match result {
            ToolResult::Found {
                matched,
                full_summary,
            } => (matched, full_summary),
            ToolResult::NotFound { requested_title } => {
                return Err(failed(ChainError::ToolMismatch { requested_title }));
            }
        };

        if !candidates
            .iter()
            .any(|candidate| candidate.title == matched.title)
        {
            warn!(
                title = %matched.title,
                "model picked a catalogued title outside the retrieved candidates"
            );
        }

        let final_answer = if self.settings.compose_final_answer {
            messages.push(turn.to_message());
            messages.push(ChatMessage::tool(call.id.clone(), tool_content));
            self.compose_final_answer(&messages, &definitions).await
        } else {
            None
        };

        info!(
            state = ?ChainState::Completed,
            chosen_title = %matched.title,
            method = ?matched.method,
            score = matched.score,
            "chain step"
        );

        Ok(ChainResult::new(
            matched,
            turn.text().to_string(),
            full_summary,
            candidates,
            final_answer,
        ))
    }

    async fn compose_final_answer(
        &self,
        messages: &[ChatMessage],
        definitions: &[ToolDefinition],
    ) -> Option<String> {
        match self.reasoning.complete(messages, definitions).await {
            Ok(turn) if !turn.text().is_empty() => Some(turn.text().to_string()),
            Ok(_) => None,
            Err(error) => {
                warn!(%error, "final answer turn failed; keeping the resolved result");
                None
            }
        }
    }
}

/// The model must emit exactly one function call, and it must be a valid
/// request for a declared tool.
fn select_tool_call(turn: &AssistantTurn) -> Result<(&ToolCall, ToolRequest), ModelError> {
    let calls: Vec<&ToolCall> = turn.function_calls().collect();
    match calls.as_slice() {
        [] => Err(ModelError::MissingToolCall),
        [call] => Ok((*call, ToolRequest::from_call(call)?)),
        many => Err(ModelError::MultipleToolCalls(many.len())),
    }
}

fn model_failed(error: ModelError) -> ChainError {
    failed(ChainError::ModelFailed(error))
}

fn failed(error: ChainError) -> ChainError {
    warn!(state = ?error.state(), %error, "chain failed");
    error
}
