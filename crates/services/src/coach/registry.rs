use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use coach_core::model::{ChatTurn, ProblemEntry, ProblemId, Transcript};

use crate::coach::prompt::build_messages;
use crate::coach::provider::{ChatCompletion, CoachSettings, CompletionRequest};
use crate::error::CoachError;

/// Lifecycle of a problem's coaching session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session has been opened for the problem yet.
    Closed,
    Idle,
    AwaitingResponse,
}

#[derive(Debug, Default)]
struct CoachSession {
    transcript: Transcript,
    awaiting: bool,
}

/// Assistant text shown in place of a reply when a turn fails.
#[must_use]
pub fn failure_message(err: &CoachError) -> String {
    format!(
        "**Error getting coach response**: {err}\n\nPlease check your credential configuration."
    )
}

/// Per-problem coaching transcripts for the lifetime of the process.
///
/// Sessions are created on first open and never evicted. Each turn sends the
/// problem context plus the whole transcript for that problem only.
pub struct CoachRegistry {
    provider: Arc<dyn ChatCompletion>,
    settings: CoachSettings,
    sessions: Mutex<HashMap<ProblemId, CoachSession>>,
}

impl CoachRegistry {
    #[must_use]
    pub fn new(provider: Arc<dyn ChatCompletion>, settings: CoachSettings) -> Self {
        Self {
            provider,
            settings,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<ProblemId, CoachSession>> {
        // Appends are the only mutation, so a poisoned map is still consistent.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get or create the session for `id` and return its transcript.
    pub fn open(&self, id: &ProblemId) -> Vec<ChatTurn> {
        self.sessions()
            .entry(id.clone())
            .or_default()
            .transcript
            .turns()
            .to_vec()
    }

    /// Transcript of an already opened session.
    #[must_use]
    pub fn transcript(&self, id: &ProblemId) -> Option<Vec<ChatTurn>> {
        self.sessions()
            .get(id)
            .map(|session| session.transcript.turns().to_vec())
    }

    #[must_use]
    pub fn state(&self, id: &ProblemId) -> SessionState {
        match self.sessions().get(id) {
            None => SessionState::Closed,
            Some(session) if session.awaiting => SessionState::AwaitingResponse,
            Some(_) => SessionState::Idle,
        }
    }

    #[must_use]
    pub fn message_count(&self, id: &ProblemId) -> usize {
        self.sessions()
            .get(id)
            .map_or(0, |session| session.transcript.len())
    }

    /// Empty a session's transcript. The session itself stays open.
    ///
    /// # Errors
    ///
    /// Returns `CoachError::TurnInFlight` while a reply is pending.
    pub fn clear(&self, id: &ProblemId) -> Result<(), CoachError> {
        let mut sessions = self.sessions();
        if let Some(session) = sessions.get_mut(id) {
            if session.awaiting {
                return Err(CoachError::TurnInFlight(id.clone()));
            }
            session.transcript.clear();
        }
        Ok(())
    }

    /// Run one coaching turn for `problem`.
    ///
    /// The user turn is appended before the provider is called. Provider
    /// failures do not surface as errors: they become an assistant turn that
    /// describes the failure, and the session returns to idle either way.
    ///
    /// # Errors
    ///
    /// Returns `CoachError::EmptyMessage` for blank input and
    /// `CoachError::TurnInFlight` if this problem already has a pending turn.
    pub async fn submit_turn(
        &self,
        problem: &ProblemEntry,
        user_text: &str,
    ) -> Result<ChatTurn, CoachError> {
        if user_text.trim().is_empty() {
            return Err(CoachError::EmptyMessage);
        }
        let id = problem.id();

        let history = {
            let mut sessions = self.sessions();
            let session = sessions.entry(id.clone()).or_default();
            if session.awaiting {
                return Err(CoachError::TurnInFlight(id.clone()));
            }
            session.transcript.push(ChatTurn::user(user_text));
            session.awaiting = true;
            session.transcript.turns().to_vec()
        };
        let pending = PendingTurn { registry: self, id };

        let request = CompletionRequest::new(&self.settings, build_messages(problem, &history));
        let reply = match self.provider.complete(&request).await {
            Ok(text) => ChatTurn::assistant(text),
            Err(err) => {
                tracing::warn!(problem = %id, error = %err, "coaching turn failed");
                ChatTurn::assistant(failure_message(&err))
            }
        };

        pending.finish(reply.clone());
        Ok(reply)
    }
}

/// Returns a session to idle, also when a turn's future is dropped mid-flight.
struct PendingTurn<'a> {
    registry: &'a CoachRegistry,
    id: &'a ProblemId,
}

impl PendingTurn<'_> {
    fn finish(self, reply: ChatTurn) {
        if let Some(session) = self.registry.sessions().get_mut(self.id) {
            session.transcript.push(reply);
        }
    }
}

impl Drop for PendingTurn<'_> {
    fn drop(&mut self) {
        if let Some(session) = self.registry.sessions().get_mut(self.id) {
            session.awaiting = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use coach_core::model::{
        ChatRole, Metadata, MetadataValue, ProblemDocument, ProblemFiles,
    };
    use std::collections::VecDeque;
    use std::path::PathBuf;

    /// Replays scripted results and records every request it receives.
    #[derive(Default)]
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<String, CoachError>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        fn with(replies: Vec<Result<String, CoachError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::default(),
            })
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatCompletion for ScriptedProvider {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, CoachError> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(CoachError::EmptyResponse))
        }
    }

    fn problem(id: &str, name: &str) -> ProblemEntry {
        ProblemEntry::new(
            ProblemId::new(id).unwrap(),
            "systems",
            ProblemDocument {
                metadata: Metadata::new().with("name", MetadataValue::Text(name.into())),
                body: format!("About {name}"),
            },
            ProblemFiles {
                directory: PathBuf::from(id),
                hint_files: Vec::new(),
                solution_file: PathBuf::from(id).join("solution.md"),
                lab_dir: None,
            },
        )
    }

    #[test]
    fn open_is_lazy_and_idempotent() {
        let registry = CoachRegistry::new(ScriptedProvider::with(vec![]), CoachSettings::default());
        let id = ProblemId::new("systems/cache").unwrap();

        assert_eq!(registry.state(&id), SessionState::Closed);
        assert!(registry.transcript(&id).is_none());
        assert!(registry.open(&id).is_empty());
        assert_eq!(registry.state(&id), SessionState::Idle);
        assert!(registry.open(&id).is_empty());
    }

    #[tokio::test]
    async fn successful_turn_appends_user_and_assistant() {
        let provider = ScriptedProvider::with(vec![Ok("What limits throughput?".into())]);
        let registry = CoachRegistry::new(provider.clone(), CoachSettings::default());
        let cache = problem("systems/cache", "Cache");

        let reply = registry.submit_turn(&cache, "  where do I start?  ").await.unwrap();
        assert_eq!(reply, ChatTurn::assistant("What limits throughput?"));

        let transcript = registry.transcript(cache.id()).unwrap();
        assert_eq!(
            transcript,
            vec![
                ChatTurn::user("  where do I start?  "),
                ChatTurn::assistant("What limits throughput?"),
            ]
        );
        assert_eq!(registry.state(cache.id()), SessionState::Idle);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.messages[0].role, ChatRole::System);
        assert!(request.messages[0].text.contains("**Problem**: Cache"));
        assert_eq!(request.messages[1], ChatTurn::user("  where do I start?  "));
        assert_eq!(request.temperature, CoachSettings::default().temperature);
        assert_eq!(request.max_tokens, CoachSettings::default().max_tokens);
    }

    #[tokio::test]
    async fn failed_turn_reports_error_inline_and_returns_to_idle() {
        let provider = ScriptedProvider::with(vec![
            Ok("first reply".into()),
            Err(CoachError::Provider("connection reset".into())),
        ]);
        let registry = CoachRegistry::new(provider, CoachSettings::default());
        let cache = problem("systems/cache", "Cache");

        registry.submit_turn(&cache, "one").await.unwrap();
        let reply = registry.submit_turn(&cache, "two").await.unwrap();
        assert!(reply.text.contains("Error"));
        assert!(reply.text.contains("connection reset"));
        assert!(reply.text.contains("credential configuration"));

        let transcript = registry.transcript(cache.id()).unwrap();
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript[2], ChatTurn::user("two"));
        assert_eq!(transcript[3].role, ChatRole::Assistant);
        assert_eq!(registry.state(cache.id()), SessionState::Idle);
    }

    #[tokio::test]
    async fn missing_credential_is_reported_inline() {
        let provider = ScriptedProvider::with(vec![Err(CoachError::MissingCredential)]);
        let registry = CoachRegistry::new(provider, CoachSettings::default());
        let cache = problem("systems/cache", "Cache");

        let reply = registry.submit_turn(&cache, "hello").await.unwrap();
        assert!(reply.text.contains("credential is not configured"));
        assert_eq!(registry.message_count(cache.id()), 2);
    }

    #[tokio::test]
    async fn sessions_never_share_context() {
        let provider = ScriptedProvider::with(vec![Ok("a-reply".into()), Ok("b-reply".into())]);
        let registry = CoachRegistry::new(provider.clone(), CoachSettings::default());
        let a = problem("systems/cache", "Cache");
        let b = problem("systems/queue", "Queue");

        registry.submit_turn(&a, "about the cache").await.unwrap();
        assert!(registry.open(b.id()).is_empty());
        registry.submit_turn(&b, "about the queue").await.unwrap();

        let second = &provider.requests()[1];
        assert_eq!(second.messages.len(), 2);
        assert!(second.messages[0].text.contains("**Problem**: Queue"));
        assert!(!second.messages.iter().any(|turn| turn.text.contains("cache")));
        assert_eq!(registry.message_count(a.id()), 2);
        assert_eq!(registry.message_count(b.id()), 2);
    }

    #[tokio::test]
    async fn blank_message_is_rejected_without_touching_transcript() {
        let registry = CoachRegistry::new(ScriptedProvider::with(vec![]), CoachSettings::default());
        let cache = problem("systems/cache", "Cache");

        let err = registry.submit_turn(&cache, "   ").await.unwrap_err();
        assert!(matches!(err, CoachError::EmptyMessage));
        assert_eq!(registry.state(cache.id()), SessionState::Closed);
    }

    #[tokio::test]
    async fn clear_empties_transcript_but_keeps_session() {
        let provider = ScriptedProvider::with(vec![Ok("reply".into())]);
        let registry = CoachRegistry::new(provider, CoachSettings::default());
        let cache = problem("systems/cache", "Cache");

        registry.submit_turn(&cache, "hi").await.unwrap();
        registry.clear(cache.id()).unwrap();
        assert_eq!(registry.message_count(cache.id()), 0);
        assert_eq!(registry.state(cache.id()), SessionState::Idle);
    }

    /// Blocks every call until released.
    #[derive(Default)]
    struct GatedProvider {
        gate: tokio::sync::Notify,
    }

    #[async_trait]
    impl ChatCompletion for GatedProvider {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, CoachError> {
            self.gate.notified().await;
            Ok("released".into())
        }
    }

    #[tokio::test]
    async fn second_submission_while_awaiting_is_rejected() {
        let provider = Arc::new(GatedProvider::default());
        let registry = Arc::new(CoachRegistry::new(
            provider.clone(),
            CoachSettings::default(),
        ));
        let cache = problem("systems/cache", "Cache");

        let first = {
            let registry = Arc::clone(&registry);
            let cache = cache.clone();
            tokio::spawn(async move { registry.submit_turn(&cache, "one").await })
        };
        while registry.state(cache.id()) != SessionState::AwaitingResponse {
            tokio::task::yield_now().await;
        }

        let err = registry.submit_turn(&cache, "two").await.unwrap_err();
        assert!(matches!(err, CoachError::TurnInFlight(_)));
        assert!(matches!(
            registry.clear(cache.id()),
            Err(CoachError::TurnInFlight(_))
        ));

        provider.gate.notify_one();
        let reply = first.await.unwrap().unwrap();
        assert_eq!(reply.text, "released");
        assert_eq!(registry.message_count(cache.id()), 2);
        assert_eq!(registry.state(cache.id()), SessionState::Idle);
    }

    #[tokio::test]
    async fn abandoned_turn_does_not_leave_session_awaiting() {
        let registry = CoachRegistry::new(
            Arc::new(GatedProvider::default()),
            CoachSettings::default(),
        );
        let cache = problem("systems/cache", "Cache");

        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            registry.submit_turn(&cache, "hello?"),
        )
        .await;
        assert!(outcome.is_err());

        assert_eq!(registry.state(cache.id()), SessionState::Idle);
        assert_eq!(
            registry.transcript(cache.id()).unwrap(),
            vec![ChatTurn::user("hello?")]
        );
    }

    #[test]
    fn failure_message_embeds_cause() {
        let text = failure_message(&CoachError::EmptyResponse);
        assert!(text.starts_with("**Error getting coach response**"));
        assert!(text.contains("empty response"));
    }
}
