use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::retrieval;
use crate::error::{ChatError, Result};
use crate::llm::{ChatModel, Prompt, PromptMessage};
use crate::models::{Session, SessionSummary, Turn};
use crate::preamble::Preamble;
use crate::rag::Retriever;
use crate::results::ResultStore;
use crate::session::SessionStore;

pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(60);

/// What a send does with the user's message before it reaches the model.
#[derive(Clone)]
pub enum ChatMode {
    /// Seed preamble, then history, then the message.
    Plain { preamble: Arc<Preamble> },
    /// Standalone-question rewrite, top-k retrieval, grounded answer.
    Retrieval(Arc<Retriever>),
}

impl ChatMode {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Plain { .. } => "plain",
            Self::Retrieval(_) => "retrieval",
        }
    }
}

type ExchangeLock = Arc<tokio::sync::Mutex<()>>;

/// Drives conversations: validates input, assembles prompts, calls the
/// model and records completed exchanges in the session store.
///
/// Exchanges on one session are serialized through a per-session lock held
/// across the model call. The store's own lock is never held that long.
pub struct Orchestrator {
    store: Arc<dyn SessionStore>,
    model: Arc<dyn ChatModel>,
    mode: ChatMode,
    timeout: Duration,
    results: Option<ResultStore>,
    locks: Mutex<HashMap<String, ExchangeLock>>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn SessionStore>, model: Arc<dyn ChatModel>, mode: ChatMode) -> Self {
        Self {
            store,
            model,
            mode,
            timeout: DEFAULT_MODEL_TIMEOUT,
            results: None,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Persist saved results to disk as well as on the session.
    pub fn with_results(mut self, results: ResultStore) -> Self {
        self.results = Some(results);
        self
    }

    pub const fn mode(&self) -> &ChatMode {
        &self.mode
    }

    pub async fn create_session(&self, id: Option<String>) -> Result<String> {
        self.store.create(id).await
    }

    /// Send one user message and return the model's reply.
    pub async fn send(&self, session_id: &str, message: &str) -> Result<String> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::InvalidInput("Tin nhắn không được để trống".to_string()));
        }
        if !self.store.contains(session_id).await {
            return Err(ChatError::session_not_found(session_id));
        }

        let lock = self.exchange_lock(session_id);
        let _guard = lock.lock().await;

        // Re-read under the lock: the session may have been deleted or
        // advanced by an exchange that held the lock before us.
        let session = self.store.get(session_id).await?;

        let reply = match &self.mode {
            ChatMode::Plain { preamble } => self.plain_reply(preamble, &session, message).await,
            ChatMode::Retrieval(retriever) => {
                self.retrieval_reply(retriever, &session, message).await
            }
        };
        let reply = match reply {
            Ok(reply) => reply,
            Err(ChatError::EmptyResponse(reason)) => {
                warn!(session_id, %reason, "Model returned no usable text");
                return Err(ChatError::EmptyResponse(reason));
            }
            Err(e) => return Err(e),
        };

        if reply.trim().is_empty() {
            warn!(session_id, "Model returned a blank reply");
            return Err(ChatError::EmptyResponse("blank reply".to_string()));
        }

        // A session deleted and re-created under the same id while the model
        // was running has a new generation and must not receive this exchange.
        let session = self
            .store
            .record_exchange(
                session_id,
                session.generation,
                Turn::user(message),
                Turn::assistant(reply.clone()),
            )
            .await?;
        info!(
            session_id,
            mode = self.mode.name(),
            message_count = session.message_count,
            "Recorded exchange"
        );
        Ok(reply)
    }

    async fn plain_reply(&self, preamble: &Preamble, session: &Session, message: &str) -> Result<String> {
        let mut prompt = Prompt::default();
        prompt.messages.extend(preamble.turns().iter().cloned());
        prompt.messages.extend(session.turns.iter().map(PromptMessage::from));
        prompt.push(PromptMessage::user(message));
        self.generate(&prompt).await
    }

    async fn retrieval_reply(
        &self,
        retriever: &Retriever,
        session: &Session,
        question: &str,
    ) -> Result<String> {
        let standalone = self.standalone_question(&session.turns, question).await?;
        let chunks = self.bounded(retriever.retrieve(&standalone)).await?;
        let prompt = retrieval::answer_prompt(&chunks, &session.turns, question);
        self.generate(&prompt).await
    }

    /// Rewrite a follow-up so it can be searched without the history.
    async fn standalone_question(&self, history: &[Turn], question: &str) -> Result<String> {
        if history.is_empty() {
            return Ok(question.to_string());
        }
        let prompt = retrieval::rewrite_prompt(history, question);
        match self.generate(&prompt).await {
            Ok(rewritten) if !rewritten.trim().is_empty() => {
                let rewritten = rewritten.trim().to_string();
                debug!(original = question, rewritten = %rewritten, "Rewrote question");
                Ok(rewritten)
            }
            Ok(_) | Err(ChatError::EmptyResponse(_)) => {
                debug!("Rewrite produced nothing, searching with the original question");
                Ok(question.to_string())
            }
            Err(e) => Err(e),
        }
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        debug!(mode = self.mode.name(), messages = prompt.messages.len(), "Calling model");
        self.bounded(self.model.generate(prompt)).await
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>> + Send) -> Result<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or_else(|_| {
                warn!(timeout_secs = self.timeout.as_secs(), "Outbound call timed out");
                Err(ChatError::Timeout(self.timeout.as_secs()))
            })
    }

    fn exchange_lock(&self, session_id: &str) -> ExchangeLock {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(session_id.to_string()).or_default())
    }

    /// Turns of a session, oldest first. The seed preamble is not included.
    pub async fn history(&self, session_id: &str) -> Result<Vec<Turn>> {
        Ok(self.store.get(session_id).await?.turns)
    }

    pub async fn session_info(&self, session_id: &str) -> Result<SessionSummary> {
        Ok(self.store.get(session_id).await?.summary())
    }

    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.store.list().await
    }

    pub async fn delete_session(&self, session_id: &str) -> bool {
        let removed = self.store.delete(session_id).await;
        self.forget(session_id).await;
        removed
    }

    /// Drop sessions idle longer than `max_age`, along with their locks and
    /// saved results.
    pub async fn sweep(&self, max_age: Duration) -> usize {
        let removed = self.store.sweep(max_age).await;
        for session_id in &removed {
            self.forget(session_id).await;
        }
        removed.len()
    }

    /// Release what the orchestrator keeps for a session outside the store.
    async fn forget(&self, session_id: &str) {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
        if let Some(results) = &self.results {
            if let Err(e) = results.remove(session_id).await {
                warn!(session_id, error = %e, "Failed to remove saved result");
            }
        }
    }

    pub async fn save_result(&self, session_id: &str, result: String) -> Result<()> {
        let generation = self.store.get(session_id).await?.generation;
        self.store.set_result(session_id, result.clone()).await?;
        if let Some(results) = &self.results {
            results.save(session_id, &result).await?;
            // Deleted while the file was being written.
            let current = self
                .store
                .get(session_id)
                .await
                .is_ok_and(|session| session.generation == generation);
            if !current {
                results.remove(session_id).await?;
                return Err(ChatError::session_not_found(session_id));
            }
        }
        Ok(())
    }

    /// The saved result, or `None` if the session has none yet.
    pub async fn get_result(&self, session_id: &str) -> Result<Option<String>> {
        let session = self.store.get(session_id).await?;
        if session.result.is_some() {
            return Ok(session.result);
        }
        match &self.results {
            Some(results) => results.load(session_id).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::llm::scripted::{HashEmbedder, ScriptedModel};
    use crate::models::{Chunk, ChunkKind, Role};
    use crate::rag::VectorIndex;
    use crate::session::InMemorySessionStore;
    use tempfile::tempdir;

    fn plain(model: Arc<ScriptedModel>) -> Orchestrator {
        let preamble = Arc::new(Preamble::builtin().unwrap());
        Orchestrator::new(
            Arc::new(InMemorySessionStore::new()),
            model,
            ChatMode::Plain { preamble },
        )
    }

    fn handbook_retriever() -> Arc<Retriever> {
        let mut index = VectorIndex::new("hash");
        for (page, text) in [
            "học phí ngành công nghệ thông tin là 40 triệu mỗi năm",
            "ký túc xá có 2000 chỗ ở cho sinh viên năm nhất",
            "điểm chuẩn ngành kinh tế năm ngoái là 24 điểm",
        ]
        .iter()
        .enumerate()
        {
            let chunk = Chunk {
                content: (*text).to_string(),
                source: "handbook.pdf".to_string(),
                page: page + 1,
                kind: ChunkKind::Pdf,
            };
            index.push(chunk, HashEmbedder::vector(text)).unwrap();
        }
        Arc::new(Retriever::new(index, Arc::new(HashEmbedder)).with_top_k(1))
    }

    fn retrieval(model: Arc<ScriptedModel>) -> Orchestrator {
        Orchestrator::new(
            Arc::new(InMemorySessionStore::new()),
            model,
            ChatMode::Retrieval(handbook_retriever()),
        )
    }

    #[tokio::test]
    async fn new_session_starts_empty() {
        let chat = plain(Arc::new(ScriptedModel::echo()));
        let id = chat.create_session(None).await.unwrap();

        let info = chat.session_info(&id).await.unwrap();
        assert_eq!(info.message_count, 0);
        assert_eq!(info.created_at, info.last_activity);
        assert!(chat.history(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_appends_one_exchange() {
        let model = Arc::new(ScriptedModel::echo());
        let chat = plain(Arc::clone(&model));
        let id = chat.create_session(Some("s1".to_string())).await.unwrap();

        let reply = chat.send(&id, "  xin chào  ").await.unwrap();
        assert_eq!(reply, "echo: xin chào");

        let history = chat.history(&id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "xin chào");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, "echo: xin chào");
        assert_eq!(chat.session_info(&id).await.unwrap().message_count, 1);
    }

    #[tokio::test]
    async fn prompt_is_preamble_then_history_then_message() {
        let model = Arc::new(ScriptedModel::echo());
        let chat = plain(Arc::clone(&model));
        let id = chat.create_session(None).await.unwrap();
        chat.send(&id, "một").await.unwrap();
        chat.send(&id, "hai").await.unwrap();

        let preamble = Preamble::builtin().unwrap();
        let seed = preamble.turns().len();
        let prompt = model.prompts().pop().unwrap();
        assert_eq!(&prompt.messages[..seed], preamble.turns());
        assert_eq!(prompt.messages[seed].text, "một");
        assert_eq!(prompt.messages[seed + 1].text, "echo: một");
        assert_eq!(prompt.messages[seed + 2].text, "hai");
        assert_eq!(prompt.messages.len(), seed + 3);
    }

    #[tokio::test]
    async fn start_phrase_yields_first_scripted_question() {
        let preamble = Arc::new(Preamble::builtin().unwrap());
        let first = preamble.question(1).unwrap();
        let start = preamble.start_phrase().to_string();
        let model = Arc::new(ScriptedModel::new(move |prompt| {
            if prompt.last_user_text() == Some(start.as_str()) {
                Ok(first.clone())
            } else {
                Ok("?".to_string())
            }
        }));
        let chat = Orchestrator::new(
            Arc::new(InMemorySessionStore::new()),
            model,
            ChatMode::Plain {
                preamble: Arc::clone(&preamble),
            },
        );
        let id = chat.create_session(None).await.unwrap();

        let reply = chat.send(&id, preamble.start_phrase()).await.unwrap();
        assert_eq!(reply, preamble.question(1).unwrap());
    }

    #[tokio::test]
    async fn blank_message_never_reaches_the_model() {
        let model = Arc::new(ScriptedModel::echo());
        let chat = plain(Arc::clone(&model));
        let id = chat.create_session(None).await.unwrap();

        let err = chat.send(&id, " \n\t ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(model.call_count(), 0);
        assert_eq!(chat.session_info(&id).await.unwrap().message_count, 0);
    }

    #[tokio::test]
    async fn unknown_session_changes_nothing() {
        let model = Arc::new(ScriptedModel::echo());
        let chat = plain(Arc::clone(&model));

        let err = chat.send("ghost", "hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Session ghost không tồn tại");
        assert_eq!(model.call_count(), 0);
        assert!(chat.list_sessions().await.is_empty());
        assert!(chat.locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleted_session_is_gone_everywhere() {
        let chat = plain(Arc::new(ScriptedModel::echo()));
        let id = chat.create_session(None).await.unwrap();
        chat.send(&id, "hi").await.unwrap();

        assert!(chat.delete_session(&id).await);
        assert!(!chat.delete_session(&id).await);
        assert_eq!(chat.history(&id).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(chat.session_info(&id).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(chat.send(&id, "hi").await.unwrap_err().kind(), ErrorKind::NotFound);
        assert!(!chat.locks.lock().unwrap().contains_key(&id));
    }

    #[tokio::test]
    async fn in_flight_send_does_not_leak_into_recreated_session() {
        let model = Arc::new(ScriptedModel::echo().with_delay(Duration::from_millis(100)));
        let chat = Arc::new(plain(model));
        chat.create_session(Some("s1".to_string())).await.unwrap();

        let pending = tokio::spawn({
            let chat = Arc::clone(&chat);
            async move { chat.send("s1", "cũ").await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(chat.delete_session("s1").await);
        chat.create_session(Some("s1".to_string())).await.unwrap();

        let err = pending.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(chat.history("s1").await.unwrap().is_empty());
        assert_eq!(chat.session_info("s1").await.unwrap().message_count, 0);
    }

    #[tokio::test]
    async fn blank_reply_leaves_session_untouched() {
        let chat = plain(Arc::new(ScriptedModel::new(|_| Ok("   ".to_string()))));
        let id = chat.create_session(None).await.unwrap();

        let err = chat.send(&id, "hi").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyResponse);
        assert!(chat.history(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_is_not_recorded() {
        let chat = plain(Arc::new(ScriptedModel::new(|_| {
            Err(ChatError::Upstream("503".to_string()))
        })));
        let id = chat.create_session(None).await.unwrap();

        assert_eq!(chat.send(&id, "hi").await.unwrap_err().kind(), ErrorKind::Upstream);
        assert_eq!(chat.session_info(&id).await.unwrap().message_count, 0);
    }

    #[tokio::test]
    async fn slow_model_times_out() {
        let model = Arc::new(ScriptedModel::echo().with_delay(Duration::from_millis(500)));
        let chat = plain(model).with_timeout(Duration::from_millis(20));
        let id = chat.create_session(None).await.unwrap();

        let err = chat.send(&id, "hi").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(chat.history(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_session_sends_are_serialized() {
        let model = Arc::new(ScriptedModel::echo().with_delay(Duration::from_millis(30)));
        let chat = Arc::new(plain(Arc::clone(&model)));
        let id = chat.create_session(None).await.unwrap();

        let a = tokio::spawn({
            let chat = Arc::clone(&chat);
            let id = id.clone();
            async move { chat.send(&id, "a").await }
        });
        let b = tokio::spawn({
            let chat = Arc::clone(&chat);
            let id = id.clone();
            async move { chat.send(&id, "b").await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let history = chat.history(&id).await.unwrap();
        assert_eq!(history.len(), 4);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].content, format!("echo: {}", pair[0].content));
        }
        // Whichever ran second saw the first exchange in its prompt.
        let seed = Preamble::builtin().unwrap().turns().len();
        let mut sizes: Vec<usize> = model.prompts().iter().map(|p| p.messages.len()).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![seed + 1, seed + 3]);
    }

    #[tokio::test]
    async fn sweep_drops_sessions_and_locks() {
        let chat = plain(Arc::new(ScriptedModel::echo()));
        let id = chat.create_session(None).await.unwrap();
        chat.send(&id, "hi").await.unwrap();

        assert_eq!(chat.sweep(Duration::MAX).await, 0);
        assert_eq!(chat.sweep(Duration::ZERO).await, 1);
        assert!(chat.list_sessions().await.is_empty());
        assert!(chat.locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn results_round_trip_per_session() {
        let dir = tempdir().unwrap();
        let chat = plain(Arc::new(ScriptedModel::echo()))
            .with_results(ResultStore::new(dir.path().join("results")));
        let a = chat.create_session(None).await.unwrap();
        let b = chat.create_session(None).await.unwrap();

        assert_eq!(chat.get_result(&a).await.unwrap(), None);
        chat.save_result(&a, r#"{"careers":[]}"#.to_string()).await.unwrap();
        assert_eq!(chat.get_result(&a).await.unwrap().as_deref(), Some(r#"{"careers":[]}"#));
        assert_eq!(chat.get_result(&b).await.unwrap(), None);

        let err = chat.save_result("ghost", "x".to_string()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(chat.get_result("ghost").await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn recreated_session_does_not_inherit_a_result() {
        let dir = tempdir().unwrap();
        let results = dir.path().join("results");
        let chat = plain(Arc::new(ScriptedModel::echo())).with_results(ResultStore::new(&results));
        chat.create_session(Some("s1".to_string())).await.unwrap();
        chat.save_result("s1", "kết quả cũ".to_string()).await.unwrap();

        assert!(chat.delete_session("s1").await);
        chat.create_session(Some("s1".to_string())).await.unwrap();

        assert_eq!(chat.get_result("s1").await.unwrap(), None);
        assert_eq!(std::fs::read_dir(&results).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn sweep_removes_saved_results() {
        let dir = tempdir().unwrap();
        let results = dir.path().join("results");
        let chat = plain(Arc::new(ScriptedModel::echo())).with_results(ResultStore::new(&results));
        for id in ["a", "b"] {
            chat.create_session(Some(id.to_string())).await.unwrap();
            chat.save_result(id, format!("result {id}")).await.unwrap();
        }
        assert_eq!(std::fs::read_dir(&results).unwrap().count(), 2);

        assert_eq!(chat.sweep(Duration::ZERO).await, 2);
        assert_eq!(std::fs::read_dir(&results).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn first_retrieval_question_skips_rewrite() {
        let model = Arc::new(ScriptedModel::new(|_| Ok("40 triệu".to_string())));
        let chat = retrieval(Arc::clone(&model));
        let id = chat.create_session(None).await.unwrap();

        chat.send(&id, "học phí công nghệ thông tin").await.unwrap();

        assert_eq!(model.call_count(), 1);
        let prompt = &model.prompts()[0];
        let system = prompt.system.as_deref().unwrap();
        assert!(system.contains("Nguồn: handbook.pdf | Trang: 1\nhọc phí ngành"));
        assert!(!system.contains("ký túc xá"));
        assert!(system.contains(retrieval::NOT_FOUND_ANSWER));
        assert_eq!(prompt.messages.len(), 1);
    }

    #[tokio::test]
    async fn follow_up_is_rewritten_before_retrieval() {
        let model = Arc::new(ScriptedModel::new(|prompt| {
            if prompt.system.as_deref() == Some(retrieval::REWRITE_INSTRUCTION) {
                Ok("ký túc xá cho sinh viên năm nhất có bao nhiêu chỗ ở".to_string())
            } else {
                Ok("2000 chỗ".to_string())
            }
        }));
        let chat = retrieval(Arc::clone(&model));
        let id = chat.create_session(None).await.unwrap();
        chat.send(&id, "học phí công nghệ thông tin").await.unwrap();

        let reply = chat.send(&id, "còn chỗ ở thì sao?").await.unwrap();
        assert_eq!(reply, "2000 chỗ");

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 3);
        assert_eq!(prompts[1].system.as_deref(), Some(retrieval::REWRITE_INSTRUCTION));
        assert_eq!(prompts[1].messages.len(), 3);
        let answer = &prompts[2];
        assert!(answer.system.as_deref().unwrap().contains("ký túc xá"));
        // The grounded answer sees the question as the user asked it.
        assert_eq!(answer.last_user_text(), Some("còn chỗ ở thì sao?"));
        assert_eq!(answer.messages.len(), 3);
    }

    #[tokio::test]
    async fn empty_rewrite_falls_back_to_the_question() {
        let model = Arc::new(ScriptedModel::new(|prompt| {
            if prompt.system.as_deref() == Some(retrieval::REWRITE_INSTRUCTION) {
                Err(ChatError::EmptyResponse("finish_reason: SAFETY".to_string()))
            } else {
                Ok("24 điểm".to_string())
            }
        }));
        let chat = retrieval(Arc::clone(&model));
        let id = chat.create_session(None).await.unwrap();
        chat.send(&id, "xin chào").await.unwrap();

        chat.send(&id, "điểm chuẩn ngành kinh tế").await.unwrap();
        let answer = model.prompts().pop().unwrap();
        assert!(answer.system.unwrap().contains("điểm chuẩn ngành kinh tế năm ngoái"));
    }
}
