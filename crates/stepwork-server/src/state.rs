use crate::llm::{HttpTextGenerator, TextGenerator};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use stepwork_core::classifier::{AnswerClassifier, KeywordClassifier};
use stepwork_core::config::Config;
use stepwork_core::script::QuestionScript;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub config: Arc<Config>,
    pub script: Arc<QuestionScript>,
    pub classifier: Arc<dyn AnswerClassifier + Send + Sync>,
    pub generator: Arc<dyn TextGenerator>,
    /// Identity provider signing secret; `None` rejects every protected call.
    pub auth_secret: Option<String>,
    pub session_locks: Arc<SessionLocks>,
}

/// One mutex per session id, serializing the load, walk and save of an
/// answer. Entries nobody holds are pruned on the next lookup.
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    pub fn for_session(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.retain(|key, lock| key == id || Arc::strong_count(lock) > 1);
        locks.entry(id.to_string()).or_default().clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl AppState {
    pub fn new(
        root: PathBuf,
        config: Config,
        script: QuestionScript,
        auth_secret: Option<String>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let classifier = Arc::new(KeywordClassifier::new(&config.classifier));
        Self {
            root,
            config: Arc::new(config),
            script: Arc::new(script),
            classifier,
            generator,
            auth_secret,
            session_locks: Arc::new(SessionLocks::default()),
        }
    }

    /// Read config and script from `root`, secrets from the environment.
    pub fn load(root: PathBuf) -> stepwork_core::Result<Self> {
        let config = Config::load(&root)?;
        let script = QuestionScript::load(&root)?;
        let auth_secret = config.auth.resolve_secret();
        let generator: Arc<dyn TextGenerator> = Arc::new(HttpTextGenerator::new(&config.llm));
        Ok(Self::new(root, config, script, auth_secret, generator))
    }
}
