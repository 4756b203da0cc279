use std::sync::Arc;

use crate::config::Config;
use crate::repositories::{AnswerRepository, QuestionRepository, RepositoryOptions};
use crate::store::StoreConnector;

pub struct AppState {
    pub config: Config,
    pub connector: Arc<dyn StoreConnector>,
    pub questions: QuestionRepository,
    pub answers: AnswerRepository,
}

impl AppState {
    /// Builds the repositories over an already constructed connector.
    ///
    /// The question catalog skips malformed documents; answer history fails
    /// on them.
    pub fn new(config: Config, connector: Arc<dyn StoreConnector>) -> Self {
        let timeout = config.store.operation_timeout;

        Self {
            questions: QuestionRepository::new(
                connector.clone(),
                RepositoryOptions::tolerant(timeout),
            ),
            answers: AnswerRepository::new(connector.clone(), RepositoryOptions::strict(timeout)),
            connector,
            config,
        }
    }
}
