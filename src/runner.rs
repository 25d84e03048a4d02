use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::automation::linkedin::LinkedInBrowser;
use crate::automation::AutomationClient;
use crate::checkpoint::{Checkpoint, Checkpointer, FileCheckpointer};
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::generator::{model_from_config, MessageGenerator, PromptedGenerator};
use crate::pipeline::stage::Stage;
use crate::pipeline::state::OutreachState;
use crate::pipeline::{Pipeline, PipelineConfig};

/// What a finished session reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub session: String,
    /// Number of targets discovered (and therefore walked through the sequence).
    pub targets_processed: usize,
    /// Targets recorded as successful at Close.
    pub completed: usize,
}

/// Runs one outreach session end to end: login, resume or start fresh, drive
/// the pipeline stage by stage and checkpoint between stages.
pub struct Runner {
    config: PipelineConfig,
    checkpointer: Option<Arc<dyn Checkpointer>>,
}

impl Runner {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            checkpointer: None,
        }
    }

    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn Checkpointer>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    /// Run the session and release the automation client afterwards, whatever the outcome.
    pub async fn execute(
        &self,
        client: &dyn AutomationClient,
        generator: &dyn MessageGenerator,
        session: &str,
    ) -> Result<Summary> {
        let result = self.drive(client, generator, session).await;

        if let Err(e) = client.shutdown().await {
            tracing::warn!(error = %e, "Failed to shut down automation client");
        }

        result
    }

    async fn drive(
        &self,
        client: &dyn AutomationClient,
        generator: &dyn MessageGenerator,
        session: &str,
    ) -> Result<Summary> {
        client.login().await?;

        let (start, mut state) = self.restore(session).await?;
        let pipeline = Pipeline::new(client, generator, self.config.clone());

        let mut next = Some(start);
        while let Some(stage) = next {
            next = pipeline.step(stage, &mut state).await?;
            if let Some(upcoming) = next {
                self.save(session, upcoming, &state).await;
            }
        }

        if let Some(checkpointer) = &self.checkpointer {
            checkpointer.clear(session).await?;
        }

        let summary = Summary {
            session: session.to_string(),
            targets_processed: state.targets.len(),
            completed: state.completed(),
        };
        tracing::info!(
            session = session,
            targets = summary.targets_processed,
            completed = summary.completed,
            "Outreach session finished"
        );
        Ok(summary)
    }

    async fn restore(&self, session: &str) -> Result<(Stage, OutreachState)> {
        let Some(checkpointer) = &self.checkpointer else {
            return Ok((Stage::ENTRY, OutreachState::new()));
        };

        match checkpointer.load(session).await? {
            Some(checkpoint) if checkpoint.query != self.config.query => {
                Err(AppError::Checkpoint(format!(
                    "session `{session}` was started for query `{}`, not `{}`; \
                     pick another --session or delete its checkpoint",
                    checkpoint.query, self.config.query
                )))
            }
            Some(checkpoint) => {
                tracing::info!(
                    session = session,
                    stage = %checkpoint.next_stage,
                    cursor = checkpoint.state.cursor,
                    targets = checkpoint.state.targets.len(),
                    saved_at = %checkpoint.saved_at,
                    "Resuming from checkpoint"
                );
                Ok((checkpoint.next_stage, checkpoint.state))
            }
            None => {
                tracing::info!(session = session, "Starting a fresh session");
                Ok((Stage::ENTRY, OutreachState::new()))
            }
        }
    }

    async fn save(&self, session: &str, next_stage: Stage, state: &OutreachState) {
        let Some(checkpointer) = &self.checkpointer else {
            return;
        };
        let checkpoint = Checkpoint::new(session, &self.config.query, next_stage, state);
        if let Err(e) = checkpointer.save(&checkpoint).await {
            tracing::warn!(session = session, error = %e, "Failed to save checkpoint");
        }
    }
}

/// Stable session token for an account and query, so re-running the same
/// search resumes instead of starting over. `query` is used as given.
pub fn session_token(email: &str, query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(query.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

/// Session token and pipeline settings for a configuration. The query is
/// trimmed once here so the token and the search always see the same text.
fn plan(config: &AppConfig) -> (String, PipelineConfig) {
    let query = config.outreach.query.trim().to_string();
    let session = config
        .outreach
        .session
        .clone()
        .unwrap_or_else(|| session_token(&config.linkedin.email, &query));
    let pipeline = PipelineConfig {
        query,
        max_targets: config.outreach.max_targets,
    };
    (session, pipeline)
}

/// Build the real collaborators from configuration and run a session.
pub async fn run(config: &AppConfig) -> Result<Summary> {
    config.validate()?;

    let (session, pipeline) = plan(config);
    let generator = PromptedGenerator::new(model_from_config(config)?, config.pitch.clone());

    let mut runner = Runner::new(pipeline);
    if config.checkpoint.enabled {
        runner = runner.with_checkpointer(Arc::new(FileCheckpointer::new(&config.checkpoint.dir)));
    }

    tracing::info!(
        session = %session,
        query = %runner.config.query,
        headless = config.browser.headless,
        checkpoints = config.checkpoint.enabled,
        "Starting outreach session"
    );

    let client = LinkedInBrowser::launch(&config.linkedin, &config.browser).await?;
    runner.execute(&client, &generator, &session).await
}
