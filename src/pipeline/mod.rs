pub mod stage;
pub mod state;

use crate::automation::AutomationClient;
use crate::error::Result;
use crate::generator::{MessageGenerator, MessageStage};

use stage::Stage;
use state::{collect_targets, OutreachState, Target};

/// Search settings for the discovery stage.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub query: String,
    pub max_targets: usize,
}

/// The outreach sequence: discover targets, then walk each one through
/// connect, qualify, present, resolve and close.
///
/// Every stage after discovery is a no-op once the cursor has run past the
/// last target, so replaying from a saved cursor skips finished targets.
pub struct Pipeline<'a> {
    client: &'a dyn AutomationClient,
    generator: &'a dyn MessageGenerator,
    config: PipelineConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        client: &'a dyn AutomationClient,
        generator: &'a dyn MessageGenerator,
        config: PipelineConfig,
    ) -> Self {
        Self {
            client,
            generator,
            config,
        }
    }

    /// Drive a state from discovery to completion.
    pub async fn run(&self, state: OutreachState) -> Result<OutreachState> {
        self.run_from(Stage::ENTRY, state).await
    }

    /// Drive a state to completion starting at `stage`.
    pub async fn run_from(&self, stage: Stage, mut state: OutreachState) -> Result<OutreachState> {
        let mut next = Some(stage);
        while let Some(stage) = next {
            next = self.step(stage, &mut state).await?;
        }
        Ok(state)
    }

    /// Execute one stage and return the stage that follows it.
    pub async fn step(&self, stage: Stage, state: &mut OutreachState) -> Result<Option<Stage>> {
        match stage {
            Stage::Discover => self.discover(state).await?,
            Stage::Connect => self.connect(state).await?,
            Stage::Qualify | Stage::Present | Stage::Resolve => self.follow_up(stage, state).await?,
            Stage::Close => self.close(state).await?,
        }
        Ok(stage.next(state))
    }

    async fn discover(&self, state: &mut OutreachState) -> Result<()> {
        if !state.targets.is_empty() {
            tracing::debug!(targets = state.targets.len(), "Targets already discovered");
            return Ok(());
        }

        let found = self
            .client
            .search(&self.config.query, self.config.max_targets)
            .await?;
        state.targets = collect_targets(found, self.config.max_targets);

        tracing::info!(
            query = %self.config.query,
            targets = state.targets.len(),
            "Discovered targets"
        );
        Ok(())
    }

    async fn connect(&self, state: &OutreachState) -> Result<()> {
        let Some(target) = state.current() else {
            return Ok(());
        };

        tracing::info!(
            profile = %target.id,
            name = %target.display_name,
            position = state.cursor + 1,
            total = state.targets.len(),
            "Connecting"
        );

        let note = self
            .generator
            .generate(MessageStage::Sales, &target.display_name)
            .await?;

        match self.client.connect(&target.id, &note).await {
            Ok(true) => tracing::info!(profile = %target.id, "Connection request sent"),
            Ok(false) => tracing::warn!(profile = %target.id, "Connect unavailable; continuing"),
            Err(e) => tracing::warn!(profile = %target.id, error = %e, "Connect failed; continuing"),
        }
        Ok(())
    }

    async fn follow_up(&self, stage: Stage, state: &OutreachState) -> Result<()> {
        let Some(target) = state.current() else {
            return Ok(());
        };
        let Some(kind) = stage.message() else {
            return Ok(());
        };
        self.message(stage, kind, target).await
    }

    async fn close(&self, state: &mut OutreachState) -> Result<()> {
        let Some(target) = state.current() else {
            return Ok(());
        };
        self.message(Stage::Close, MessageStage::Closing, target)
            .await?;

        // Reaching Close counts as success whether or not the messages were delivered.
        state.complete_current(true);

        tracing::info!(
            completed = state.cursor,
            total = state.targets.len(),
            "Target processed"
        );
        Ok(())
    }

    async fn message(&self, stage: Stage, kind: MessageStage, target: &Target) -> Result<()> {
        let text = self.generator.generate(kind, &target.display_name).await?;

        match self.client.send_message(&target.id, &text).await {
            Ok(true) => tracing::info!(profile = %target.id, stage = %stage, "Message sent"),
            Ok(false) => {
                tracing::warn!(profile = %target.id, stage = %stage, "Message not sent; continuing")
            }
            Err(e) => tracing::warn!(
                profile = %target.id,
                stage = %stage,
                error = %e,
                "Message failed; continuing"
            ),
        }
        Ok(())
    }
}
