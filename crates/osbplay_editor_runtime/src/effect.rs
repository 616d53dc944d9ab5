// SPDX-License-Identifier: MIT OR Apache-2.0
//! Effect lifecycle: loading, configuring and running one script.
//!
//! The effect driver is the only place that observes cancellation; it checks
//! the token before each phase and maps compile, load, execution and
//! cancellation outcomes onto [`EffectStatus`] values. Fatal statuses retain
//! the last run log for display.

use crate::generator::{GeneratorContext, GeneratorRun};
use crate::cancellation::CancellationToken;
use osbplay_editor_coordinator::KindRegistry;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of an effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EffectStatus {
    /// Created, nothing loaded yet
    #[default]
    Initializing,
    /// Script is being loaded
    Loading,
    /// Script configuration is running
    Configuring,
    /// Script generation is running
    Updating,
    /// Last run completed
    Ready,
    /// The script could not be compiled
    CompilationFailed,
    /// The script could not be loaded
    LoadingFailed,
    /// The script failed while running
    ExecutionFailed,
    /// The last run was cancelled
    UpdateCanceled,
}

impl EffectStatus {
    /// Whether this is a fatal state
    pub fn is_failed(self) -> bool {
        matches!(
            self,
            Self::CompilationFailed | Self::LoadingFailed | Self::ExecutionFailed
        )
    }
}

/// Why a script could not be produced
#[derive(Debug, Error)]
pub enum ScriptLoadError {
    /// The script source did not compile
    #[error("compilation failed: {0}")]
    Compilation(String),
    /// The compiled script could not be instantiated
    #[error("loading failed: {0}")]
    Loading(String),
}

/// A loaded storyboard script
pub trait Script: Send {
    /// Stable identifier, unchanged across reconfigurations
    fn identifier(&self) -> &str;

    /// Key grouping scripts onto one shared storyboard context.
    ///
    /// Defaults to the identifier; override for an explicit group.
    fn shared_context_key(&self) -> String {
        self.identifier().to_string()
    }

    /// Configuration phase, before generation
    fn configure(&mut self, run: &GeneratorRun<'_>) -> anyhow::Result<()> {
        let _ = run;
        Ok(())
    }

    /// Generation phase: emit storyboard objects through the run handle
    fn generate(&mut self, run: &GeneratorRun<'_>) -> anyhow::Result<()>;
}

/// Produces scripts from their identifiers
pub trait ScriptProvider {
    /// Load (or reload) the script behind an identifier
    fn load(&self, identifier: &str) -> Result<Box<dyn Script>, ScriptLoadError>;
}

/// Result of one effect update
#[derive(Debug, Clone)]
pub struct EffectOutcome {
    /// Final status of the run
    pub status: EffectStatus,
    /// Failure message, when fatal
    pub message: Option<String>,
    /// Accumulated run log
    pub log: String,
}

/// One storyboard effect: a script plus its lifecycle state
pub struct Effect {
    identifier: String,
    script: Option<Box<dyn Script>>,
    status: EffectStatus,
    message: Option<String>,
    log: String,
}

impl Effect {
    /// Create an effect for a script identifier
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            script: None,
            status: EffectStatus::Initializing,
            message: None,
            log: String::new(),
        }
    }

    /// The script identifier
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Current lifecycle state
    pub fn status(&self) -> EffectStatus {
        self.status
    }

    /// Last failure message
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Log retained from the last run
    pub fn log(&self) -> &str {
        &self.log
    }

    /// Shared-context key of the loaded script
    pub fn shared_context_key(&self) -> Option<String> {
        self.script.as_ref().map(|s| s.shared_context_key())
    }

    /// Load or reload the script through a provider
    pub fn load(&mut self, provider: &dyn ScriptProvider) -> EffectStatus {
        self.status = EffectStatus::Loading;
        self.message = None;
        match provider.load(&self.identifier) {
            Ok(script) => {
                self.script = Some(script);
            }
            Err(ScriptLoadError::Compilation(message)) => {
                tracing::warn!(effect = %self.identifier, %message, "compilation failed");
                self.status = EffectStatus::CompilationFailed;
                self.message = Some(message);
            }
            Err(ScriptLoadError::Loading(message)) => {
                tracing::warn!(effect = %self.identifier, %message, "loading failed");
                self.status = EffectStatus::LoadingFailed;
                self.message = Some(message);
            }
        }
        self.status
    }

    /// Run the loaded script against a generator context.
    ///
    /// Cancellation is checked before each phase and surfaces as
    /// [`EffectStatus::UpdateCanceled`], not as a failure.
    pub fn update(&mut self, context: &GeneratorContext, registry: &KindRegistry) -> EffectOutcome {
        let Some(mut script) = self.script.take() else {
            return self.finish(
                EffectStatus::ExecutionFailed,
                Some("no script loaded".to_string()),
                context,
            );
        };

        let token = context.cancellation_token();
        let (status, message) = {
            let run = context.activate();
            run_phases(&mut *script, &run, &token, registry)
        };
        self.script = Some(script);
        self.finish(status, message, context)
    }

    fn finish(
        &mut self,
        status: EffectStatus,
        message: Option<String>,
        context: &GeneratorContext,
    ) -> EffectOutcome {
        self.status = status;
        self.message = message.clone();
        self.log = context.log_text();
        tracing::debug!(effect = %self.identifier, ?status, "effect update finished");
        EffectOutcome {
            status,
            message,
            log: self.log.clone(),
        }
    }
}

fn run_phases(
    script: &mut dyn Script,
    run: &GeneratorRun<'_>,
    token: &CancellationToken,
    registry: &KindRegistry,
) -> (EffectStatus, Option<String>) {
    // Layer initialization
    if token.is_cancelled() {
        return (EffectStatus::UpdateCanceled, None);
    }

    // Configuration
    if let Err(error) = script.configure(run) {
        return (EffectStatus::ExecutionFailed, Some(format!("{error:#}")));
    }
    if token.is_cancelled() {
        return (EffectStatus::UpdateCanceled, None);
    }

    // Generation
    if let Err(error) = script.generate(run) {
        return (EffectStatus::ExecutionFailed, Some(format!("{error:#}")));
    }
    if token.is_cancelled() {
        return (EffectStatus::UpdateCanceled, None);
    }

    // Per-layer post-processing
    for layer in run.accessed_layers() {
        layer.post_process(registry);
    }
    (EffectStatus::Ready, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ProjectPaths;
    use osbplay_editor_coordinator::{Contributor, ContributorId};
    use osbplay_editor_storyboard::{Command, Easing, Origin, Sprite, StoryboardObject};

    struct FadePulses;

    impl Script for FadePulses {
        fn identifier(&self) -> &str {
            "scripts.FadePulses"
        }

        fn generate(&mut self, run: &GeneratorRun<'_>) -> anyhow::Result<()> {
            let layer = run.get_layer(Some("bg"))?;
            let mut sprite = Sprite::new("sb/pulse.png", Origin::Centre, [320.0, 240.0]);
            sprite.add_command(Command::fade(Easing::None, 0.0, 1000.0, 0.0, 1.0));
            sprite.add_command(Command::fade(Easing::None, 900.0, 1800.0, 1.0, 0.0));
            layer.add_object(StoryboardObject::Sprite(sprite), run.contributor().id);
            run.add_log("placed one pulse");
            Ok(())
        }
    }

    struct FailingScript;

    impl Script for FailingScript {
        fn identifier(&self) -> &str {
            "scripts.Failing"
        }

        fn generate(&mut self, _run: &GeneratorRun<'_>) -> anyhow::Result<()> {
            anyhow::bail!("texture not found: sb/missing.png")
        }
    }

    struct StubProvider(fn() -> Result<Box<dyn Script>, ScriptLoadError>);

    impl ScriptProvider for StubProvider {
        fn load(&self, _identifier: &str) -> Result<Box<dyn Script>, ScriptLoadError> {
            (self.0)()
        }
    }

    fn test_context() -> GeneratorContext {
        let dir = std::env::temp_dir();
        GeneratorContext::new(
            Contributor::new(ContributorId::new(), "fade-pulses", 0, 0),
            ProjectPaths {
                project_path: dir.clone(),
                asset_path: dir.clone(),
                mapset_path: dir,
            },
        )
    }

    #[test]
    fn test_successful_run_reaches_ready_and_fuses() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let mut effect = Effect::new("scripts.FadePulses");
        effect.load(&StubProvider(|| Ok(Box::new(FadePulses))));
        let context = test_context();

        let outcome = effect.update(&context, &KindRegistry::builtin());
        assert_eq!(outcome.status, EffectStatus::Ready);
        assert_eq!(outcome.log, "placed one pulse");
        assert!(!context.is_active());

        // post-processing fused the two overlapping fades
        let layer = context.get_layer(Some("bg")).unwrap();
        layer.with_objects(|objects| {
            assert_eq!(objects[0].as_sprite().unwrap().commands().len(), 1);
        });
    }

    #[test]
    fn test_cancellation_surfaces_as_status() {
        let mut effect = Effect::new("scripts.FadePulses");
        effect.load(&StubProvider(|| Ok(Box::new(FadePulses))));
        let context = test_context();
        context.add_log("from a previous phase");
        context.cancellation_token().cancel();

        let outcome = effect.update(&context, &KindRegistry::builtin());
        assert_eq!(outcome.status, EffectStatus::UpdateCanceled);
        assert!(!outcome.status.is_failed());
        // the last log is retained for display
        assert_eq!(outcome.log, "from a previous phase");
    }

    #[test]
    fn test_execution_failure_keeps_the_message() {
        let mut effect = Effect::new("scripts.Failing");
        effect.load(&StubProvider(|| Ok(Box::new(FailingScript))));
        let context = test_context();

        let outcome = effect.update(&context, &KindRegistry::builtin());
        assert_eq!(outcome.status, EffectStatus::ExecutionFailed);
        assert!(outcome.status.is_failed());
        assert!(outcome.message.unwrap().contains("sb/missing.png"));
    }

    #[test]
    fn test_load_failures_map_to_statuses() {
        let mut effect = Effect::new("scripts.Broken");
        let status = effect.load(&StubProvider(|| {
            Err(ScriptLoadError::Compilation("unexpected token".to_string()))
        }));
        assert_eq!(status, EffectStatus::CompilationFailed);
        assert_eq!(effect.message(), Some("unexpected token"));

        let status = effect.load(&StubProvider(|| {
            Err(ScriptLoadError::Loading("missing entry point".to_string()))
        }));
        assert_eq!(status, EffectStatus::LoadingFailed);
    }

    #[test]
    fn test_update_without_script_fails() {
        let mut effect = Effect::new("scripts.Empty");
        let outcome = effect.update(&test_context(), &KindRegistry::builtin());
        assert_eq!(outcome.status, EffectStatus::ExecutionFailed);
    }

    #[test]
    fn test_shared_context_key_defaults_to_identifier() {
        let mut effect = Effect::new("scripts.FadePulses");
        effect.load(&StubProvider(|| Ok(Box::new(FadePulses))));
        assert_eq!(
            effect.shared_context_key().as_deref(),
            Some("scripts.FadePulses")
        );
    }
}
