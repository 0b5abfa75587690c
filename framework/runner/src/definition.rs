use std::collections::HashSet;
use std::time::Duration;

use perf_harness_summary_model::{AppInfo, SampleScope};

use crate::cli::HarnessCli;
use crate::context::{RunnerContext, UserValuesConstraint};

pub type HookResult = anyhow::Result<()>;

pub type HookMut<V> = fn(&mut RunnerContext<V>) -> HookResult;

const DEFAULT_ABILITY: &str = "EntryAbility";

/// One named, timed step of a scenario.
pub struct StepDefinition<V: UserValuesConstraint> {
    pub name: String,
    pub description: String,
    /// How long the step is expected to take. Sampling runs for this long.
    pub expected_duration: Duration,
    pub scope: SampleScope,
    pub action: HookMut<V>,
}

/// The builder for a scenario definition.
///
/// This must be used at the start of a scenario binary to define the steps that you want to run.
pub struct ScenarioDefinitionBuilder<V: UserValuesConstraint> {
    /// The name of the scenario, which should be unique within the test suite.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    /// This value is initialised for you and you cannot change it.
    #[doc(hidden)]
    cli: HarnessCli,
    app: Option<AppInfo>,
    ability: String,
    /// Setup hook for this scenario. It will be run once, before the first step.
    setup_fn: Option<HookMut<V>>,
    /// Teardown hook for this scenario. It is run once after the last step, even if a step
    /// failed. Errors are logged and otherwise ignored.
    teardown_fn: Option<HookMut<V>>,
    steps: Vec<StepDefinition<V>>,
}

pub struct ScenarioDefinition<V: UserValuesConstraint> {
    pub name: String,
    pub cli: HarnessCli,
    pub app: AppInfo,
    pub ability: String,
    pub setup_fn: Option<HookMut<V>>,
    pub teardown_fn: Option<HookMut<V>>,
    pub steps: Vec<StepDefinition<V>>,
}

impl<V: UserValuesConstraint> ScenarioDefinitionBuilder<V> {
    /// Initialise a new scenario definition from the scenario name and parsed command line
    /// arguments. See the [ScenarioDefinitionBuilder::name] for more information about the name.
    pub fn new(name: &str, cli: HarnessCli) -> Self {
        Self {
            name: name.to_string(),
            cli,
            app: None,
            ability: DEFAULT_ABILITY.to_string(),
            setup_fn: None,
            teardown_fn: None,
            steps: Vec::new(),
        }
    }

    /// Initialise logging, parse the command line and create a new scenario definition.
    pub fn new_with_init(name: &str) -> Self {
        Self::new(name, crate::init::init())
    }

    /// Set the app under test.
    pub fn with_app(mut self, package: &str, name: &str) -> Self {
        self.app = Some(AppInfo {
            package: package.to_string(),
            name: name.to_string(),
        });
        self
    }

    /// Set the ability that [RunnerContext::start_app] launches. Defaults to `EntryAbility`.
    pub fn with_ability(mut self, ability: &str) -> Self {
        self.ability = ability.to_string();
        self
    }

    /// Set the setup hook [ScenarioDefinitionBuilder::setup_fn] for this scenario.
    pub fn use_setup(mut self, setup_fn: HookMut<V>) -> Self {
        self.setup_fn = Some(setup_fn);
        self
    }

    /// Set the teardown hook [ScenarioDefinitionBuilder::teardown_fn] for this scenario.
    pub fn use_teardown(mut self, teardown_fn: HookMut<V>) -> Self {
        self.teardown_fn = Some(teardown_fn);
        self
    }

    /// Add a step which samples the processes of the app under test.
    pub fn add_step(
        self,
        name: &str,
        description: &str,
        expected_duration_s: u64,
        action: HookMut<V>,
    ) -> Self {
        self.push_step(name, description, expected_duration_s, SampleScope::App, action)
    }

    /// Add a step which samples every process on the device, for flows that cross into other
    /// apps or system services.
    pub fn add_step_all_processes(
        self,
        name: &str,
        description: &str,
        expected_duration_s: u64,
        action: HookMut<V>,
    ) -> Self {
        self.push_step(
            name,
            description,
            expected_duration_s,
            SampleScope::AllProcesses,
            action,
        )
    }

    fn push_step(
        mut self,
        name: &str,
        description: &str,
        expected_duration_s: u64,
        scope: SampleScope,
        action: HookMut<V>,
    ) -> Self {
        self.steps.push(StepDefinition {
            name: name.to_string(),
            description: description.to_string(),
            expected_duration: Duration::from_secs(expected_duration_s),
            scope,
            action,
        });
        self
    }

    pub(crate) fn build(self) -> anyhow::Result<ScenarioDefinition<V>> {
        let app = self
            .app
            .ok_or_else(|| anyhow::anyhow!("Scenario [{}] has no app, use `with_app`", self.name))?;

        if app.package.is_empty() {
            anyhow::bail!("Scenario [{}] has an empty package name", self.name);
        }

        if self.steps.is_empty() {
            anyhow::bail!("Scenario [{}] has no steps", self.name);
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.name.as_str()) {
                anyhow::bail!("Step [{}] is already defined", step.name);
            }
            if step.expected_duration.is_zero() {
                anyhow::bail!("Step [{}] must have a non-zero duration", step.name);
            }
        }

        Ok(ScenarioDefinition {
            name: self.name,
            cli: self.cli,
            app,
            ability: self.ability,
            setup_fn: self.setup_fn,
            teardown_fn: self.teardown_fn,
            steps: self.steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_ctx: &mut RunnerContext<()>) -> HookResult {
        Ok(())
    }

    fn builder() -> ScenarioDefinitionBuilder<()> {
        ScenarioDefinitionBuilder::new("demo", HarnessCli::default()).with_app("com.example.shop", "Shop")
    }

    #[test]
    fn build_keeps_step_order_and_scope() {
        let definition = builder()
            .add_step("open", "Open the app", 3, noop)
            .add_step_all_processes("share", "Share to another app", 5, noop)
            .build()
            .unwrap();

        let names: Vec<_> = definition.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(vec!["open", "share"], names);
        assert_eq!(SampleScope::App, definition.steps[0].scope);
        assert_eq!(SampleScope::AllProcesses, definition.steps[1].scope);
        assert_eq!(Duration::from_secs(5), definition.steps[1].expected_duration);
        assert_eq!("EntryAbility", definition.ability);
    }

    #[test]
    fn reject_duplicate_step_names() {
        let result = builder()
            .add_step("open", "", 3, noop)
            .add_step("open", "", 3, noop)
            .build();

        assert_eq!(
            "Step [open] is already defined",
            result.err().unwrap().to_string()
        );
    }

    #[test]
    fn reject_zero_duration() {
        assert!(builder().add_step("open", "", 0, noop).build().is_err());
    }

    #[test]
    fn reject_missing_app() {
        let result = ScenarioDefinitionBuilder::<()>::new("demo", HarnessCli::default())
            .add_step("open", "", 3, noop)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn reject_empty_steps() {
        assert!(builder().build().is_err());
    }
}
