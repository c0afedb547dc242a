//! Suite launcher
//!
//! Builds the Cypress invocation for one feature and tag and runs it with
//! inherited stdio, exiting with the runner's status.

use clap::Args;
use std::process::Command;
use tracing::{error, info};

/// Program used to start the runner
pub const RUNNER_PROGRAM: &str = "npx";

/// Directory searched for feature files
pub const FEATURES_DIR: &str = "cypress/e2e/features";

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Target environment, passed to the suite as `version`
    pub environment: String,

    /// Feature file name without the `.feature` extension
    pub feature: String,

    /// Scenario tag without the leading `@`
    pub tag: String,

    /// Print the command without running it
    #[arg(long)]
    pub dry_run: bool,
}

/// One suite invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteLaunch {
    pub environment: String,
    pub feature: String,
    pub tag: String,
}

impl SuiteLaunch {
    pub fn new(
        environment: impl Into<String>,
        feature: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            environment: environment.into(),
            feature: feature.into(),
            tag: tag.into(),
        }
    }

    /// Glob matching the feature file anywhere under [`FEATURES_DIR`]
    pub fn spec_pattern(&self) -> String {
        format!("{}/**/{}.feature", FEATURES_DIR, self.feature)
    }

    /// Values for the runner's `--env` option
    pub fn env_arg(&self) -> String {
        format!(
            "allure=true,version={},amb=LOCAL,tags=@{}",
            self.environment, self.tag
        )
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            "cypress".to_string(),
            "run".to_string(),
            "--headed".to_string(),
            "--spec".to_string(),
            self.spec_pattern(),
            "--env".to_string(),
            self.env_arg(),
        ]
    }

    /// Command line as a single string, for logs
    pub fn display(&self) -> String {
        std::iter::once(RUNNER_PROGRAM.to_string())
            .chain(self.args())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn command(&self) -> Command {
        let mut command = Command::new(RUNNER_PROGRAM);
        command.args(self.args());
        command
    }
}

pub async fn execute(args: RunArgs) -> anyhow::Result<()> {
    let launch = SuiteLaunch::new(args.environment, args.feature, args.tag);

    if args.dry_run {
        println!("{}", launch.display());
        return Ok(());
    }

    info!("Running: {}", launch.display());
    let status = launch
        .command()
        .status()
        .map_err(|e| anyhow::anyhow!("failed to start {}: {}", RUNNER_PROGRAM, e))?;

    if !status.success() {
        let code = status.code().unwrap_or(1);
        error!("Suite exited with status {}", code);
        std::process::exit(code);
    }

    info!("Suite passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let launch = SuiteLaunch::new("QA", "login", "smoke");
        assert_eq!(
            launch.display(),
            "npx cypress run --headed --spec cypress/e2e/features/**/login.feature \
             --env allure=true,version=QA,amb=LOCAL,tags=@smoke"
        );
    }

    #[test]
    fn test_spec_pattern_is_one_argument() {
        let launch = SuiteLaunch::new("stage", "checkout flow", "regression");
        let args = launch.args();
        assert_eq!(args.len(), 7);
        assert_eq!(args[4], "cypress/e2e/features/**/checkout flow.feature");
        assert_eq!(args[6], "allure=true,version=stage,amb=LOCAL,tags=@regression");
    }

    #[test]
    fn test_command_program() {
        let command = SuiteLaunch::new("QA", "login", "smoke").command();
        assert_eq!(command.get_program(), RUNNER_PROGRAM);
        assert_eq!(command.get_args().count(), 7);
    }
}
