//! Hardware side channel for `Action` messages.
//!
//! The hub hands actions off and never waits for them. Sinks log their own
//! failures; nothing propagates back into message dispatch.

use crate::config::ActionsConfig;
use signage_core::HardwareAction;
use std::collections::HashMap;

pub trait HardwareActionSink: Send + Sync {
    fn dispatch(&self, action: HardwareAction);
}

/// Records actions in the log and does nothing else.
#[derive(Debug, Default)]
pub struct LogActionSink;

impl HardwareActionSink for LogActionSink {
    fn dispatch(&self, action: HardwareAction) {
        tracing::info!(%action, "Hardware action requested (no handler configured)");
    }
}

/// Runs a configured command per action.
#[derive(Debug, Default)]
pub struct CommandActionSink {
    commands: HashMap<HardwareAction, (String, Vec<String>)>,
}

impl CommandActionSink {
    pub fn new(config: &ActionsConfig) -> Self {
        let commands = [
            HardwareAction::PowerOn,
            HardwareAction::PowerOff,
            HardwareAction::VolumeUp,
            HardwareAction::VolumeDown,
        ]
        .into_iter()
        .filter_map(|action| {
            let (program, args) = config.command(action)?.split_first()?;
            Some((action, (program.clone(), args.to_vec())))
        })
        .collect();
        Self { commands }
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl HardwareActionSink for CommandActionSink {
    fn dispatch(&self, action: HardwareAction) {
        let Some((program, args)) = self.commands.get(&action).cloned() else {
            tracing::warn!(%action, "No command configured for action, ignoring");
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(%action, "No runtime available to run action command");
            return;
        };

        handle.spawn(async move {
            match tokio::process::Command::new(&program).args(&args).status().await {
                Ok(status) if status.success() => {
                    tracing::info!(%action, "Action command completed");
                }
                Ok(status) => {
                    tracing::warn!(%action, %status, "Action command failed");
                }
                Err(e) => {
                    tracing::warn!(%action, "Failed to run action command {}: {}", program, e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_non_empty_commands_are_kept() {
        let config = ActionsConfig {
            power_on: Some(vec!["true".to_string()]),
            power_off: Some(vec![]),
            ..Default::default()
        };
        let sink = CommandActionSink::new(&config);
        assert!(sink.commands.contains_key(&HardwareAction::PowerOn));
        assert!(!sink.commands.contains_key(&HardwareAction::PowerOff));
        assert!(!sink.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_action_is_ignored() {
        let sink = CommandActionSink::default();
        assert!(sink.is_empty());
        sink.dispatch(HardwareAction::VolumeUp);
    }
}
