//! Build lifecycle stages

use serde::Serialize;
use std::fmt;

/// Ordered checkpoints a build passes through, forward only
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Created,
    LoadSettings,
    Configure,
    TaskGraph,
    RunTasks,
    Finished,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Created => "created",
            Stage::LoadSettings => "load-settings",
            Stage::Configure => "configure",
            Stage::TaskGraph => "task-graph",
            Stage::RunTasks => "run-tasks",
            Stage::Finished => "finished",
        }
    }

    /// The stage that follows this one, or None after `Finished`
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Created => Some(Stage::LoadSettings),
            Stage::LoadSettings => Some(Stage::Configure),
            Stage::Configure => Some(Stage::TaskGraph),
            Stage::TaskGraph => Some(Stage::RunTasks),
            Stage::RunTasks => Some(Stage::Finished),
            Stage::Finished => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_ordered() {
        assert!(Stage::Created < Stage::LoadSettings);
        assert!(Stage::LoadSettings < Stage::Configure);
        assert!(Stage::Configure < Stage::TaskGraph);
        assert!(Stage::TaskGraph < Stage::RunTasks);
        assert!(Stage::RunTasks < Stage::Finished);
    }

    #[test]
    fn next_walks_forward() {
        let mut stage = Stage::Created;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            seen.push(next);
            stage = next;
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(stage, Stage::Finished);
    }
}
