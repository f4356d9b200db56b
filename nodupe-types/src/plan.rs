use serde::{Deserialize, Serialize};

/// Keeper-selection strategy. `Interactive` is resolved by an injected
/// callback at plan time; this crate only names the choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Newest,
    Oldest,
    ShortestPath,
    Interactive,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Newest => "newest",
            Strategy::Oldest => "oldest",
            Strategy::ShortestPath => "shortest_path",
            Strategy::Interactive => "interactive",
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(Strategy::Newest),
            "oldest" => Ok(Strategy::Oldest),
            "shortest_path" => Ok(Strategy::ShortestPath),
            "interactive" => Ok(Strategy::Interactive),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionKind {
    Keep,
    Delete,
    Move,
    Hardlink,
    Archive,
}

/// One line item of a [`Plan`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub path: String,
    /// Set on MOVE/HARDLINK/ARCHIVE actions.
    pub target: Option<String>,
    /// Set on every non-KEEP action; the path of the group's keeper.
    pub keeper_path: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanStats {
    pub total_groups: u64,
    pub duplicates_found: u64,
    pub reassigned: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub strategy: String,
    pub catalog_version: String,
    pub generated_at: String,
    pub stats: PlanStats,
}

/// The serializable artifact `nodupe-plan` writes and `nodupe-exec` consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub metadata: PlanMetadata,
    pub actions: Vec<Action>,
}

impl Plan {
    /// Every path touched by a non-KEEP action, in plan order with
    /// duplicates removed as they occur (first occurrence wins).
    pub fn affected_paths(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.actions
            .iter()
            .filter(|a| a.kind != ActionKind::Keep)
            .map(|a| a.path.as_str())
            .filter(|p| seen.insert(*p))
            .collect()
    }
}
