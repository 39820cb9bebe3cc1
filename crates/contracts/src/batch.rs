//! Batch - BatchAccumulator output
//!
//! Sealed, immutable group of commands delivered to every consumer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A single input line. Opaque payload, never mutated after creation.
pub type Command = String;

/// Sealed batch of commands
///
/// Cloning is cheap: the command list is shared, so every consumer gets
/// its own `Batch` value without copying the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBatch")]
pub struct Batch {
    /// Seal sequence number (starts at 1, monotonically increasing)
    seq: u64,

    /// Commands in insertion order
    commands: Arc<[Command]>,

    /// Time the first command of this batch was recorded
    created_at: DateTime<Utc>,
}

impl Batch {
    /// Build a batch from sealed commands.
    ///
    /// Returns `None` for an empty command list: a batch is never empty.
    pub fn new(seq: u64, commands: Vec<Command>, created_at: DateTime<Utc>) -> Option<Self> {
        if commands.is_empty() {
            return None;
        }
        Some(Self {
            seq,
            commands: commands.into(),
            created_at,
        })
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Render as a single output line: `bulk: a, b, c\n`
    pub fn render(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bulk: {}", self.commands.join(", "))
    }
}

/// Deserialized form, checked by `Batch::new`
#[derive(Deserialize)]
struct RawBatch {
    seq: u64,
    commands: Vec<Command>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RawBatch> for Batch {
    type Error = &'static str;

    fn try_from(raw: RawBatch) -> Result<Self, Self::Error> {
        Batch::new(raw.seq, raw.commands, raw.created_at).ok_or("batch has no commands")
    }
}

/// Why the accumulator sealed a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SealReason {
    /// Pending commands reached the configured capacity outside any group
    Capacity,
    /// A group-start marker flushed the implicit batch before opening
    GroupOpened,
    /// The outermost group was closed
    GroupClosed,
    /// Termination flushed a partial batch
    Shutdown,
}

impl SealReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Capacity => "capacity",
            Self::GroupOpened => "group_opened",
            Self::GroupClosed => "group_closed",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for SealReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands(items: &[&str]) -> Vec<Command> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_batch_rejected() {
        assert!(Batch::new(1, Vec::new(), Utc::now()).is_none());
    }

    #[test]
    fn test_render_joins_commands() {
        let batch = Batch::new(1, commands(&["cmd1", "cmd2", "cmd3"]), Utc::now()).unwrap();
        assert_eq!(batch.render(), "bulk: cmd1, cmd2, cmd3\n");
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_clone_shares_commands() {
        let batch = Batch::new(4, commands(&["a", "a"]), Utc::now()).unwrap();
        let copy = batch.clone();
        assert!(Arc::ptr_eq(&batch.commands, &copy.commands));
        assert_eq!(copy.commands(), &["a".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_batch_json_shape() {
        let batch = Batch::new(2, commands(&["x"]), Utc::now()).unwrap();
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["seq"], 2);
        assert_eq!(json["commands"][0], "x");
    }

    #[test]
    fn test_deserialize_rejects_empty_batch() {
        let json = r#"{"seq":1,"commands":[],"created_at":"2023-11-14T22:13:20Z"}"#;
        assert!(serde_json::from_str::<Batch>(json).is_err());

        let json = r#"{"seq":1,"commands":["a"],"created_at":"2023-11-14T22:13:20Z"}"#;
        let batch: Batch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.render(), "bulk: a\n");
    }

    #[test]
    fn test_seal_reason_names() {
        assert_eq!(SealReason::GroupOpened.to_string(), "group_opened");
        assert_eq!(SealReason::Shutdown.as_str(), "shutdown");
    }
}
