use crate::store::StoreError;
use std::fmt;

/// Staff commands that change queue state upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueCommand {
    Advance,
    Remove,
    EmergencyInsert,
}

impl fmt::Display for QueueCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueueCommand::Advance => "advance",
            QueueCommand::Remove => "remove",
            QueueCommand::EmergencyInsert => "emergency-insert",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid patient identifier: {0}")]
    InvalidIdentifier(#[from] queue_types::TypesError),

    /// A refresh could not fetch the queue. The last known order is kept.
    #[error("queue refresh failed, showing last known order: {0}")]
    Fetch(#[source] StoreError),

    /// A command's effect was not confirmed upstream. Local state is unchanged.
    #[error("{command} failed: {source}")]
    CommandFailed {
        command: QueueCommand,
        #[source]
        source: StoreError,
    },

    #[error("patient not found: {0}")]
    PatientNotFound(String),

    #[error("queue controller has been shut down")]
    ShutDown,
}

pub type QueueResult<T> = std::result::Result<T, QueueError>;
