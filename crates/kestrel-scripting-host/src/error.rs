use kestrel_world::EntityId;

/// Failure raised while a dialog script or hook fragment runs
#[derive(Debug, thiserror::Error)]
pub enum DialogError {
    #[error("dialog script failed: {0}")]
    Script(String),

    /// The continuation suspended on something other than a selection.
    /// Dialog scripts are only resumed by client replies.
    #[error("dialog suspended without waiting for a reply")]
    Stalled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl DialogError {
    pub fn script(message: impl Into<String>) -> Self {
        DialogError::Script(message.into())
    }
}

/// Reasons a conversation could not be started
#[derive(Debug, thiserror::Error)]
pub enum TalkError {
    #[error("{0} has nothing to say")]
    NoScript(EntityId),

    #[error("{target} is out of range ({distance:.0} > {range:.0})")]
    OutOfRange {
        target: EntityId,
        distance: f64,
        range: f64,
    },

    #[error("{target} requires authority {required}, talker has {actual}")]
    Unauthorized {
        target: EntityId,
        required: u8,
        actual: u8,
    },

    #[error(transparent)]
    Dialog(#[from] DialogError),
}
