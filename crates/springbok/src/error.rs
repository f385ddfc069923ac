#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The layout model and the client graph disagree about which nodes/edges exist.
    #[error("layout model is inconsistent with the client graph: {reason}")]
    Inconsistency { reason: String },

    #[error("cannot delete a node that still has {edges} incident edge(s)")]
    StillHasEdges { edges: usize },

    #[error("invalid layout config: {field} = {value}")]
    InvalidConfig { field: &'static str, value: String },
}

impl Error {
    pub(crate) fn inconsistency(reason: impl Into<String>) -> Self {
        Self::Inconsistency {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
