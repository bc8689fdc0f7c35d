use thiserror::Error;

/// Everything that can go wrong while parsing, navigating, or mutating
/// an HL7 element tree.
///
/// Every variant carries a stable numeric code (see [`ElementError::code`])
/// so callers can match on something more durable than the message text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElementError {
    /// `Message::parse` / `Message::build` was given a `None`/empty-by-contract input.
    #[error("[1001] message data must not be null")]
    MessageDataMustNotBeNull,

    /// The input was shorter than the minimum possible MSH (`MSH|^~\&|`, 8 characters).
    #[error("[1002] message data is too short (minimum length is 8 characters)")]
    MessageDataIsTooShort,

    /// The input did not begin with the literal `MSH`.
    #[error("[1003] message data must start with MSH")]
    MessageDataMustStartWithMsh,

    /// A segment was addressed with an index less than 1.
    #[error("[1004] segment index must be greater than zero")]
    SegmentIndexMustBeGreaterThanZero,

    /// Attempted to move MSH.1, MSH.2, a segment's type code, or the Message itself.
    #[error("[2001] element move forbidden: {0}")]
    ElementMoveForbidden(String),

    /// Attempted to delete the Message itself, or to bulk-delete elements with different parents.
    #[error("[2002] element delete forbidden: {0}")]
    ElementDeleteForbidden(String),

    /// `Move`'s target index was less than 1.
    #[error("[2003] move target index must be >= 1, got {0}")]
    ElementMoveIndexBelowMinimum(i64),

    /// A structural MSH fixed-position write took the wrong path (direct replacement
    /// instead of the dedicated MSH.1/MSH.2 rewrite).
    #[error("[2004] fixed field must not be moved: {0}")]
    FixedFieldMustNotBeMoved(String),
}

impl ElementError {
    /// The stable numeric code for this error, independent of locale or wording.
    pub fn code(&self) -> u32 {
        match self {
            ElementError::MessageDataMustNotBeNull => 1001,
            ElementError::MessageDataIsTooShort => 1002,
            ElementError::MessageDataMustStartWithMsh => 1003,
            ElementError::SegmentIndexMustBeGreaterThanZero => 1004,
            ElementError::ElementMoveForbidden(_) => 2001,
            ElementError::ElementDeleteForbidden(_) => 2002,
            ElementError::ElementMoveIndexBelowMinimum(_) => 2003,
            ElementError::FixedFieldMustNotBeMoved(_) => 2004,
        }
    }
}
