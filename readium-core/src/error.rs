use thiserror::Error;

use crate::DocumentId;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("malformed annotation import: {0}")]
    MalformedImport(#[from] serde_json::Error),
    #[error("page order {proposed:?} is not a permutation of {current:?}")]
    InvalidPageOrder { proposed: Vec<u32>, current: Vec<u32> },
    #[error("visual page index {index} out of range for {len} pages")]
    PageIndexOutOfRange { index: usize, len: usize },
    #[error("refusing to remove the last visible page")]
    LastPage,
    #[error("unknown document session {0}")]
    UnknownDocument(DocumentId),
}
