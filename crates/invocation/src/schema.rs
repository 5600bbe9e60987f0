//! Canonical wire field names for the action request envelope.
//!
//! The envelope is a JSON object with camelCase keys. These constants are the
//! single source of truth for field names used in validation messages.

// ---------------------------------------------------------------------------
// Envelope fields
// ---------------------------------------------------------------------------

pub const REQUEST_ID: &str = "requestId";
pub const RECORD_ID: &str = "recordId";
pub const SELECTOR: &str = "selector";
pub const ACTION_KIND: &str = "actionKind";
pub const BLOCK_FLAG: &str = "blockFlag";
pub const TARGET_REFS: &str = "targetRefs";
pub const ISSUED_AT: &str = "issuedAt";

// ---------------------------------------------------------------------------
// Selector fields
// ---------------------------------------------------------------------------

pub const ORDINAL: &str = "ordinal";
pub const LOGICAL_INDEX: &str = "logicalIndex";
pub const LABEL: &str = "label";
