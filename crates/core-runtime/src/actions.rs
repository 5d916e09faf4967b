//! Deferred stack mutations queued by behaviors and executed by the
//! driver after the current behavior chain finishes.

use std::fmt;

use crate::block::RuntimeBlock;

pub enum RuntimeAction {
    /// Push a fully built block; its mount chain runs before the next
    /// action executes.
    PushBlock(RuntimeBlock),
    /// Pop the current top frame through unmount/dispose.
    PopBlock,
    /// Compile the statement group and push the result. A compilation
    /// failure is logged and skipped; the requesting frame continues.
    CompileChild { statement_ids: Vec<u32> },
    /// Publish what the requesting frame will compile next (UI "up next").
    UpdateNextPreview { statement_ids: Vec<u32> },
    /// Push a synthetic rest countdown sized by the requesting container.
    InjectRest { duration_ms: u64 },
}

impl fmt::Debug for RuntimeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PushBlock(block) => f.debug_tuple("PushBlock").field(block.key()).finish(),
            Self::PopBlock => f.write_str("PopBlock"),
            Self::CompileChild { statement_ids } => f
                .debug_struct("CompileChild")
                .field("statement_ids", statement_ids)
                .finish(),
            Self::UpdateNextPreview { statement_ids } => f
                .debug_struct("UpdateNextPreview")
                .field("statement_ids", statement_ids)
                .finish(),
            Self::InjectRest { duration_ms } => f
                .debug_struct("InjectRest")
                .field("duration_ms", duration_ms)
                .finish(),
        }
    }
}
