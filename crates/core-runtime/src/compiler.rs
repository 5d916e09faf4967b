//! Seam between the driver and the JIT compiler. The driver only knows
//! this trait; the strategy chain lives in its own crate.

use thiserror::Error;

use core_fragments::Fragment;
use core_script::{Script, ScriptError};
use core_timing::EpochMs;

use crate::block::{KeyGenerator, RuntimeBlock};

/// One compilation request: a statement group plus the fragments the
/// parent promotes into the child for the current round.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub statement_ids: Vec<u32>,
    pub promote: Vec<Fragment>,
    /// Set only for the run's root sequence.
    pub is_root: bool,
}

impl CompileRequest {
    pub fn root(statement_ids: Vec<u32>) -> Self {
        Self {
            statement_ids,
            promote: Vec::new(),
            is_root: true,
        }
    }

    pub fn child(statement_ids: Vec<u32>, promote: Vec<Fragment>) -> Self {
        Self {
            statement_ids,
            promote,
            is_root: false,
        }
    }
}

/// Runtime facilities a compilation may use.
pub struct CompileServices<'a> {
    pub script: &'a Script,
    pub keys: &'a mut KeyGenerator,
    pub now: EpochMs,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("no strategy matched statements {statement_ids:?}")]
    NoStrategy { statement_ids: Vec<u32> },
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("strategy contract violated: {0}")]
    Contract(String),
}

pub trait BlockCompiler {
    fn compile(
        &self,
        request: &CompileRequest,
        services: &mut CompileServices<'_>,
    ) -> Result<RuntimeBlock, CompileError>;
}
