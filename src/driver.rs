//! The driver context: one explicit handle owning the compiler-frontend
//! binding, passed to every subsystem that parses source code. There is no
//! process-global frontend state.

use std::sync::Arc;

use crate::frontend::{Frontend, TokenFrontend};

pub struct Driver {
    frontend: Arc<dyn Frontend>,
}

impl Driver {
    pub fn new() -> Self {
        Self::with_frontend(Arc::new(TokenFrontend))
    }

    /// Swap in a different frontend binding (tests, alternative pipelines).
    pub fn with_frontend(frontend: Arc<dyn Frontend>) -> Self {
        Self { frontend }
    }

    pub fn frontend(&self) -> &dyn Frontend {
        self.frontend.as_ref()
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}
