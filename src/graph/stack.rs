//! Active resolution path used for immediate cycle detection.

use crate::error::{CircularDependencyError, DiError, DiResult};

const MAX_DEPTH: usize = 1024;

/// Identifiers on the active synchronous resolution chain, outermost first.
///
/// Pushing an identifier that is already on the stack is itself a cycle.
#[derive(Debug, Clone, Default)]
pub struct ResolutionStack {
    frames: Vec<String>,
}

impl ResolutionStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `identifier`, failing if it is already on the path.
    pub fn push(&mut self, identifier: &str) -> DiResult<()> {
        // detect before pushing
        self.check(identifier)?;

        if self.frames.len() >= MAX_DEPTH {
            return Err(DiError::DepthExceeded(self.frames.len()));
        }

        self.frames.push(identifier.to_string());
        Ok(())
    }

    /// Fails with the cyclic sub-path if `identifier` is already on the path.
    pub fn check(&self, identifier: &str) -> DiResult<()> {
        match self.cycle_error(identifier) {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// The cycle re-entering `identifier` would close, if it is on the path.
    pub fn cycle_error(&self, identifier: &str) -> Option<CircularDependencyError> {
        let pos = self.position(identifier)?;
        let mut cycle = self.frames[pos..].to_vec();
        cycle.push(identifier.to_string());
        Some(CircularDependencyError::new(self.frames.clone(), cycle))
    }

    /// Removes `identifier` and anything pushed above it.
    pub fn pop(&mut self, identifier: &str) {
        if let Some(pos) = self.frames.iter().rposition(|f| f == identifier) {
            debug_assert_eq!(pos, self.frames.len() - 1, "resolution stack popped out of order");
            self.frames.truncate(pos);
        }
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.position(identifier).is_some()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    fn position(&self, identifier: &str) -> Option<usize> {
        self.frames.iter().position(|f| f == identifier)
    }
}
