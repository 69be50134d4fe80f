use crate::core::errors::BTreeError;

/// Configuration for creating or opening a [`BTree`](crate::BTree).
#[derive(Debug, Clone)]
pub struct BTreeConfig {
    /// Minimum degree `t`. Non-root nodes hold between `t` and `2t` children.
    pub min_degree: usize,
    /// Check that both halves of every split end up with exactly `t` children.
    pub verify_splits: bool,
}

impl Default for BTreeConfig {
    fn default() -> Self {
        Self {
            min_degree: 2,
            verify_splits: true,
        }
    }
}

impl BTreeConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_degree(mut self, min_degree: usize) -> Self {
        self.min_degree = min_degree;
        self
    }

    pub fn verify_splits(mut self, enabled: bool) -> Self {
        self.verify_splits = enabled;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), BTreeError> {
        if self.min_degree < 2 {
            return Err(BTreeError::InvalidConfig(format!(
                "min_degree must be at least 2, got {}",
                self.min_degree
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degree_below_two() {
        let err = BTreeConfig::new().min_degree(1).validate().unwrap_err();
        assert!(matches!(err, BTreeError::InvalidConfig(_)));
        assert!(BTreeConfig::new().min_degree(2).validate().is_ok());
    }
}
