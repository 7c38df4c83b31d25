//! Structural self-checks for the layer arena and the trap tree.
//!
//! Mutating operations run [`debug_invariants!`](crate::debug_invariants)
//! once they have committed. The check compiles to nothing in release builds
//! unless the `check-invariants` feature is enabled.

use crate::layer_error::LayerError;

/// A structure that can verify its own bookkeeping.
pub trait DebugInvariants {
    /// Returns the first broken invariant as [`LayerError::InvariantViolation`].
    fn validate_invariants(&self) -> Result<(), LayerError>;

    /// Panics on a broken invariant when checks are compiled in.
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "debug_assert_invariants");
    }
}

/// Panics with `$context` if `$check` returns an error, when invariant
/// checking is compiled in.
#[macro_export]
macro_rules! debug_invariants {
    ($check:expr, $context:literal) => {
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        if let Err(err) = $check {
            panic!("{} left broken invariants: {}", $context, err);
        }
    };
}
