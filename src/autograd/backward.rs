//! Backward operation trait for the gradient tape

/// A recorded operation that can propagate gradients to its inputs.
///
/// Each op function builds one of these when any input requires gradients.
/// Calling `backward` reads the result's gradient cell, accumulates into the
/// inputs, and recurses into the inputs' own recorded ops.
pub trait BackwardOp {
    /// Propagate gradients backward through this operation
    fn backward(&self);
}
