//! Scalar types shared across the workspace.

/// Node names are small signed integers allocated from a monotonic counter.
pub type SignedInteger = i32;

/// Alias making signatures read in terms of the graph rather than machine types.
pub type NodeName = SignedInteger;

/// A coordinate on the (continuous) genomic interval.
pub type Position = f64;

/// A point in generations before the present.
pub type Time = f64;
