//! Variance-stabilising transformations applied before training and undone
//! on every prediction.

pub mod transformation;

pub use transformation::TransformKind;
