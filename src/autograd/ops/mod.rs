//! Autograd operations

mod activations;
mod basic;
mod conv;
mod normalize;

pub use activations::{leaky_relu, relu, tanh};
pub use basic::{add, mean, reshape, scale, sub, sum};
pub use conv::{conv2d, conv_transpose2d};
pub use normalize::{batch_norm2d, instance_norm2d};
