//! Checkpoint I/O

pub mod checkpoint;

pub use checkpoint::{
    load_checkpoint, restore_parameters, save_checkpoint, CheckpointTensors,
};
