//! Dataset access and image preprocessing

mod image;
mod loader;

pub use image::{batch_tensor, decode_base64, preprocess_base64, preprocess_bytes};
pub use loader::{BatchIter, FaceDataset, ImageBatch, Label};
