//! Checkpoint persistence
//!
//! Checkpoints are safetensors files: an opaque mapping from parameter name
//! to an f32 tensor, one file per network. No architecture metadata is
//! relied upon for reconstruction; the loader matches names and shapes
//! against the instantiated network and fails loudly on mismatch.

use std::collections::HashMap;
use std::path::Path;

use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};

use crate::{Error, Result, Tensor};

/// Serialize named parameters to a safetensors file.
///
/// `architecture` and a creation timestamp land in the file's free-form
/// metadata block; they are informational only.
pub fn save_checkpoint(
    named: &[(String, Tensor)],
    architecture: &str,
    path: &Path,
) -> Result<()> {
    let buffers: Vec<(String, Vec<usize>, Vec<u8>)> = named
        .iter()
        .map(|(name, tensor)| {
            let data = tensor.data();
            let bytes: &[f32] = data.as_slice().expect("parameter data is contiguous");
            (name.clone(), tensor.shape().to_vec(), bytemuck::cast_slice(bytes).to_vec())
        })
        .collect();

    let views: Vec<(&str, TensorView)> = buffers
        .iter()
        .map(|(name, shape, bytes)| {
            let view = TensorView::new(Dtype::F32, shape.clone(), bytes)
                .map_err(|e| Error::Serialization { message: format!("tensor '{name}': {e:?}") })?;
            Ok((name.as_str(), view))
        })
        .collect::<Result<_>>()?;

    let mut metadata = HashMap::new();
    metadata.insert("architecture".to_string(), architecture.to_string());
    metadata.insert("created_at".to_string(), chrono::Utc::now().to_rfc3339());

    let data = safetensors::serialize(views, &Some(metadata))
        .map_err(|e| Error::Serialization { message: format!("safetensors encoding: {e:?}") })?;

    std::fs::write(path, data)
        .map_err(|e| Error::CheckpointIo { path: path.to_path_buf(), message: e.to_string() })
}

/// A loaded checkpoint: name → (shape, values)
#[derive(Debug)]
pub struct CheckpointTensors {
    tensors: HashMap<String, (Vec<usize>, Vec<f32>)>,
    /// Architecture string from the metadata block, if present
    pub architecture: Option<String>,
}

impl CheckpointTensors {
    /// Build an in-memory checkpoint from named parameters (no file round
    /// trip), e.g. to freeze a live network for inference.
    pub fn from_named(named: &[(String, Tensor)]) -> Self {
        let tensors = named
            .iter()
            .map(|(name, tensor)| {
                (name.clone(), (tensor.shape().to_vec(), tensor.data().to_vec()))
            })
            .collect();
        Self { tensors, architecture: None }
    }

    /// Look up a tensor by name
    pub fn get(&self, name: &str) -> Option<&(Vec<usize>, Vec<f32>)> {
        self.tensors.get(name)
    }

    /// Number of tensors in the checkpoint
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Whether the checkpoint holds no tensors
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

/// Read a safetensors checkpoint from disk
pub fn load_checkpoint(path: &Path) -> Result<CheckpointTensors> {
    let data = std::fs::read(path)
        .map_err(|e| Error::CheckpointIo { path: path.to_path_buf(), message: e.to_string() })?;

    let (_, st_metadata) = SafeTensors::read_metadata(&data).map_err(|e| Error::CheckpointIo {
        path: path.to_path_buf(),
        message: format!("safetensors header: {e:?}"),
    })?;
    let architecture =
        st_metadata.metadata().as_ref().and_then(|m| m.get("architecture").cloned());

    let safetensors = SafeTensors::deserialize(&data).map_err(|e| Error::CheckpointIo {
        path: path.to_path_buf(),
        message: format!("safetensors payload: {e:?}"),
    })?;

    let mut tensors = HashMap::new();
    for name in safetensors.names() {
        let view = safetensors
            .tensor(name)
            .expect("tensor name from names() must exist in SafeTensors");
        if view.dtype() != Dtype::F32 {
            return Err(Error::Serialization {
                message: format!("tensor '{name}' has dtype {:?}, expected F32", view.dtype()),
            });
        }
        // pod_collect copies, so the source buffer's alignment doesn't matter
        let values: Vec<f32> = bytemuck::pod_collect_to_vec(view.data());
        tensors.insert(name.to_string(), (view.shape().to_vec(), values));
    }

    Ok(CheckpointTensors { tensors, architecture })
}

/// Copy checkpoint values into live parameters, name by name, shape-checked.
pub fn restore_parameters(
    names: &[String],
    params: &mut [&mut Tensor],
    checkpoint: &CheckpointTensors,
) -> Result<()> {
    debug_assert_eq!(names.len(), params.len());
    for (name, param) in names.iter().zip(params.iter_mut()) {
        let (shape, values) = checkpoint.get(name).ok_or_else(|| Error::Serialization {
            message: format!("checkpoint is missing tensor '{name}'"),
        })?;
        if shape != param.shape() {
            return Err(Error::ShapeMismatch {
                name: name.clone(),
                expected: param.shape().to_vec(),
                actual: shape.clone(),
            });
        }
        *param.data_mut() = ndarray::Array1::from(values.clone());
    }
    Ok(())
}
