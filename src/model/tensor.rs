use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
};

use ndarray::{ArrayD, IxDyn};
use safetensors::{
    tensor::{Dtype, TensorView},
    SafeTensors,
};

use super::Model;
use crate::error::{ArtifactErr, Result};

const FORMAT_KEY: &str = "format";
const ARCHITECTURE_KEY: &str = "architecture";
const MODEL_FORMAT: &str = "tensor-model";
const WEIGHTS_FORMAT: &str = "tensor-weights";

/// A model made of named `f32` tensors plus a free-form architecture description.
///
/// Both artifacts are safetensors files; the whole-model file additionally carries the
/// architecture as JSON in its header metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorModel {
    architecture: serde_json::Value,
    tensors: BTreeMap<String, ArrayD<f32>>,
}

impl TensorModel {
    /// Creates a new `TensorModel` without tensors.
    ///
    /// # Arguments
    /// * `architecture` - Description of the network (layers, sizes, activations).
    ///
    /// # Returns
    /// A new `TensorModel` instance.
    pub fn new(architecture: serde_json::Value) -> Self {
        Self {
            architecture,
            tensors: BTreeMap::new(),
        }
    }

    pub fn with_tensor<S: Into<String>>(mut self, name: S, tensor: ArrayD<f32>) -> Self {
        self.insert(name, tensor);
        self
    }

    /// Adds or replaces the tensor called `name`.
    pub fn insert<S: Into<String>>(&mut self, name: S, tensor: ArrayD<f32>) {
        self.tensors.insert(name.into(), tensor);
    }

    pub fn architecture(&self) -> &serde_json::Value {
        &self.architecture
    }

    pub fn tensor(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.tensors.get(name)
    }

    pub fn tensors(&self) -> &BTreeMap<String, ArrayD<f32>> {
        &self.tensors
    }

    /// Total amount of parameters across all tensors.
    pub fn param_count(&self) -> usize {
        self.tensors.values().map(|t| t.len()).sum()
    }

    /// Reads a whole-model file written by `save`.
    ///
    /// # Errors
    /// Returns an `ArtifactErr::MissingMetadata` if the file carries no architecture (e.g. it
    /// is a weights-only file), or an `ArtifactErr` if it cannot be read or decoded.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let buffer = fs::read(path)?;
        let (_, metadata) = SafeTensors::read_metadata(&buffer)?;

        let architecture = metadata
            .metadata()
            .as_ref()
            .and_then(|m| m.get(ARCHITECTURE_KEY))
            .ok_or(ArtifactErr::MissingMetadata {
                key: ARCHITECTURE_KEY,
            })?;

        Ok(Self {
            architecture: serde_json::from_str(architecture)?,
            tensors: decode_tensors(&buffer)?,
        })
    }

    /// Reads the tensors of either a whole-model or a weights-only file.
    ///
    /// # Errors
    /// Returns an `ArtifactErr` if the file cannot be read, is not a safetensors file, or holds
    /// tensors other than `F32`.
    pub fn load_weights<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, ArrayD<f32>>> {
        let buffer = fs::read(path)?;
        decode_tensors(&buffer)
    }

    fn encode(&self, metadata: HashMap<String, String>) -> Result<Vec<u8>> {
        // safetensors stores row-major data, `iter` walks logical order whatever the layout.
        let data: Vec<(&str, Vec<f32>, Vec<usize>)> = self
            .tensors
            .iter()
            .map(|(name, tensor)| {
                let values = tensor.iter().copied().collect();
                (name.as_str(), values, tensor.shape().to_vec())
            })
            .collect();

        let views = data
            .iter()
            .map(|(name, values, shape)| {
                let bytes: &[u8] = bytemuck::cast_slice(values.as_slice());
                TensorView::new(Dtype::F32, shape.clone(), bytes).map(|view| (*name, view))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(safetensors::serialize(views, &Some(metadata))?)
    }
}

impl Model for TensorModel {
    fn extension(&self) -> &str {
        "safetensors"
    }

    fn save(&self, path: &Path) -> Result<()> {
        let metadata = HashMap::from([
            (FORMAT_KEY.to_string(), MODEL_FORMAT.to_string()),
            (
                ARCHITECTURE_KEY.to_string(),
                serde_json::to_string(&self.architecture)?,
            ),
        ]);

        fs::write(path, self.encode(metadata)?)?;
        Ok(())
    }

    fn save_weights(&self, path: &Path) -> Result<()> {
        let metadata = HashMap::from([(FORMAT_KEY.to_string(), WEIGHTS_FORMAT.to_string())]);

        fs::write(path, self.encode(metadata)?)?;
        Ok(())
    }
}

fn decode_tensors(buffer: &[u8]) -> Result<BTreeMap<String, ArrayD<f32>>> {
    let file = SafeTensors::deserialize(buffer)?;

    file.tensors()
        .into_iter()
        .map(|(name, view)| {
            if view.dtype() != Dtype::F32 {
                return Err(ArtifactErr::UnsupportedDtype {
                    dtype: format!("{:?}", view.dtype()),
                    tensor: name,
                });
            }

            // The buffer gives no alignment guarantee, so copy instead of casting in place.
            let values: Vec<f32> = bytemuck::pod_collect_to_vec(view.data());
            let tensor = ArrayD::from_shape_vec(IxDyn(view.shape()), values)?;
            Ok((name, tensor))
        })
        .collect()
}
