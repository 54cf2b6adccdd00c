mod tensor;

use std::path::Path;

use crate::error::Result;

pub use tensor::TensorModel;

/// A trained model that knows how to serialize itself in its native format.
pub trait Model {
    /// File extension of the whole-model artifact, without the dot.
    fn extension(&self) -> &str;

    /// File extension of the weights-only artifact, the native format by default.
    fn weights_extension(&self) -> &str {
        self.extension()
    }

    /// Writes the whole model (architecture and weights) to `path`.
    fn save(&self, path: &Path) -> Result<()>;

    /// Writes only the weight tensors to `path`.
    fn save_weights(&self, path: &Path) -> Result<()>;
}
