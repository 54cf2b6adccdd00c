use std::{fs, path::Path};

use crate::error::Result;

/// A rendered diagnostic plot.
pub trait Figure {
    /// Writes the figure to `path`, in whatever format the backend picks for its extension.
    fn save_fig(&self, path: &Path) -> Result<()>;

    /// Releases the drawing resources held by the figure.
    fn close(&mut self) {}
}

impl<F: Figure + ?Sized> Figure for Box<F> {
    fn save_fig(&self, path: &Path) -> Result<()> {
        (**self).save_fig(path)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// A figure whose bytes were already produced by some plotting backend (PNG, SVG, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedFigure {
    bytes: Vec<u8>,
}

impl RenderedFigure {
    pub fn new<B: Into<Vec<u8>>>(bytes: B) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_closed(&self) -> bool {
        self.bytes.capacity() == 0
    }
}

impl Figure for RenderedFigure {
    fn save_fig(&self, path: &Path) -> Result<()> {
        fs::write(path, &self.bytes)?;
        Ok(())
    }

    fn close(&mut self) {
        self.bytes = Vec::new();
    }
}
