use std::fmt;
use std::sync::Arc;

use crate::config::ResourceClassConfig;
use crate::process::EncoderFamily;

/// A named hardware-encoder class with a fixed capacity.
///
/// Cheap to clone (the name is shared).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceClass {
    name: Arc<str>,
    capacity: usize,
    encoder: EncoderFamily,
}

impl ResourceClass {
    /// Creates a new class.
    pub fn new(name: impl Into<Arc<str>>, capacity: usize, encoder: EncoderFamily) -> Self {
        Self {
            name: name.into(),
            capacity,
            encoder,
        }
    }

    /// Class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum number of concurrent holders.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Encoder family used by processes holding this class.
    pub fn encoder(&self) -> EncoderFamily {
        self.encoder
    }
}

impl From<&ResourceClassConfig> for ResourceClass {
    fn from(cfg: &ResourceClassConfig) -> Self {
        Self::new(cfg.name.as_str(), cfg.capacity, cfg.encoder)
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
