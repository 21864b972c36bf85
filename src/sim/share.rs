use crate::compositor::EncodedImage;
use crate::error::{PosecamError, Result};
use crate::export::ShareTarget;
use async_trait::async_trait;
use parking_lot::Mutex;

/// Share sheet stand-in that keeps what it was given
#[derive(Debug, Default)]
pub struct SimShareTarget {
    available: bool,
    fails: bool,
    shared: Mutex<Vec<String>>,
}

impl SimShareTarget {
    pub fn new(available: bool) -> Self {
        Self {
            available,
            ..Self::default()
        }
    }

    /// Available, but every share is cancelled
    pub fn failing() -> Self {
        Self {
            available: true,
            fails: true,
            ..Self::default()
        }
    }

    pub fn shared_count(&self) -> usize {
        self.shared.lock().len()
    }

    pub fn shared_names(&self) -> Vec<String> {
        self.shared.lock().clone()
    }
}

#[async_trait]
impl ShareTarget for SimShareTarget {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn share(&self, image: &EncodedImage, file_name: &str) -> Result<()> {
        if self.fails {
            return Err(PosecamError::component("share", "Share cancelled"));
        }
        if image.is_empty() {
            return Err(PosecamError::component("share", "Empty image"));
        }
        self.shared.lock().push(file_name.to_string());
        Ok(())
    }
}
