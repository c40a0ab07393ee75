//! Capture configuration

/// Default number of frames per stream write
pub const DEFAULT_CHUNK_FRAMES: u32 = 480;

/// Capture configuration options
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Frames written to the broadcaster per chunk
    pub chunk_frames: u32,

    /// Write chunks at playback speed instead of as fast as possible
    pub paced: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            paced: false,
        }
    }
}

impl CaptureConfig {
    /// Set the chunk size in frames (at least 1)
    pub fn chunk_frames(mut self, frames: u32) -> Self {
        self.chunk_frames = frames.max(1);
        self
    }

    /// Enable or disable real-time pacing
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();
        assert_eq!(config.chunk_frames, 480);
        assert!(!config.paced);
    }

    #[test]
    fn test_builder_chaining() {
        let config = CaptureConfig::default().chunk_frames(0).paced(true);
        assert_eq!(config.chunk_frames, 1);
        assert!(config.paced);
    }
}
