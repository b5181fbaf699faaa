//! Capture configuration

/// Default number of frames buffered between capture and fan-out
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Capture registry configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Frames buffered per source before the decode loop blocks
    pub queue_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl CaptureConfig {
    /// Set the frame queue capacity (at least 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();
        assert_eq!(config.queue_capacity, 100);
    }

    #[test]
    fn test_queue_capacity_floor() {
        let config = CaptureConfig::default().queue_capacity(0);
        assert_eq!(config.queue_capacity, 1);

        let config = CaptureConfig::default().queue_capacity(8);
        assert_eq!(config.queue_capacity, 8);
    }
}
