//! Device binding - the loop's view of which receiver it is talking to

use std::sync::Arc;

use crate::drivers::ReceiverDriver;

pub const STATUS_INITIALIZING: &str = "Initializing.";
pub const STATUS_DISCOVERING: &str = "Found Yamaha device. Discovering…";
pub const STATUS_NOT_FOUND: &str = "Could not find Yamaha device while updating status.";
pub const STATUS_SETUP_FAILED: &str = "Could not find Yamaha device for setup.";
pub const STATUS_CHECK_FAILED: &str = "Could not find Yamaha device while checking status.";

/// Current binding to a receiver
///
/// `driver` is present from the start of a bind attempt; `ip` arrives with a
/// successful discovery and `name` with the device info. Every bind or clear
/// bumps `generation`, so results of calls started under an older binding can
/// be recognised and dropped.
#[derive(Default)]
pub struct DeviceBinding {
    driver: Option<Arc<dyn ReceiverDriver>>,
    ip: Option<String>,
    name: Option<String>,
    generation: u64,
}

impl DeviceBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new binding with a fresh driver, returning its generation
    pub fn bind(&mut self, driver: Arc<dyn ReceiverDriver>) -> u64 {
        self.driver = Some(driver);
        self.ip = None;
        self.name = None;
        self.generation += 1;
        self.generation
    }

    /// Drop the binding; the next ensure-bound tick starts over
    pub fn clear(&mut self) {
        self.driver = None;
        self.ip = None;
        self.name = None;
        self.generation += 1;
    }

    pub fn is_bound(&self) -> bool {
        self.driver.is_some()
    }

    pub fn driver(&self) -> Option<Arc<dyn ReceiverDriver>> {
        self.driver.clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }

    pub fn set_ip(&mut self, ip: String) {
        self.ip = Some(ip);
    }

    pub fn set_name(&mut self, name: String) {
        if !name.is_empty() {
            self.name = Some(name);
        }
    }

    /// Status sentence and error flag for the current binding
    pub fn status_line(&self) -> (String, bool) {
        match (&self.driver, &self.ip, &self.name) {
            (Some(_), Some(ip), Some(name)) => (format!("Found Yamaha {} at {}", name, ip), false),
            (Some(_), Some(ip), None) => (format!("Found Yamaha device at {}", ip), false),
            (Some(_), None, _) => (STATUS_DISCOVERING.to_string(), false),
            (None, _, _) => (STATUS_NOT_FOUND.to_string(), true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::YxcDriver;
    use std::time::Duration;

    fn driver() -> Arc<dyn ReceiverDriver> {
        Arc::new(YxcDriver::with_client(
            reqwest::Client::new(),
            "10.0.0.5",
            Duration::from_secs(1),
        ))
    }

    #[test]
    fn test_status_sentences() {
        let mut binding = DeviceBinding::new();
        assert_eq!(binding.status_line(), (STATUS_NOT_FOUND.to_string(), true));

        binding.bind(driver());
        assert_eq!(binding.status_line(), (STATUS_DISCOVERING.to_string(), false));

        binding.set_ip("10.0.0.5".to_string());
        assert_eq!(
            binding.status_line(),
            ("Found Yamaha device at 10.0.0.5".to_string(), false)
        );

        binding.set_name("RX-A".to_string());
        assert_eq!(
            binding.status_line(),
            ("Found Yamaha RX-A at 10.0.0.5".to_string(), false)
        );
    }

    #[test]
    fn test_name_without_ip_is_still_discovering() {
        let mut binding = DeviceBinding::new();
        binding.bind(driver());
        binding.set_name("RX-A".to_string());
        assert_eq!(binding.status_line().0, STATUS_DISCOVERING);
    }

    #[test]
    fn test_bind_and_clear_bump_generation() {
        let mut binding = DeviceBinding::new();
        let first = binding.bind(driver());
        binding.set_ip("10.0.0.5".to_string());

        let second = binding.bind(driver());
        assert!(second > first);
        assert_eq!(binding.ip(), None);

        binding.clear();
        assert!(!binding.is_bound());
        assert!(binding.generation() > second);
        assert!(binding.driver().is_none());
    }

    #[test]
    fn test_empty_name_is_ignored() {
        let mut binding = DeviceBinding::new();
        binding.bind(driver());
        binding.set_ip("10.0.0.5".to_string());
        binding.set_name(String::new());
        assert_eq!(binding.status_line().0, "Found Yamaha device at 10.0.0.5");
    }
}
