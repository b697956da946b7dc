pub mod chromium;
pub mod shared;

pub use chromium::ChromiumHost;
pub use shared::TimeoutConfig;
