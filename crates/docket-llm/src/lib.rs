pub mod extract;
pub mod models;
pub mod provider;
pub mod reliable;

pub mod mock;

pub use models::{ModelProfile, ModelProfiles};
pub use provider::AnthropicGenerator;
pub use reliable::{GenerationClient, RetryConfig};
