pub mod generation;
pub mod http;
pub mod identity;
pub mod progress;

pub use generation::HttpGenerationAdapter;
pub use http::BackendClient;
pub use identity::HttpIdentityAdapter;
pub use progress::HttpProgressAdapter;
