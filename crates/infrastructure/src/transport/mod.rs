pub mod http;

pub use http::HttpAgentTransport;
