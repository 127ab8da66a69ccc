pub mod harness;

pub use harness::{serve_client_domain, TestServer, WEB_AUTH_DOMAIN};
