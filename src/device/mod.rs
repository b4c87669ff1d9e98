pub mod connection;
pub mod constants;
pub mod decode;
pub mod endpoint;
pub mod machine;
pub mod transport;
pub mod types;
