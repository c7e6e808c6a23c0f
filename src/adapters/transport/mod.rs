//! Widget-side transports implementing the ChatTransport port.

mod http_transport;

pub use http_transport::HttpChatTransport;
