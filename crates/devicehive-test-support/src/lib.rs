//! Shared test utilities for the DeviceHive client crates: mock WebSocket
//! and HTTP servers for integration testing without a live DeviceHive
//! deployment.

pub mod mock_http_server;
pub mod mock_ws_server;

pub use mock_http_server::MockHttpServer;
pub use mock_ws_server::MockWsServer;
