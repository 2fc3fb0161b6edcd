use crate::auth::Credentials;

/// Production endpoints for the USDT-settled perpetual futures venue.
const REST_URL: &str = "https://api.gateio.ws";
const WS_URL: &str = "wss://fx-ws.gateio.ws/v4/ws/usdt";

/// Connection configuration, built once by the launcher and passed by
/// reference to every client.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Base URL for REST requests.
    pub rest_url: String,
    /// WebSocket endpoint.
    pub ws_url: String,
    /// API credentials. `None` restricts the client to public endpoints.
    pub credentials: Option<Credentials>,
}

impl GateConfig {
    /// Configuration for the production USDT futures venue.
    pub fn usdt_futures(credentials: Option<Credentials>) -> Self {
        Self {
            rest_url: REST_URL.into(),
            ws_url: WS_URL.into(),
            credentials,
        }
    }
}
