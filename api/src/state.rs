use fanfou_mcp_runtime::Endpoints;

/// Shared router state. Credentials are per request, so this only carries
/// where to reach FanFou.
#[derive(Clone, Debug, Default)]
pub struct AppState {
    pub endpoints: Endpoints,
}

impl AppState {
    pub fn from_env() -> Self {
        Self {
            endpoints: Endpoints::from_env(),
        }
    }
}
