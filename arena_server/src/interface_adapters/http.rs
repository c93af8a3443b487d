// Shared HTTP response bodies for the internal routes.

/// JSON body for every non-2xx response.
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Liveness check body.
#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    // Lobbies with a running world task.
    pub lobbies: usize,
}
