use serde::{Deserialize, Serialize};

/// Body of `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    /// Reported status, `"healthy"` when the backend is up.
    pub status: String,

    /// Name of the service answering the probe.
    #[serde(default)]
    pub service: Option<String>,
}

impl HealthStatus {
    /// Returns true if the backend reported itself healthy.
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn health_status_deserialization() {
        let status: HealthStatus = serde_json::from_value(json!({
            "status": "healthy",
            "service": "ai-chatbot-backend"
        }))
        .unwrap();
        assert!(status.is_healthy());
        assert_eq!(status.service.as_deref(), Some("ai-chatbot-backend"));
    }

    #[test]
    fn health_status_without_service() {
        let status: HealthStatus = serde_json::from_value(json!({"status": "degraded"})).unwrap();
        assert!(!status.is_healthy());
        assert!(status.service.is_none());
    }
}
