/// Coarse traffic categories, each with its own quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EndpointClass {
    Default,
    Auth,
    MlInference,
    ReportGeneration,
}

impl EndpointClass {
    pub const ALL: [EndpointClass; 4] = [
        Self::Default,
        Self::Auth,
        Self::MlInference,
        Self::ReportGeneration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Auth => "auth",
            Self::MlInference => "ml-inference",
            Self::ReportGeneration => "report-generation",
        }
    }

    pub fn classify(path: &str) -> Self {
        if path.starts_with("/auth/") || path.starts_with("/api/auth/") {
            Self::Auth
        } else if path.starts_with("/api/ml/") {
            Self::MlInference
        } else if path.starts_with("/api/reports/") {
            Self::ReportGeneration
        } else {
            Self::Default
        }
    }
}

impl std::fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
