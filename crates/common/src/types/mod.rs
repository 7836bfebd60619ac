use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct Health {
    pub status: &'static str,
}

/// Payload served at `/`, tells clients where the collection lives.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: &'static str,
    pub version: &'static str,
    pub url: &'static str,
}

impl ServiceDescriptor {
    pub fn current() -> Self {
        Self {
            name: "Banking System REST API Service",
            version: "1.0",
            url: "/accounts",
        }
    }
}
