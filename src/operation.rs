//! Operation metadata collected while binding described routes.

/// One documented method + path, used to generate the OpenAPI document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    pub path: String,
    /// Lower-case HTTP method name.
    pub method: String,
    pub summary: String,
    pub tag: String,
}
