use uuid::Uuid;

/// Token replaced by a fresh UUID on every request
pub const UUID_TOKEN: &str = "<UUID>";
/// Token replaced by the worker id
pub const CID_TOKEN: &str = "<CID>";

/// Expands per-request placeholders in target URIs
#[derive(Debug, Clone, Copy)]
pub struct UriTemplater {
    enabled: bool,
}

impl UriTemplater {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Resolve `template` for one request of worker `worker_id`.
    ///
    /// Every `<UUID>` occurrence gets its own freshly generated value and every
    /// `<CID>` becomes `worker_id`. Returns the template untouched when
    /// substitution is disabled.
    pub fn expand(&self, template: &str, worker_id: &str) -> String {
        if !self.enabled {
            return template.to_string();
        }
        expand(template, worker_id)
    }
}

/// Placeholder expansion, independent of the substitution switch
pub fn expand(template: &str, worker_id: &str) -> String {
    let with_cid = template.replace(CID_TOKEN, worker_id);

    let mut out = String::with_capacity(with_cid.len());
    let mut rest = with_cid.as_str();
    while let Some(pos) = rest.find(UUID_TOKEN) {
        out.push_str(&rest[..pos]);
        out.push_str(&Uuid::new_v4().to_string());
        rest = &rest[pos + UUID_TOKEN.len()..];
    }
    out.push_str(rest);
    out
}
