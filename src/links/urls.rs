use url::Url;

/// Builds the public URLs handed out to uploaders and downloaders.
#[derive(Debug, Clone)]
pub struct PublicUrls {
    base: Url,
}

impl PublicUrls {
    /// `base` must be an http(s) URL; config validation guarantees this.
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn upload(&self, token_id: &str) -> String {
        self.join(&["upload", token_id])
    }

    pub fn download(&self, session_id: &str, filename: &str) -> String {
        self.join(&[session_id, filename])
    }

    pub fn short(&self, key: &str) -> String {
        self.join(&["d", key])
    }

    /// Append percent-encoded path segments to the base URL.
    fn join(&self, segments: &[&str]) -> String {
        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.to_string()
    }
}
