//! HeaderSet and header policy
//!
//! Header names are compared case-insensitively; values keep their order.

/// Header classification used on every outbound path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderClass {
    /// `Host` / `Connection`: never copied, the sender builds its own
    HostSpecific,
    /// `Content-*`: belongs to the body metadata, not the general headers
    ContentSpecific,
    /// Everything else: copied verbatim
    PassThrough,
}

impl HeaderClass {
    /// Classify a header by name only.
    pub fn classify(name: &str) -> Self {
        if name.eq_ignore_ascii_case("host") || name.eq_ignore_ascii_case("connection") {
            Self::HostSpecific
        } else if is_content_header(name) {
            Self::ContentSpecific
        } else {
            Self::PassThrough
        }
    }
}

fn is_content_header(name: &str) -> bool {
    const PREFIX: &str = "content-";
    name.len() >= PREFIX.len()
        && name.as_bytes()[..PREFIX.len()].eq_ignore_ascii_case(PREFIX.as_bytes())
}

/// One header name with all its values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEntry {
    pub name: String,
    pub values: Vec<String>,
}

/// Mapping from header name to an ordered list of values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    entries: Vec<HeaderEntry>,
}

/// Headers prepared for the canonical forward
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardHeaders {
    /// Pass-through headers for the general header collection
    pub general: Vec<HeaderEntry>,
    /// Content headers for the body metadata (`Content-Length` excluded)
    pub content: Vec<HeaderEntry>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, merging with an existing entry of the same name
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx].values.push(value),
            None => self.entries.push(HeaderEntry {
                name,
                values: vec![value],
            }),
        }
    }

    /// Builder-style `append`
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.append(name, value);
        self
    }

    /// All values of a header, empty if absent
    pub fn get_all(&self, name: &str) -> &[String] {
        self.position(name)
            .map(|idx| self.entries[idx].values.as_slice())
            .unwrap_or(&[])
    }

    /// First value of a header
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Number of distinct header names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderEntry> {
        self.entries.iter()
    }

    /// Copy without `Host` / `Connection` (sink path)
    pub fn without_host_specific(&self) -> HeaderSet {
        HeaderSet {
            entries: self
                .entries
                .iter()
                .filter(|e| HeaderClass::classify(&e.name) != HeaderClass::HostSpecific)
                .cloned()
                .collect(),
        }
    }

    /// Split for the canonical forward.
    ///
    /// Host-specific headers are dropped, content headers go to the body
    /// metadata. `Content-Length` is recomputed from the forwarded body.
    pub fn split_for_forward(&self) -> ForwardHeaders {
        let mut forward = ForwardHeaders::default();
        for entry in &self.entries {
            match HeaderClass::classify(&entry.name) {
                HeaderClass::HostSpecific => {}
                HeaderClass::ContentSpecific => {
                    if !entry.name.eq_ignore_ascii_case("content-length") {
                        forward.content.push(entry.clone());
                    }
                }
                HeaderClass::PassThrough => forward.general.push(entry.clone()),
            }
        }
        forward
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(name))
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for HeaderSet {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut set = HeaderSet::new();
        for (name, value) in iter {
            set.append(name, value);
        }
        set
    }
}
