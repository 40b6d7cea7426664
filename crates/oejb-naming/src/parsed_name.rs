use std::cmp::Ordering;
use std::fmt;

/// Hash of a single name component.
///
/// Uses the 31-multiplier string hash so the empty component hashes to `0`.
pub fn component_hash(component: &str) -> i32 {
    component
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// A `/`-separated name split into components, with a cursor.
///
/// Repeated and trailing separators are collapsed, so `"/a//b/"` parses into
/// `["a", "b"]`. An empty name (or `"/"`) yields a single empty component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedName {
    components: Vec<String>,
    pos: usize,
    hash: i32,
}

impl ParsedName {
    pub fn new(path: &str) -> Self {
        let mut components: Vec<String> = path
            .split('/')
            .filter(|component| !component.is_empty())
            .map(str::to_owned)
            .collect();
        if components.is_empty() {
            components.push(String::new());
        }

        let hash = component_hash(&components[0]);
        Self {
            components,
            pos: 0,
            hash,
        }
    }

    /// The component under the cursor.
    pub fn component(&self) -> &str {
        &self.components[self.pos]
    }

    /// Cached hash of [`ParsedName::component`].
    pub fn component_hash(&self) -> i32 {
        self.hash
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.len() == 1 && self.components[0].is_empty()
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Advances the cursor.
    ///
    /// Returns `false` and leaves the cursor in place when it already sits on the
    /// last component.
    pub fn next(&mut self) -> bool {
        if self.pos + 1 >= self.components.len() {
            return false;
        }
        self.pos += 1;
        self.hash = component_hash(&self.components[self.pos]);
        true
    }

    pub fn reset(&mut self) {
        self.pos = 0;
        self.hash = component_hash(&self.components[0]);
    }

    /// Three-way comparison of the current component hash against `other`.
    ///
    /// Equal hashes say nothing about string equality; callers compare the
    /// component text themselves.
    pub fn compare_to(&self, other: i32) -> Ordering {
        self.hash.cmp(&other)
    }

    /// A new name made of the components from the cursor onwards.
    pub fn remaining(&self) -> ParsedName {
        let components = self.components[self.pos..].to_vec();
        let hash = component_hash(&components[0]);
        ParsedName {
            components,
            pos: 0,
            hash,
        }
    }

    /// The components from the cursor onwards, joined with `/`.
    pub fn path(&self) -> String {
        self.components[self.pos..].join("/")
    }
}

impl fmt::Display for ParsedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.components.join("/"))
    }
}
