use std::sync::atomic::{AtomicUsize, Ordering};

/// Namespace used when a name token does not carry one.
pub const BASE_NAMESPACE: &str = "base";

/// A single `value[.namespace]` token after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventName {
    pub value: String,
    pub namespace: String,
}

impl EventName {
    /// Splits a token on `.`: the first part is the value, a non-empty second
    /// part is the namespace. Anything after a second dot is ignored.
    pub fn parse(token: &str) -> Self {
        let mut parts = token.split('.');
        let value = parts.next().unwrap_or_default().to_string();
        let namespace = match parts.next() {
            Some(namespace) if !namespace.is_empty() => namespace.to_string(),
            _ => BASE_NAMESPACE.to_string(),
        };

        Self { value, namespace }
    }

    /// Unqualified names fan out to every namespace on trigger and removal.
    pub fn is_unqualified(&self) -> bool {
        self.namespace == BASE_NAMESPACE
    }
}

/// Splits a raw names string into independent tokens.
///
/// Characters outside `[A-Za-z0-9 ,/.]` are dropped, runs of `,` or `/`
/// become a single space, and empty tokens are skipped.
pub fn resolve_names(names: &str) -> Vec<String> {
    let mut cleaned = String::with_capacity(names.len());
    let mut in_separator = false;

    for c in names.chars() {
        match c {
            ',' | '/' => {
                if !in_separator {
                    cleaned.push(' ');
                    in_separator = true;
                }
            }
            c if c.is_ascii_alphanumeric() || c == ' ' || c == '.' => {
                cleaned.push(c);
                in_separator = false;
            }
            _ => {}
        }
    }

    cleaned
        .split(' ')
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Returns `prefix` followed by a process-wide counter, giving each
/// subscriber its own namespace for bulk removal.
pub fn unique_namespace(prefix: &str) -> String {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    format!("{prefix}{}", NEXT.fetch_add(1, Ordering::Relaxed))
}

/// Returns the namespace named by a namespace-only token (`ns.` or `.ns`).
pub fn namespace_only(token: &str) -> Option<&str> {
    let namespace = token
        .strip_suffix('.')
        .or_else(|| token.strip_prefix('.'))?;

    if namespace.is_empty() || namespace.contains('.') {
        None
    } else {
        Some(namespace)
    }
}
