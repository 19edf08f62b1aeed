//! Path templates.

use std::sync::Arc;

/// A relative path template such as `/users/{id}?expand=true`.
///
/// Also stored in request extensions so middleware can see the template
/// pattern (e.g. `/users/{id}`) rather than the resolved path.
///
/// # Example
///
/// ```ignore
/// // In middleware
/// if let Some(template) = request.extensions().get::<PathTemplate>() {
///     println!("Path template: {}", template.as_str());
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathTemplate(Arc<str>);

impl PathTemplate {
    /// Create a new path template.
    #[must_use]
    pub fn new(template: impl Into<Arc<str>>) -> Self {
        Self(template.into())
    }

    /// Get the template string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Placeholder names, in order of appearance.
    ///
    /// ```
    /// use grapnel_core::PathTemplate;
    ///
    /// let template = PathTemplate::new("/users/{id}/posts/{postId}");
    /// assert_eq!(template.placeholders(), vec!["id", "postId"]);
    /// ```
    #[must_use]
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut rest = self.as_str();
        while let Some((_, tail)) = rest.split_once('{') {
            let Some((name, after)) = tail.split_once('}') else {
                break;
            };
            names.push(name);
            rest = after;
        }
        names
    }
}

/// Replace every `{name}` in `target` (name compared ignoring ASCII case).
pub(crate) fn substitute(target: &str, name: &str, value: &str) -> String {
    let mut out = String::with_capacity(target.len() + value.len());
    let mut rest = target;
    while let Some((head, tail)) = rest.split_once('{') {
        out.push_str(head);
        match tail.split_once('}') {
            Some((candidate, after)) if candidate.eq_ignore_ascii_case(name) => {
                out.push_str(value);
                rest = after;
            }
            _ => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

impl std::fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PathTemplate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PathTemplate {
    fn from(template: &str) -> Self {
        Self::new(template)
    }
}
