//! Builds the front-matter block that the static-site generator reads from the
//! top of every dated post.

const FENCE: &str = "---";

/// An ordered list of front-matter fields. Fields are emitted in insertion
/// order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrontMatter {
    fields: Vec<(String, String)>,
}

impl FrontMatter {
    pub fn new() -> FrontMatter {
        FrontMatter::default()
    }

    /// Appends a field.
    pub fn push<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.fields.push((key.into(), value.into()));
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Renders the block: an opening fence, one `key: value` line per field, a
    /// closing fence and a blank line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(FENCE);
        out.push('\n');
        for (key, value) in &self.fields {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out.push_str(FENCE);
        out.push_str("\n\n");
        out
    }
}

/// Renders a boolean the way the site's existing posts spell it.
pub fn yaml_bool(value: bool) -> &'static str {
    match value {
        true => "True",
        false => "False",
    }
}

/// Wraps `body` with `front_matter` and, when given, appends `footer` on its own
/// line.
pub fn wrap(front_matter: &FrontMatter, body: &str, footer: Option<&str>) -> String {
    let mut out = front_matter.render();
    out.push_str(body);
    if let Some(footer) = footer {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(footer);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_render_keeps_insertion_order() {
        let mut fm = FrontMatter::new();
        fm.push("zeta", "1");
        fm.push("alpha", "2");
        assert_eq!("---\nzeta: 1\nalpha: 2\n---\n\n", fm.render());
    }

    #[test]
    fn test_render_empty() {
        assert_eq!("---\n---\n\n", FrontMatter::new().render());
    }

    #[test]
    fn test_wrap_with_footer() {
        let mut fm = FrontMatter::new();
        fm.push("layout", "post");
        fm.push("published", yaml_bool(true));
        fm.push("title", "Hello");
        let out = wrap(&fm, "# Body", Some("{% include mathjax.html %}"));
        assert_eq!(
            "---\nlayout: post\npublished: True\ntitle: Hello\n---\n\n# Body\n{% include mathjax.html %}\n",
            out
        );
    }

    #[test]
    fn test_wrap_without_footer_leaves_body_alone() {
        let out = wrap(&FrontMatter::new(), "body", None);
        assert_eq!("---\n---\n\nbody", out);
    }
}
