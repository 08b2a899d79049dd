//! Rewrites references to the exported support-file directory so they point at
//! the canonical asset directory instead.

/// Replaces every occurrence of `bundle_token` (e.g. `my-post_files`) in
/// `markdown` with `public_path` (e.g. `/assets/my-post`). The substitution is
/// literal; it does not parse the markdown, so references in raw HTML
/// (`<img src="...">`) are rewritten too.
pub fn rewrite(markdown: &str, bundle_token: &str, public_path: &str) -> String {
    markdown.replace(bundle_token, public_path)
}

/// Counts the references to `bundle_token` in `markdown`. Before a rewrite
/// this is the number that will be rewritten; after it, the number left
/// dangling.
pub fn references(markdown: &str, bundle_token: &str) -> usize {
    markdown.matches(bundle_token).count()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rewrite_markdown_and_html_references() {
        let input = "![png](post_files/post_1_0.png)\n\n<img src=\"post_files/post_2_0.svg\"/>\n";
        let out = rewrite(input, "post_files", "/assets/post");
        assert_eq!(
            "![png](/assets/post/post_1_0.png)\n\n<img src=\"/assets/post/post_2_0.svg\"/>\n",
            out
        );
        assert_eq!(2, references(input, "post_files"));
        assert_eq!(0, references(&out, "post_files"));
    }

    #[test]
    fn test_rewrite_maps_stem_to_dated_name() {
        let out = rewrite("![](post_files/x.png)", "post_files", "/media/2021-05-01-post");
        assert_eq!("![](/media/2021-05-01-post/x.png)", out);
    }

    #[test]
    fn test_rewrite_without_references_is_identity() {
        let input = "# Title\n\nNo images here; the stem `post` alone is untouched.\n";
        assert_eq!(input, rewrite(input, "post_files", "/assets/post"));
    }
}
