//! HTML substitution and minification.

use std::sync::LazyLock;

use regex::Regex;

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script.*?</script>").expect("valid script pattern"));
static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style.*?</style>").expect("valid style pattern"));
static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment pattern"));
static BETWEEN_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("valid inter-tag pattern"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid whitespace pattern"));

/// Result of substituting inline assets into a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Inlined {
    /// Page with the substitutions applied
    pub html: String,

    /// Whether the stylesheet `<link>` was found and replaced
    pub css_inlined: bool,

    /// Whether the `<script src>` tag was found and replaced
    pub js_inlined: bool,
}

/// Replace the first match of `pattern` with `replacement`, taken literally.
fn splice_first(html: &str, pattern: &Regex, replacement: &str) -> Option<String> {
    let found = pattern.find(html)?;
    let mut out = String::with_capacity(html.len() - found.len() + replacement.len());
    out.push_str(&html[..found.start()]);
    out.push_str(replacement);
    out.push_str(&html[found.end()..]);
    Some(out)
}

/// Swap the stylesheet link and script tag referencing `css_href` / `js_src`
/// for inline `<style>` and `<script>` blocks.
pub fn inline_assets(html: &str, css_href: &str, css: &str, js_src: &str, js: &str) -> Inlined {
    let link = format!(r#"<link[^>]*href="{}"[^>]*>"#, regex::escape(css_href));
    let script = format!(r#"<script[^>]*src="{}"[^>]*></script>"#, regex::escape(js_src));

    let mut html = html.to_string();

    let css_inlined = match replace_tag(&html, &link, &format!("<style>{}</style>", css)) {
        Some(replaced) => {
            html = replaced;
            true
        }
        None => false,
    };

    let js_inlined = match replace_tag(&html, &script, &format!("<script>{}</script>", js)) {
        Some(replaced) => {
            html = replaced;
            true
        }
        None => false,
    };

    Inlined {
        html,
        css_inlined,
        js_inlined,
    }
}

fn replace_tag(html: &str, pattern: &str, replacement: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    splice_first(html, &re, replacement)
}

/// Replace every match of `pattern` with a numbered placeholder, saving the originals.
fn stash_blocks(pattern: &Regex, text: &str, blocks: &mut Vec<String>) -> String {
    pattern
        .replace_all(text, |caps: &regex::Captures| {
            let key = format!("@@BLOCK{}@@", blocks.len());
            blocks.push(caps[0].to_string());
            key
        })
        .into_owned()
}

/// Minify HTML markup while keeping `<script>` and `<style>` bodies verbatim.
pub fn minify_html(html: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();

    let html = stash_blocks(&SCRIPT_BLOCK, html, &mut blocks);
    let html = stash_blocks(&STYLE_BLOCK, &html, &mut blocks);

    let html = COMMENT.replace_all(&html, "");
    let html = BETWEEN_TAGS.replace_all(&html, "><");
    let html = WHITESPACE_RUN.replace_all(&html, " ");
    let mut html = html.trim().to_string();

    for (index, block) in blocks.iter().enumerate() {
        html = html.replace(&format!("@@BLOCK{}@@", index), block);
    }

    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <link rel="stylesheet" href="css/css.css">
</head>
<body>
  <script type="module" src="js/app.js"></script>
</body>
</html>"#;

    #[test]
    fn inlines_stylesheet_and_script() {
        let out = inline_assets(PAGE, "css/css.css", "a{b:c}", "js/app.js", "run();");

        assert!(out.css_inlined);
        assert!(out.js_inlined);
        assert!(out.html.contains("<style>a{b:c}</style>"));
        assert!(out.html.contains("<script>run();</script>"));
        assert!(!out.html.contains("href=\"css/css.css\""));
    }

    #[test]
    fn inserts_replacement_text_literally() {
        let out = inline_assets(PAGE, "css/css.css", "", "js/app.js", "let price = '$1 ${x}';");

        assert!(out.html.contains("<script>let price = '$1 ${x}';</script>"));
    }

    #[test]
    fn reports_missing_references() {
        let out = inline_assets("<p>plain</p>", "css/css.css", "x", "js/app.js", "y");

        assert!(!out.css_inlined);
        assert!(!out.js_inlined);
        assert_eq!(out.html, "<p>plain</p>");
    }

    #[test]
    fn href_is_matched_literally() {
        let out = inline_assets(
            r#"<link href="cssXcss.css">"#,
            "css/css.css",
            "x",
            "js/app.js",
            "y",
        );

        assert!(!out.css_inlined);
    }

    #[test]
    fn minifies_markup() {
        let html = "<html>\n  <!-- note -->\n  <body>\n    <p>Hello    world</p>\n  </body>\n</html>\n";

        assert_eq!(minify_html(html), "<html><body><p>Hello world</p></body></html>");
    }

    #[test]
    fn preserves_script_and_style_bodies() {
        let html = "<div>\n  <SCRIPT>\n  if (a  >  b) {\n    x();  <!-- keep -->\n  }\n  </SCRIPT>\n  <style>\n  a  {  color: red;  }\n  </style>\n</div>";

        assert_eq!(
            minify_html(html),
            "<div> <SCRIPT>\n  if (a  >  b) {\n    x();  <!-- keep -->\n  }\n  </SCRIPT> <style>\n  a  {  color: red;  }\n  </style>\n</div>"
        );
    }

    #[test]
    fn keeps_single_newline_beside_block() {
        let html = "<p>a</p>\n<script>run();</script>\n<p>b</p>";

        assert_eq!(minify_html(html), html);
    }
}
