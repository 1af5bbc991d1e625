use pulldown_cmark::{html, Options, Parser};

/// Format tag Matrix clients expect next to an HTML `formatted_body`.
pub const HTML_FORMAT: &str = "org.matrix.custom.html";

/// Render plugin output (Markdown) to the HTML used for `formatted_body`.
pub fn markdown_to_html(md: &str) -> String {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TABLES);
    let parser = Parser::new_ext(md, opts);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out.trim_end().to_string()
}
