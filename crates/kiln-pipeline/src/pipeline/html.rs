use std::fs;
use std::sync::LazyLock;

use kiln_config::stage::{ChunkOrder, EmitHtmlOptions, HtmlMinify};
use kiln_config::BuildDescriptor;
use regex::{Captures, Regex};

use super::{BuildState, RenderedChunk, StageResult};
use crate::output::{ArtifactKind, ChunkKind};

const DEFAULT_DOCUMENT: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width,initial-scale=1.0">
    <title>kiln app</title>
  </head>
  <body>
    <div id="app"></div>
  </body>
</html>
"#;

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--(.*?)-->").expect("static regex"));

static BETWEEN_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("static regex"));

static RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").expect("static regex"));

static QUOTED_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"=\s*"([A-Za-z0-9_\-.:/]+)""#).expect("static regex")
});

/// The configured template, or a minimal shell with an `#app` mount point.
pub(crate) fn document_template(descriptor: &BuildDescriptor) -> std::io::Result<String> {
    match &descriptor.html_template {
        Some(path) => fs::read_to_string(descriptor.context.join(path)),
        None => Ok(DEFAULT_DOCUMENT.to_string()),
    }
}

/// Insert style links before `</head>` and scripts before `</body>`,
/// appending at the end when the closing tag is missing.
pub(crate) fn inject_tags(html: &str, styles: &[String], scripts: &[String]) -> String {
    let links: String = styles
        .iter()
        .map(|href| format!("<link href=\"{href}\" rel=\"stylesheet\">"))
        .collect();
    let tags: String = scripts
        .iter()
        .map(|src| format!("<script type=\"text/javascript\" src=\"{src}\"></script>"))
        .collect();

    let html = insert_before(html, "</head>", &links);
    insert_before(&html, "</body>", &tags)
}

fn insert_before(html: &str, marker: &str, content: &str) -> String {
    if content.is_empty() {
        return html.to_string();
    }
    match html.rfind(marker) {
        Some(at) => format!("{}{content}{}", &html[..at], &html[at..]),
        None => format!("{html}{content}"),
    }
}

fn minify_html(html: &str, opts: &HtmlMinify) -> String {
    let mut html = html.to_string();
    if opts.remove_comments {
        html = COMMENT
            .replace_all(&html, |caps: &Captures<'_>| {
                // Conditional comments are markup.
                if caps[1].starts_with("[if") {
                    caps[0].to_string()
                } else {
                    String::new()
                }
            })
            .into_owned();
    }
    if opts.collapse_whitespace {
        html = BETWEEN_TAGS.replace_all(&html, "><").into_owned();
        html = RUNS.replace_all(&html, " ").trim().to_string();
    }
    if opts.remove_attribute_quotes {
        html = QUOTED_ATTR
            .replace_all(&html, |caps: &Captures<'_>| {
                if caps[1].ends_with('/') {
                    caps[0].to_string()
                } else {
                    format!("={}", &caps[1])
                }
            })
            .into_owned();
    }
    html
}

fn rank(kind: ChunkKind) -> u8 {
    match kind {
        ChunkKind::Manifest => 0,
        ChunkKind::Vendor => 1,
        ChunkKind::SharedAsync => 2,
        ChunkKind::Entry => 3,
        ChunkKind::Async => 4,
    }
}

fn initial_chunks<'a>(chunks: &'a [RenderedChunk], order: ChunkOrder) -> Vec<&'a RenderedChunk> {
    let mut initial: Vec<&RenderedChunk> = chunks.iter().filter(|c| !c.kind.is_async()).collect();
    if order == ChunkOrder::Dependency {
        initial.sort_by_key(|c| rank(c.kind));
    }
    initial
}

pub(super) fn run(
    state: &mut BuildState,
    opts: &EmitHtmlOptions,
    descriptor: &BuildDescriptor,
) -> StageResult {
    let rendered = state
        .rendered
        .as_ref()
        .ok_or("name-outputs must run before emit-html")?;
    let template = document_template(descriptor).map_err(|e| {
        let path = descriptor
            .html_template
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        format!("cannot read template {path}: {e}")
    })?;

    let mut html = template;
    if opts.inject {
        let styles: Vec<String> = rendered
            .sheets
            .iter()
            .map(|(_, file)| descriptor.public_url(file))
            .collect();
        let scripts: Vec<String> = initial_chunks(&rendered.chunks, opts.chunk_order)
            .into_iter()
            .map(|c| descriptor.public_url(&c.file))
            .collect();
        html = inject_tags(&html, &styles, &scripts);
    }
    if let Some(minify) = &opts.minify {
        html = minify_html(&html, minify);
    }

    state
        .outputs
        .insert(descriptor.html_filename.clone(), html, ArtifactKind::Document);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, kind: ChunkKind) -> RenderedChunk {
        RenderedChunk {
            id: id.into(),
            kind,
            file: format!("js/{id}.js"),
            modules: Vec::new(),
        }
    }

    #[test]
    fn injects_links_in_head_and_scripts_in_body() {
        let html = inject_tags(
            DEFAULT_DOCUMENT,
            &["/static/css/app.css".into()],
            &["/static/js/manifest.js".into(), "/static/js/app.js".into()],
        );
        let link = html.find("app.css").unwrap();
        let head_end = html.find("</head>").unwrap();
        let manifest = html.find("manifest.js").unwrap();
        let app = html.find("app.js").unwrap();
        let body_end = html.find("</body>").unwrap();
        assert!(link < head_end);
        assert!(head_end < manifest && manifest < app && app < body_end);
    }

    #[test]
    fn dependency_order_puts_manifest_first_and_skips_async() {
        let chunks = [
            chunk("vendor", ChunkKind::Vendor),
            chunk("app", ChunkKind::Entry),
            chunk("3f2a", ChunkKind::Async),
            chunk("vendor-async", ChunkKind::SharedAsync),
            chunk("manifest", ChunkKind::Manifest),
        ];
        let ids: Vec<_> = initial_chunks(&chunks, ChunkOrder::Dependency)
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, ["manifest", "vendor", "app"]);

        let ids: Vec<_> = initial_chunks(&chunks, ChunkOrder::Insertion)
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, ["vendor", "app", "manifest"]);
    }

    #[test]
    fn minify_strips_comments_whitespace_and_quotes() {
        let html = "<html>\n  <!-- note -->\n  <!--[if IE]><p>old</p><![endif]-->\n  <div id=\"app\" title=\"a b\"></div>\n  <a href=\"/x/\">x</a>\n</html>";
        let out = minify_html(
            html,
            &HtmlMinify {
                remove_comments: true,
                collapse_whitespace: true,
                remove_attribute_quotes: true,
            },
        );
        assert!(!out.contains("note"));
        assert!(out.contains("[if IE]"));
        assert!(out.contains("<div id=app title=\"a b\">"));
        assert!(out.contains("href=\"/x/\""));
        assert!(!out.contains("\n"));
    }

    #[test]
    fn template_without_markers_gets_tags_appended() {
        let html = inject_tags("<p>hi</p>", &[], &["/a.js".into()]);
        assert_eq!(
            html,
            "<p>hi</p><script type=\"text/javascript\" src=\"/a.js\"></script>"
        );
    }
}
