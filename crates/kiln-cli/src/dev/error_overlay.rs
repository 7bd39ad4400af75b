//! Full-screen build error page shown in the browser.
//!
//! Only errors are rendered. The page subscribes to live updates and reloads
//! itself when the next build succeeds.

use crate::dev::server::{CLIENT_SCRIPT_PATH, LIVE_PATH};

/// Escape text for use inside HTML element content or attribute values.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the overlay page for `errors`. Every message is escaped.
pub fn render_overlay(errors: &[String]) -> String {
    let items: String = errors
        .iter()
        .map(|e| format!("    <pre class=\"kiln-error\">{}</pre>\n", html_escape(e)))
        .collect();
    let title = if errors.len() == 1 {
        "Failed to compile".to_string()
    } else {
        format!("Failed to compile ({} errors)", errors.len())
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{title}</title>
  <style>
    body {{ margin: 0; background: #1e1e1e; color: #e8e8e8; font-family: Menlo, Consolas, monospace; }}
    main {{ padding: 2rem; }}
    h1 {{ color: #ff5555; font-size: 1.4rem; }}
    .kiln-error {{ white-space: pre-wrap; background: #2b2b2b; border-left: 4px solid #ff5555; padding: 1rem; }}
    footer {{ color: #999; font-size: 0.85rem; }}
  </style>
</head>
<body>
  <main>
    <h1>{title}</h1>
{items}    <footer>This page reloads when the next build succeeds.</footer>
  </main>
  <script src="{CLIENT_SCRIPT_PATH}" data-live="{LIVE_PATH}"></script>
</body>
</html>
"#
    )
}
