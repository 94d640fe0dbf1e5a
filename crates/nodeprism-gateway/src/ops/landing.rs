//! Static landing page linking to the metrics path.

use std::fmt::Write;

/// Pre-rendered landing page; built once at startup.
#[derive(Debug, Clone)]
pub struct LandingPage {
    html: String,
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

impl LandingPage {
    pub fn new(name: &str, description: &str, version: &str, metrics_path: &str) -> Self {
        let mut html = String::new();
        let name = escape_html(name);
        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n<title>{name}</title>\n</head>\n<body>\n<header><h1>{name}</h1></header>\n<main>\n<p>{}</p>\n<p>Version: {}</p>\n<ul>\n<li><a href=\"{path}\">Metrics</a></li>\n</ul>\n</main>\n</body>\n</html>\n",
            escape_html(description),
            escape_html(version),
            path = escape_html(metrics_path),
        );
        Self { html }
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}
