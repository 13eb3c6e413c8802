use uuid::Uuid;

pub const OSMD_SCRIPT_URL: &str =
    "https://cdn.jsdelivr.net/npm/opensheetmusicdisplay@1/build/opensheetmusicdisplay.min.js";

/// Builds the HTML fragment that renders a MusicXML score in the browser.
#[derive(Debug, Clone)]
pub struct ScoreRenderer {
    script_url: String,
}

impl ScoreRenderer {
    pub fn new() -> Self {
        Self::with_script_url(OSMD_SCRIPT_URL)
    }

    pub fn with_script_url(url: impl Into<String>) -> Self {
        Self {
            script_url: url.into(),
        }
    }

    pub fn script_url(&self) -> &str {
        &self.script_url
    }

    pub fn render(&self, musicxml: &str) -> String {
        let container_id = format!("score-{}", Uuid::new_v4().simple());
        let document = embed_in_script(musicxml);

        format!(
            r#"<div id="{id}" class="score"></div>
<script src="{src}"></script>
<script>
(function () {{
  var xml = {document};
  var osmd = new opensheetmusicdisplay.OpenSheetMusicDisplay("{id}", {{
    autoResize: true,
    backend: "svg",
    drawTitle: true
  }});
  osmd.load(xml).then(function () {{ osmd.render(); }});
}})();
</script>
"#,
            id = container_id,
            src = self.script_url,
            document = document,
        )
    }
}

impl Default for ScoreRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON string literal that is also safe inside a `<script>` element.
pub fn embed_in_script(text: &str) -> String {
    // Serializing a &str cannot fail.
    let json = serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string());
    json.replace("</", "<\\/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_document_cannot_close_script() {
        let xml = "<score-partwise><work-title>a</script><b></work-title></score-partwise>";
        let html = ScoreRenderer::new().render(xml);

        assert_eq!(html.matches("</script>").count(), 2);
        assert!(html.contains(r#"<\/script>"#));
    }

    #[test]
    fn test_embedded_document_round_trips_as_json() {
        let xml = "<?xml version=\"1.0\"?>\n<a>\"quoted\" & </a>";
        let literal = embed_in_script(xml);
        let parsed: String = serde_json::from_str(&literal).unwrap();
        assert_eq!(parsed, xml);
    }

    #[test]
    fn test_container_ids_are_unique() {
        let renderer = ScoreRenderer::new();
        let first = renderer.render("<a/>");
        let second = renderer.render("<a/>");

        let id = |html: &str| html.split('"').nth(1).unwrap().to_string();
        assert!(id(&first).starts_with("score-"));
        assert_ne!(id(&first), id(&second));
        assert!(first.contains(&format!("OpenSheetMusicDisplay(\"{}\"", id(&first))));
    }

    #[test]
    fn test_custom_script_url() {
        let html = ScoreRenderer::with_script_url("/static/osmd.js").render("<a/>");
        assert!(html.contains(r#"<script src="/static/osmd.js"></script>"#));
    }
}
