/// Values shown on the single HTML page.
#[derive(Debug, Default)]
pub struct IndexPage<'a> {
	pub models: Vec<&'a str>,
	pub selected_model: &'a str,
	pub prompt: &'a str,
	pub generated_text: Option<&'a str>,
	/// Shown under the result when generation stopped early.
	pub notice: Option<&'a str>,
	/// Page-level error (e.g. nothing could be loaded at startup).
	pub error: Option<&'a str>,
}

impl IndexPage<'_> {
	/// Renders the form, the optional error and the optional result.
	pub fn render(&self) -> String {
		let mut html = String::with_capacity(2048);
		html.push_str(concat!(
			"<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n",
			"<meta charset=\"utf-8\">\n<title>Text generation</title>\n",
			"<style>body{font-family:sans-serif;max-width:48rem;margin:2rem auto}",
			"textarea{width:100%}.error{color:#b00020}.notice{color:#8a6d00}.output{white-space:pre-wrap;",
			"background:#f4f4f4;padding:1rem}</style>\n",
			"</head>\n<body>\n<h1>Text generation</h1>\n",
		));

		if let Some(error) = self.error {
			html.push_str(&format!("<p class=\"error\">{}</p>\n", escape_html(error)));
		}

		html.push_str("<form method=\"post\" action=\"/\">\n");
		html.push_str(&format!(
			"<label for=\"prompt\">Prompt</label>\n<textarea id=\"prompt\" name=\"prompt\" rows=\"4\">{}</textarea>\n",
			escape_html(self.prompt)
		));

		html.push_str("<label for=\"model_select\">Model</label>\n<select id=\"model_select\" name=\"model_select\">\n");
		for model in &self.models {
			let selected = if *model == self.selected_model { " selected" } else { "" };
			html.push_str(&format!("<option value=\"{0}\"{1}>{0}</option>\n", escape_html(model), selected));
		}
		html.push_str("</select>\n<button type=\"submit\">Generate</button>\n</form>\n");

		if let Some(text) = self.generated_text {
			html.push_str(&format!("<h2>Result</h2>\n<div class=\"output\">{}</div>\n", escape_html(text)));
			if let Some(notice) = self.notice {
				html.push_str(&format!("<p class=\"notice\">{}</p>\n", escape_html(notice)));
			}
		}

		html.push_str("</body>\n</html>\n");
		html
	}
}

/// Escapes the characters that are significant in HTML text and
/// attribute values.
pub fn escape_html(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());
	for c in text.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#39;"),
			_ => escaped.push(c),
		}
	}
	escaped
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn escapes_markup() {
		assert_eq!(escape_html(r#"<a href="x">&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;");
	}

	#[test]
	fn marks_selected_model() {
		let page = IndexPage {
			models: vec!["a", "b"],
			selected_model: "b",
			..Default::default()
		};
		let html = page.render();
		assert!(html.contains("<option value=\"a\">a</option>"));
		assert!(html.contains("<option value=\"b\" selected>b</option>"));
		assert!(!html.contains("Result"));
	}

	#[test]
	fn shows_result_and_error() {
		let page = IndexPage {
			generated_text: Some("hola mundo"),
			error: Some("boom"),
			..Default::default()
		};
		let html = page.render();
		assert!(html.contains("<div class=\"output\">hola mundo</div>"));
		assert!(html.contains("<p class=\"error\">boom</p>"));
		assert!(!html.contains("class=\"notice\""));
	}

	#[test]
	fn shows_notice_under_result() {
		let page = IndexPage {
			generated_text: Some("hola"),
			notice: Some("stopped <early>"),
			..Default::default()
		};
		let html = page.render();
		assert!(html.contains("<div class=\"output\">hola</div>\n<p class=\"notice\">stopped &lt;early&gt;</p>"));
	}
}
