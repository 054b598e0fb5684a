//! Preview rendering: field descriptors, blocks, and full preview documents.
//!
//! All controls render disabled. This layer produces markup for authoring
//! feedback, never a live form.

use crate::blocks::{Block, BlockBody};
use crate::{
    DeviceFrame, FieldDescriptor, FieldKind, Form, FormType, Modal, Popup, PopupPosition,
};

/// Escape text for safe interpolation into HTML body or attribute positions.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Decode the small entity set the editor produces when storing custom HTML.
#[must_use]
pub fn decode_html_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let mut matched = false;
        for (entity, plain) in [
            ("&amp;", "&"),
            ("&lt;", "<"),
            ("&gt;", ">"),
            ("&quot;", "\""),
            ("&#39;", "'"),
            ("&#039;", "'"),
            ("&nbsp;", " "),
        ] {
            if rest.starts_with(entity) {
                out.push_str(plain);
                rest = &rest[entity.len()..];
                matched = true;
                break;
            }
        }
        if !matched {
            out.push('&');
            rest = &rest[1..];
        }
    }
    out.push_str(rest);
    out
}

fn push_label(out: &mut String, field: &FieldDescriptor) {
    out.push_str("<label class=\"field-label\" for=\"");
    out.push_str(&escape_html(&field.id));
    out.push_str("\">");
    out.push_str(&escape_html(&field.label));
    if field.required {
        out.push_str("<span class=\"required\" style=\"color:#dc2626\">*</span>");
    }
    out.push_str("</label>");
}

fn push_description(out: &mut String, field: &FieldDescriptor) {
    if let Some(description) = &field.description {
        out.push_str("<p class=\"field-description\">");
        out.push_str(&escape_html(description));
        out.push_str("</p>");
    }
}

fn push_input_attrs(out: &mut String, field: &FieldDescriptor) {
    out.push_str(" id=\"");
    out.push_str(&escape_html(&field.id));
    out.push_str("\" name=\"");
    out.push_str(&escape_html(&field.id));
    out.push('"');
    if let Some(placeholder) = &field.placeholder {
        out.push_str(" placeholder=\"");
        out.push_str(&escape_html(placeholder));
        out.push('"');
    }
    if field.required {
        out.push_str(" required");
    }
    out.push_str(" disabled");
}

/// Render one field descriptor to preview markup.
///
/// Unrecognized `type` values yield `None` rather than an error; the caller
/// skips them, so a preview never fails on data written by a newer editor.
#[must_use]
pub fn render_field(field: &FieldDescriptor) -> Option<String> {
    let kind = FieldKind::parse(&field.kind)?;
    let mut out = String::new();
    out.push_str("<div class=\"field\" data-field-id=\"");
    out.push_str(&escape_html(&field.id));
    out.push_str("\">");

    match kind {
        FieldKind::Text | FieldKind::Email | FieldKind::Tel | FieldKind::Number
        | FieldKind::Url => {
            push_label(&mut out, field);
            push_description(&mut out, field);
            out.push_str("<input type=\"");
            out.push_str(kind.as_str());
            out.push('"');
            push_input_attrs(&mut out, field);
            out.push_str(" />");
        }
        FieldKind::Textarea => {
            push_label(&mut out, field);
            push_description(&mut out, field);
            out.push_str("<textarea rows=\"4\"");
            push_input_attrs(&mut out, field);
            out.push_str("></textarea>");
        }
        FieldKind::Select => {
            push_label(&mut out, field);
            push_description(&mut out, field);
            out.push_str("<select");
            push_input_attrs(&mut out, field);
            out.push('>');
            out.push_str("<option value=\"\">Select...</option>");
            for option in &field.options {
                out.push_str("<option>");
                out.push_str(&escape_html(option));
                out.push_str("</option>");
            }
            out.push_str("</select>");
        }
        FieldKind::Radio => {
            push_label(&mut out, field);
            push_description(&mut out, field);
            for option in &field.options {
                out.push_str("<label class=\"option\"><input type=\"radio\" name=\"");
                out.push_str(&escape_html(&field.id));
                out.push_str("\" disabled /> ");
                out.push_str(&escape_html(option));
                out.push_str("</label>");
            }
        }
        FieldKind::Checkbox => {
            if field.options.is_empty() {
                out.push_str("<label class=\"option\"><input type=\"checkbox\" disabled /> ");
                out.push_str(&escape_html(&field.label));
                if field.required {
                    out.push_str("<span class=\"required\" style=\"color:#dc2626\">*</span>");
                }
                out.push_str("</label>");
                push_description(&mut out, field);
            } else {
                push_label(&mut out, field);
                push_description(&mut out, field);
                for option in &field.options {
                    out.push_str("<label class=\"option\"><input type=\"checkbox\" disabled /> ");
                    out.push_str(&escape_html(option));
                    out.push_str("</label>");
                }
            }
        }
        FieldKind::File => {
            push_label(&mut out, field);
            push_description(&mut out, field);
            out.push_str("<input type=\"file\"");
            push_input_attrs(&mut out, field);
            out.push_str(" />");
        }
        FieldKind::Heading => {
            out.push_str("<h3>");
            out.push_str(&escape_html(&field.label));
            out.push_str("</h3>");
        }
        FieldKind::Paragraph => {
            out.push_str("<p>");
            out.push_str(&escape_html(&field.label));
            out.push_str("</p>");
        }
        FieldKind::Divider => {
            out.push_str("<hr />");
        }
        FieldKind::Rating => {
            push_label(&mut out, field);
            push_description(&mut out, field);
            out.push_str("<div class=\"rating\" aria-label=\"rating\">");
            for _ in 0..5 {
                out.push_str("<span class=\"star\">&#9733;</span>");
            }
            out.push_str("</div>");
        }
    }

    out.push_str("</div>");
    Some(out)
}

/// Render the field list, silently dropping unrecognized kinds.
#[must_use]
pub fn render_fields(fields: &[FieldDescriptor]) -> String {
    let mut out = String::new();
    for field in fields {
        if let Some(markup) = render_field(field) {
            out.push_str(&markup);
        }
    }
    out
}

/// Render a form preview body: custom forms emit their entity-decoded HTML,
/// structured forms a card with rendered fields and a disabled submit button.
#[must_use]
pub fn render_form_preview(form: &Form) -> String {
    if form.form_type == FormType::Custom {
        if let Some(custom) = &form.custom_html {
            return decode_html_entities(custom);
        }
    }

    let mut out = String::new();
    out.push_str("<form class=\"form-preview\"");
    if let Some(max_width) = form.styling.max_width_px {
        out.push_str(&format!(" style=\"max-width:{max_width}px\""));
    }
    out.push('>');
    if let Some(description) = &form.description {
        out.push_str("<p class=\"form-description\">");
        out.push_str(&escape_html(description));
        out.push_str("</p>");
    }
    out.push_str(&render_fields(&form.fields));
    out.push_str("<button type=\"submit\" disabled");
    if let Some(color) = &form.styling.button_color {
        out.push_str(" style=\"background:");
        out.push_str(&escape_html(color));
        out.push('"');
    }
    out.push('>');
    out.push_str(&escape_html(&form.submit_button_text));
    out.push_str("</button></form>");
    out
}

/// Render a modal preview: dialog chrome with title, body, embedded form
/// preview when one is attached, and a Cancel button.
#[must_use]
pub fn render_modal_preview(modal: &Modal, form: Option<&Form>) -> String {
    let mut out = String::new();
    out.push_str("<div class=\"modal-backdrop\"><div class=\"modal\" role=\"dialog\">");
    out.push_str("<h2 class=\"modal-title\">");
    out.push_str(&escape_html(&modal.title));
    out.push_str("</h2><div class=\"modal-body\">");
    out.push_str(&modal.body_html);
    out.push_str("</div>");
    if let Some(form) = form {
        out.push_str(&render_form_preview(form));
    }
    out.push_str("<button type=\"button\" class=\"modal-cancel\" disabled>Cancel</button>");
    out.push_str("</div></div>");
    out
}

fn popup_position_style(position: PopupPosition) -> &'static str {
    match position {
        PopupPosition::TopLeft => "top:1rem;left:1rem",
        PopupPosition::TopRight => "top:1rem;right:1rem",
        PopupPosition::BottomLeft => "bottom:1rem;left:1rem",
        PopupPosition::BottomRight => "bottom:1rem;right:1rem",
        PopupPosition::TopBar => "top:0;left:0;right:0",
        PopupPosition::BottomBar => "bottom:0;left:0;right:0",
        PopupPosition::Center => "top:50%;left:50%;transform:translate(-50%,-50%)",
    }
}

/// Render a popup preview positioned per its configuration, with a close
/// button and an embedded form preview when one is attached.
#[must_use]
pub fn render_popup_preview(popup: &Popup, form: Option<&Form>) -> String {
    let mut out = String::new();
    out.push_str("<div class=\"popup popup-");
    out.push_str(popup.popup_type.as_str());
    out.push_str("\" style=\"position:fixed;");
    out.push_str(popup_position_style(popup.position));
    out.push_str("\">");
    out.push_str("<button type=\"button\" class=\"popup-close\" aria-label=\"close\" disabled>&times;</button>");
    out.push_str("<h3 class=\"popup-title\">");
    out.push_str(&escape_html(&popup.title));
    out.push_str("</h3><div class=\"popup-body\">");
    out.push_str(&popup.body_html);
    out.push_str("</div>");
    if let Some(form) = form {
        out.push_str(&render_form_preview(form));
    }
    out.push_str("</div>");
    out
}

/// Render an ordered block list to HTML.
#[must_use]
pub fn render_blocks(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        out.push_str("<div class=\"block block-");
        out.push_str(block.body.kind());
        out.push_str("\" data-block-id=\"");
        out.push_str(&block.block_id.to_string());
        out.push_str("\">");
        match &block.body {
            BlockBody::Text { html } => out.push_str(html),
            BlockBody::Heading { text, level } => {
                let level = (*level).clamp(1, 6);
                out.push_str(&format!("<h{level}>"));
                out.push_str(&escape_html(text));
                out.push_str(&format!("</h{level}>"));
            }
            BlockBody::Image { src, alt, caption } => {
                out.push_str("<figure><img src=\"");
                out.push_str(&escape_html(src));
                out.push_str("\" alt=\"");
                out.push_str(&escape_html(alt));
                out.push_str("\" />");
                if let Some(caption) = caption {
                    out.push_str("<figcaption>");
                    out.push_str(&escape_html(caption));
                    out.push_str("</figcaption>");
                }
                out.push_str("</figure>");
            }
            BlockBody::Video { src, caption } => {
                out.push_str("<figure><video controls src=\"");
                out.push_str(&escape_html(src));
                out.push_str("\"></video>");
                if let Some(caption) = caption {
                    out.push_str("<figcaption>");
                    out.push_str(&escape_html(caption));
                    out.push_str("</figcaption>");
                }
                out.push_str("</figure>");
            }
            BlockBody::Code { code, language } => {
                out.push_str("<pre><code");
                if let Some(language) = language {
                    out.push_str(" class=\"language-");
                    out.push_str(&escape_html(language));
                    out.push('"');
                }
                out.push('>');
                out.push_str(&escape_html(code));
                out.push_str("</code></pre>");
            }
            BlockBody::Quote { text, author } => {
                out.push_str("<blockquote><p>");
                out.push_str(&escape_html(text));
                out.push_str("</p>");
                if let Some(author) = author {
                    out.push_str("<cite>");
                    out.push_str(&escape_html(author));
                    out.push_str("</cite>");
                }
                out.push_str("</blockquote>");
            }
        }
        out.push_str("</div>");
    }
    out
}

/// Attribute value for the preview `<iframe>`'s sandbox.
pub const IFRAME_SANDBOX: &str = "allow-scripts allow-same-origin allow-forms";

#[derive(Debug, Clone, Copy, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CssFramework {
    None,
    Tailwind,
    Bootstrap,
}

impl CssFramework {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Tailwind => "tailwind",
            Self::Bootstrap => "bootstrap",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "tailwind" => Some(Self::Tailwind),
            "bootstrap" => Some(Self::Bootstrap),
            _ => None,
        }
    }

    fn head_tag(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Tailwind => "<script src=\"https://cdn.tailwindcss.com\"></script>",
            Self::Bootstrap => {
                "<link rel=\"stylesheet\" href=\"https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css\" />"
            }
        }
    }
}

/// Inputs for a full preview document written into an iframe.
#[derive(Debug, Clone)]
pub struct PreviewDocument {
    pub title: String,
    pub body_html: String,
    pub framework: CssFramework,
    pub device: DeviceFrame,
    pub custom_css: Option<String>,
    pub custom_js: Option<String>,
}

impl PreviewDocument {
    #[must_use]
    pub fn new(title: &str, body_html: String) -> Self {
        Self {
            title: title.to_string(),
            body_html,
            framework: CssFramework::None,
            device: DeviceFrame::Desktop,
            custom_css: None,
            custom_js: None,
        }
    }

    /// Build the complete HTML document. Device simulation is a `max-width`
    /// constraint on the body wrapper, nothing more.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        out.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\" />");
        out.push_str(
            "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />",
        );
        out.push_str("<title>");
        out.push_str(&escape_html(&self.title));
        out.push_str("</title>");
        out.push_str(self.framework.head_tag());
        if let Some(css) = &self.custom_css {
            out.push_str("<style>");
            out.push_str(css);
            out.push_str("</style>");
        }
        out.push_str("</head><body><div class=\"device-frame device-");
        out.push_str(self.device.as_str());
        out.push('"');
        if let Some(width) = self.device.max_width_px() {
            out.push_str(&format!(" style=\"max-width:{width}px;margin:0 auto\""));
        }
        out.push('>');
        out.push_str(&self.body_html);
        out.push_str("</div>");
        if let Some(js) = &self.custom_js {
            out.push_str("<script>");
            out.push_str(js);
            out.push_str("</script>");
        }
        out.push_str("</body></html>");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        FormId, FormSettings, FormStyling, ModalId, PopupId, PublishStatus, Trigger, TriggerType,
    };
    use time::{Duration, OffsetDateTime};

    fn fixture_time() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::seconds(1_760_000_000)
    }

    fn mk_field(id: &str, kind: &str, label: &str, required: bool) -> FieldDescriptor {
        FieldDescriptor {
            id: id.to_string(),
            kind: kind.to_string(),
            label: label.to_string(),
            required,
            placeholder: None,
            description: None,
            options: Vec::new(),
        }
    }

    fn mk_form(fields: Vec<FieldDescriptor>) -> Form {
        Form {
            form_id: FormId::new(),
            name: "Contact".to_string(),
            description: None,
            form_type: FormType::Contact,
            fields,
            custom_html: None,
            settings: FormSettings::default(),
            styling: FormStyling::default(),
            status: PublishStatus::Active,
            submit_button_text: "Send".to_string(),
            success_message: "Thanks".to_string(),
            error_message: "Failed".to_string(),
            submission_count: 0,
            last_submission_at: None,
            created_at: fixture_time(),
            updated_at: fixture_time(),
        }
    }

    #[test]
    fn recognized_kinds_render_one_node_with_label() {
        for kind in [
            "text", "email", "tel", "number", "url", "textarea", "file", "rating",
        ] {
            let field = mk_field("f1", kind, "My label", false);
            let markup = match render_field(&field) {
                Some(markup) => markup,
                None => panic!("kind {kind} should render"),
            };
            assert_eq!(markup.matches("data-field-id=\"f1\"").count(), 1);
            assert!(markup.contains("My label"), "kind {kind} missing label");
        }
    }

    #[test]
    fn required_field_carries_red_asterisk() {
        let field = mk_field("name", "text", "Name", true);
        let markup = match render_field(&field) {
            Some(markup) => markup,
            None => panic!("text field should render"),
        };
        assert!(markup.contains("class=\"required\""));
        assert!(markup.contains('*'));
        assert!(markup.contains("#dc2626"));
    }

    #[test]
    fn unrecognized_kind_renders_nothing() {
        let field = mk_field("sig", "signature", "Signature", true);
        assert!(render_field(&field).is_none());
    }

    #[test]
    fn render_fields_drops_unknown_kinds_silently() {
        let fields = vec![
            mk_field("name", "text", "Name", true),
            mk_field("sig", "signature", "Signature", false),
            mk_field("email", "email", "Email", true),
        ];
        let markup = render_fields(&fields);
        assert!(markup.contains("data-field-id=\"name\""));
        assert!(markup.contains("data-field-id=\"email\""));
        assert!(!markup.contains("sig"));
    }

    #[test]
    fn single_required_text_field_scenario() {
        let form = mk_form(vec![mk_field("1", "text", "Name", true)]);
        let markup = render_form_preview(&form);
        assert_eq!(markup.matches("<input").count(), 1);
        assert!(markup.contains("Name"));
        assert!(markup.contains("class=\"required\""));
        // Submit button plus the one field, no other controls.
        assert_eq!(markup.matches("<select").count(), 0);
        assert_eq!(markup.matches("<textarea").count(), 0);
    }

    #[test]
    fn select_renders_all_options() {
        let mut field = mk_field("dept", "select", "Department", false);
        field.options = vec!["Dental".to_string(), "Derma".to_string()];
        let markup = match render_field(&field) {
            Some(markup) => markup,
            None => panic!("select should render"),
        };
        assert!(markup.contains("<option>Dental</option>"));
        assert!(markup.contains("<option>Derma</option>"));
    }

    #[test]
    fn labels_are_escaped() {
        let field = mk_field("x", "text", "<script>alert(1)</script>", false);
        let markup = match render_field(&field) {
            Some(markup) => markup,
            None => panic!("text should render"),
        };
        assert!(!markup.contains("<script>"));
        assert!(markup.contains("&lt;script&gt;"));
    }

    #[test]
    fn custom_form_preview_decodes_entities() {
        let mut form = mk_form(Vec::new());
        form.form_type = FormType::Custom;
        form.custom_html = Some("&lt;form&gt;&lt;input /&gt;&lt;/form&gt;".to_string());
        assert_eq!(render_form_preview(&form), "<form><input /></form>");
    }

    #[test]
    fn decode_leaves_bare_ampersands_alone() {
        assert_eq!(decode_html_entities("fish &amp; chips & more"), "fish & chips & more");
        assert_eq!(decode_html_entities("&#039;quoted&#39;"), "'quoted'");
    }

    #[test]
    fn modal_preview_carries_title_and_cancel() {
        let modal = Modal {
            modal_id: ModalId::new(),
            name: "welcome".to_string(),
            title: "Welcome!".to_string(),
            body_html: "<p>Hello</p>".to_string(),
            trigger: Trigger { trigger_type: TriggerType::Time, value: 3 },
            display_rules: crate::DisplayRules::default(),
            form_id: None,
            status: PublishStatus::Active,
            views: 0,
            conversions: 0,
            created_at: fixture_time(),
            updated_at: fixture_time(),
        };
        let markup = render_modal_preview(&modal, None);
        assert!(markup.contains("role=\"dialog\""));
        assert!(markup.contains("Welcome!"));
        assert!(markup.contains(">Cancel<"));
    }

    #[test]
    fn popup_preview_positions_by_configuration() {
        let popup = Popup {
            popup_id: PopupId::new(),
            name: "offer".to_string(),
            title: "Offer".to_string(),
            body_html: String::new(),
            popup_type: crate::PopupType::Corner,
            position: PopupPosition::BottomRight,
            trigger: Trigger { trigger_type: TriggerType::Exit, value: 0 },
            display_rules: crate::DisplayRules::default(),
            form_id: None,
            auto_close_seconds: 0,
            start_date: None,
            end_date: None,
            status: PublishStatus::Active,
            views: 0,
            conversions: 0,
            clicks: 0,
            created_at: fixture_time(),
            updated_at: fixture_time(),
        };
        let markup = render_popup_preview(&popup, None);
        assert!(markup.contains("bottom:1rem;right:1rem"));
        assert!(markup.contains("popup-close"));
    }

    #[test]
    fn preview_document_constrains_width_per_device() {
        let mut doc = PreviewDocument::new("Preview", "<p>hi</p>".to_string());
        doc.device = DeviceFrame::Mobile;
        doc.framework = CssFramework::Tailwind;
        let html = doc.to_html();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("max-width:375px"));
        assert!(html.contains("cdn.tailwindcss.com"));

        doc.device = DeviceFrame::Desktop;
        assert!(!doc.to_html().contains("max-width:"));
    }

    #[test]
    fn preview_document_injects_custom_css_and_js() {
        let mut doc = PreviewDocument::new("Preview", String::new());
        doc.custom_css = Some("body{background:#fff}".to_string());
        doc.custom_js = Some("console.log('preview')".to_string());
        let html = doc.to_html();
        assert!(html.contains("<style>body{background:#fff}</style>"));
        assert!(html.contains("<script>console.log('preview')</script>"));
    }
}
