use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use ulid::Ulid;

pub mod blocks;
pub mod render;
pub mod splice;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum CmsError {
    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub Ulid);

impl FormId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for FormId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for FormId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SubmissionId(pub Ulid);

impl SubmissionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SubmissionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ModalId(pub Ulid);

impl ModalId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ModalId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ModalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PopupId(pub Ulid);

impl PopupId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for PopupId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for PopupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    Contact,
    Newsletter,
    Lead,
    Custom,
}

impl FormType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Newsletter => "newsletter",
            Self::Lead => "lead",
            Self::Custom => "custom",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "contact" => Some(Self::Contact),
            "newsletter" => Some(Self::Newsletter),
            "lead" => Some(Self::Lead),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Draft,
    Active,
    Inactive,
}

impl PublishStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    New,
    Read,
    Archived,
    Spam,
}

impl SubmissionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Read => "read",
            Self::Archived => "archived",
            Self::Spam => "spam",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(Self::New),
            "read" => Some(Self::Read),
            "archived" => Some(Self::Archived),
            "spam" => Some(Self::Spam),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Time,
    Scroll,
    Exit,
    Click,
    Manual,
}

impl TriggerType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Scroll => "scroll",
            Self::Exit => "exit",
            Self::Click => "click",
            Self::Manual => "manual",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "time" => Some(Self::Time),
            "scroll" => Some(Self::Scroll),
            "exit" => Some(Self::Exit),
            "click" => Some(Self::Click),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PopupType {
    Banner,
    SlideIn,
    FullScreen,
    Corner,
    Bar,
}

impl PopupType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Banner => "banner",
            Self::SlideIn => "slide_in",
            Self::FullScreen => "full_screen",
            Self::Corner => "corner",
            Self::Bar => "bar",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "banner" => Some(Self::Banner),
            "slide_in" => Some(Self::SlideIn),
            "full_screen" => Some(Self::FullScreen),
            "corner" => Some(Self::Corner),
            "bar" => Some(Self::Bar),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PopupPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    TopBar,
    BottomBar,
    Center,
}

impl PopupPosition {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TopLeft => "top_left",
            Self::TopRight => "top_right",
            Self::BottomLeft => "bottom_left",
            Self::BottomRight => "bottom_right",
            Self::TopBar => "top_bar",
            Self::BottomBar => "bottom_bar",
            Self::Center => "center",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "top_left" => Some(Self::TopLeft),
            "top_right" => Some(Self::TopRight),
            "bottom_left" => Some(Self::BottomLeft),
            "bottom_right" => Some(Self::BottomRight),
            "top_bar" => Some(Self::TopBar),
            "bottom_bar" => Some(Self::BottomBar),
            "center" => Some(Self::Center),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Email,
    Tel,
    Number,
    Url,
    Textarea,
    Select,
    Radio,
    Checkbox,
    File,
    Heading,
    Paragraph,
    Divider,
    Rating,
}

impl FieldKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Tel => "tel",
            Self::Number => "number",
            Self::Url => "url",
            Self::Textarea => "textarea",
            Self::Select => "select",
            Self::Radio => "radio",
            Self::Checkbox => "checkbox",
            Self::File => "file",
            Self::Heading => "heading",
            Self::Paragraph => "paragraph",
            Self::Divider => "divider",
            Self::Rating => "rating",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "email" => Some(Self::Email),
            "tel" => Some(Self::Tel),
            "number" => Some(Self::Number),
            "url" => Some(Self::Url),
            "textarea" => Some(Self::Textarea),
            "select" => Some(Self::Select),
            "radio" => Some(Self::Radio),
            "checkbox" => Some(Self::Checkbox),
            "file" => Some(Self::File),
            "heading" => Some(Self::Heading),
            "paragraph" => Some(Self::Paragraph),
            "divider" => Some(Self::Divider),
            "rating" => Some(Self::Rating),
            _ => None,
        }
    }

    /// Kinds that accept visitor input, as opposed to layout-only kinds.
    #[must_use]
    pub fn is_input(self) -> bool {
        !matches!(self, Self::Heading | Self::Paragraph | Self::Divider)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeviceFrame {
    Desktop,
    Tablet,
    Mobile,
}

impl DeviceFrame {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Tablet => "tablet",
            Self::Mobile => "mobile",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "desktop" => Some(Self::Desktop),
            "tablet" => Some(Self::Tablet),
            "mobile" => Some(Self::Mobile),
            _ => None,
        }
    }

    /// Simulated viewport width; the desktop frame is unconstrained.
    #[must_use]
    pub fn max_width_px(self) -> Option<u32> {
        match self {
            Self::Desktop => None,
            Self::Tablet => Some(768),
            Self::Mobile => Some(375),
        }
    }
}

/// One dynamic form input as authored in the editor.
///
/// `kind` stays a raw string on purpose: descriptors round-trip through JSON
/// columns and the render layer must drop unrecognized kinds instead of
/// failing the whole preview. Write-side validation rejects unknown kinds so
/// new rows can never carry them.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct FieldDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct FormSettings {
    #[serde(default)]
    pub notify_email: Option<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default = "default_true")]
    pub store_submissions: bool,
}

impl Default for FormSettings {
    fn default() -> Self {
        Self { notify_email: None, redirect_url: None, store_submissions: true }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct FormStyling {
    #[serde(default)]
    pub theme_color: Option<String>,
    #[serde(default)]
    pub button_color: Option<String>,
    #[serde(default)]
    pub max_width_px: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct DisplayRules {
    #[serde(default)]
    pub include_pages: Vec<String>,
    #[serde(default)]
    pub exclude_pages: Vec<String>,
    #[serde(default)]
    pub devices: Vec<DeviceFrame>,
    #[serde(default)]
    pub new_visitors_only: bool,
    #[serde(default)]
    pub max_displays_per_visitor: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct Trigger {
    pub trigger_type: TriggerType,
    /// Seconds for `time`, scroll percentage for `scroll`; ignored otherwise.
    #[serde(default)]
    pub value: u32,
}

impl Trigger {
    /// Validate trigger configuration.
    ///
    /// # Errors
    /// Returns [`CmsError::Validation`] when a time/scroll trigger has no
    /// value, or a scroll trigger exceeds 100 percent.
    pub fn validate(&self) -> Result<(), CmsError> {
        match self.trigger_type {
            TriggerType::Time | TriggerType::Scroll if self.value == 0 => {
                Err(CmsError::Validation(format!(
                    "trigger value MUST be > 0 for {} triggers",
                    self.trigger_type.as_str()
                )))
            }
            TriggerType::Scroll if self.value > 100 => Err(CmsError::Validation(
                "scroll trigger value MUST be a percentage in 1..=100".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Form {
    pub form_id: FormId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub form_type: FormType,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    /// Raw HTML body for `custom` forms; entity-decoded before preview.
    #[serde(default)]
    pub custom_html: Option<String>,
    #[serde(default)]
    pub settings: FormSettings,
    #[serde(default)]
    pub styling: FormStyling,
    pub status: PublishStatus,
    pub submit_button_text: String,
    pub success_message: String,
    pub error_message: String,
    #[serde(default)]
    pub submission_count: u64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_submission_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Form {
    /// Validate a form definition before it is persisted.
    ///
    /// # Errors
    /// Returns [`CmsError::Validation`] when the name is empty, a custom form
    /// carries no HTML body, or any field descriptor is malformed.
    pub fn validate(&self) -> Result<(), CmsError> {
        if self.name.trim().is_empty() {
            return Err(CmsError::Validation("form name MUST be non-empty".to_string()));
        }

        if self.submit_button_text.trim().is_empty() {
            return Err(CmsError::Validation("submit button text MUST be non-empty".to_string()));
        }

        if self.form_type == FormType::Custom {
            let has_body =
                self.custom_html.as_deref().is_some_and(|html| !html.trim().is_empty());
            if !has_body {
                return Err(CmsError::Validation(
                    "custom forms MUST carry a non-empty custom_html body".to_string(),
                ));
            }
        }

        validate_fields(&self.fields)
    }
}

/// Validate a dynamic field list: ids unique and non-empty, labels present,
/// kinds recognized, option-backed kinds carrying at least one option.
///
/// # Errors
/// Returns [`CmsError::Validation`] naming the first offending field.
pub fn validate_fields(fields: &[FieldDescriptor]) -> Result<(), CmsError> {
    let mut seen_ids = BTreeSet::new();

    for field in fields {
        if field.id.trim().is_empty() {
            return Err(CmsError::Validation("field id MUST be non-empty".to_string()));
        }
        if !seen_ids.insert(field.id.as_str()) {
            return Err(CmsError::Validation(format!("duplicate field id: {}", field.id)));
        }

        let Some(kind) = FieldKind::parse(&field.kind) else {
            return Err(CmsError::Validation(format!(
                "unrecognized field type `{}` for field {}",
                field.kind, field.id
            )));
        };

        if field.label.trim().is_empty() && kind != FieldKind::Divider {
            return Err(CmsError::Validation(format!(
                "field {} MUST carry a label",
                field.id
            )));
        }

        if matches!(kind, FieldKind::Select | FieldKind::Radio) && field.options.is_empty() {
            return Err(CmsError::Validation(format!(
                "{} field {} MUST carry at least one option",
                kind.as_str(),
                field.id
            )));
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormSubmission {
    pub submission_id: SubmissionId,
    pub form_id: FormId,
    pub data: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    pub status: SubmissionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Modal {
    pub modal_id: ModalId,
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub body_html: String,
    pub trigger: Trigger,
    #[serde(default)]
    pub display_rules: DisplayRules,
    #[serde(default)]
    pub form_id: Option<FormId>,
    pub status: PublishStatus,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub conversions: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Modal {
    /// Validate a modal definition.
    ///
    /// # Errors
    /// Returns [`CmsError::Validation`] on an empty name/title or an invalid
    /// trigger.
    pub fn validate(&self) -> Result<(), CmsError> {
        if self.name.trim().is_empty() {
            return Err(CmsError::Validation("modal name MUST be non-empty".to_string()));
        }
        if self.title.trim().is_empty() {
            return Err(CmsError::Validation("modal title MUST be non-empty".to_string()));
        }
        self.trigger.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Popup {
    pub popup_id: PopupId,
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub body_html: String,
    pub popup_type: PopupType,
    pub position: PopupPosition,
    pub trigger: Trigger,
    #[serde(default)]
    pub display_rules: DisplayRules,
    #[serde(default)]
    pub form_id: Option<FormId>,
    /// Seconds until the popup dismisses itself; `0` disables auto-close and
    /// MUST round-trip as `0`, never null.
    #[serde(default)]
    pub auto_close_seconds: u32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    pub status: PublishStatus,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub conversions: u64,
    #[serde(default)]
    pub clicks: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Popup {
    /// Validate a popup definition.
    ///
    /// # Errors
    /// Returns [`CmsError::Validation`] on an empty name/title, an invalid
    /// trigger, or a schedule window that ends before it starts.
    pub fn validate(&self) -> Result<(), CmsError> {
        if self.name.trim().is_empty() {
            return Err(CmsError::Validation("popup name MUST be non-empty".to_string()));
        }
        if self.title.trim().is_empty() {
            return Err(CmsError::Validation("popup title MUST be non-empty".to_string()));
        }
        self.trigger.validate()?;

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(CmsError::Validation(
                    "popup schedule end_date MUST NOT precede start_date".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Whether the popup is active and inside its schedule window at `now`.
    /// Missing bounds are open-ended.
    #[must_use]
    pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
        if self.status != PublishStatus::Active {
            return false;
        }
        if self.start_date.is_some_and(|start| now < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| now > end) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    pub slug: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Page {
    /// Validate a page before it is persisted.
    ///
    /// # Errors
    /// Returns [`CmsError::Validation`] when the slug is empty or is not
    /// lowercase kebab-case, or the title is empty.
    pub fn validate(&self) -> Result<(), CmsError> {
        if !is_valid_slug(&self.slug) {
            return Err(CmsError::Validation(format!(
                "page slug MUST be non-empty lowercase kebab-case: `{}`",
                self.slug
            )));
        }
        if self.title.trim().is_empty() {
            return Err(CmsError::Validation("page title MUST be non-empty".to_string()));
        }
        Ok(())
    }
}

#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug.chars().all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

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
            name: "Book a visit".to_string(),
            description: Some("Request an appointment".to_string()),
            form_type: FormType::Lead,
            fields,
            custom_html: None,
            settings: FormSettings::default(),
            styling: FormStyling::default(),
            status: PublishStatus::Draft,
            submit_button_text: "Send".to_string(),
            success_message: "Thanks, we will call you back.".to_string(),
            error_message: "Something went wrong.".to_string(),
            submission_count: 0,
            last_submission_at: None,
            created_at: fixture_time(),
            updated_at: fixture_time(),
        }
    }

    fn mk_popup() -> Popup {
        Popup {
            popup_id: PopupId::new(),
            name: "spring-offer".to_string(),
            title: "Spring offer".to_string(),
            body_html: "<p>20% off first visit</p>".to_string(),
            popup_type: PopupType::Corner,
            position: PopupPosition::BottomRight,
            trigger: Trigger { trigger_type: TriggerType::Exit, value: 0 },
            display_rules: DisplayRules::default(),
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
        }
    }

    fn assert_validation_error_contains(result: Result<(), CmsError>, expected: &str) {
        let err = match result {
            Ok(()) => panic!("expected validation error containing: {expected}"),
            Err(err) => err,
        };
        assert!(
            err.to_string().contains(expected),
            "validation error `{err}` did not contain `{expected}`"
        );
    }

    #[test]
    fn validate_rejects_empty_form_name() {
        let mut form = mk_form(vec![mk_field("name", "text", "Name", true)]);
        form.name = "  ".to_string();
        assert_validation_error_contains(form.validate(), "form name MUST be non-empty");
    }

    #[test]
    fn validate_rejects_unrecognized_field_kind() {
        let form = mk_form(vec![mk_field("sig", "signature", "Signature", false)]);
        assert_validation_error_contains(form.validate(), "unrecognized field type `signature`");
    }

    #[test]
    fn validate_rejects_duplicate_field_ids() {
        let form = mk_form(vec![
            mk_field("name", "text", "Name", true),
            mk_field("name", "email", "Email", true),
        ]);
        assert_validation_error_contains(form.validate(), "duplicate field id: name");
    }

    #[test]
    fn validate_rejects_select_without_options() {
        let form = mk_form(vec![mk_field("dept", "select", "Department", false)]);
        assert_validation_error_contains(form.validate(), "MUST carry at least one option");
    }

    #[test]
    fn validate_rejects_custom_form_without_body() {
        let mut form = mk_form(Vec::new());
        form.form_type = FormType::Custom;
        form.custom_html = Some("   ".to_string());
        assert_validation_error_contains(form.validate(), "custom forms MUST carry");
    }

    #[test]
    fn validate_accepts_divider_without_label() {
        let form = mk_form(vec![
            mk_field("name", "text", "Name", true),
            mk_field("d1", "divider", "", false),
        ]);
        assert!(form.validate().is_ok());
    }

    #[test]
    fn trigger_rejects_zero_value_for_time_and_scroll() {
        let time_trigger = Trigger { trigger_type: TriggerType::Time, value: 0 };
        assert_validation_error_contains(time_trigger.validate(), "MUST be > 0");

        let scroll_trigger = Trigger { trigger_type: TriggerType::Scroll, value: 120 };
        assert_validation_error_contains(scroll_trigger.validate(), "percentage in 1..=100");
    }

    #[test]
    fn exit_trigger_with_zero_value_is_valid() {
        let trigger = Trigger { trigger_type: TriggerType::Exit, value: 0 };
        assert!(trigger.validate().is_ok());
    }

    #[test]
    fn popup_schedule_end_before_start_is_rejected() {
        let mut popup = mk_popup();
        popup.start_date = Some(fixture_time());
        popup.end_date = Some(fixture_time() - Duration::days(1));
        assert_validation_error_contains(popup.validate(), "end_date MUST NOT precede");
    }

    #[test]
    fn popup_auto_close_zero_round_trips_through_json() {
        let popup = mk_popup();
        let json = match serde_json::to_string(&popup) {
            Ok(json) => json,
            Err(err) => panic!("popup should serialize: {err}"),
        };
        assert!(json.contains("\"auto_close_seconds\":0"));

        let restored: Popup = match serde_json::from_str(&json) {
            Ok(popup) => popup,
            Err(err) => panic!("popup should deserialize: {err}"),
        };
        assert_eq!(restored.auto_close_seconds, 0);
        assert_eq!(restored, popup);
    }

    #[test]
    fn popup_live_window_honors_open_bounds() {
        let mut popup = mk_popup();
        assert!(popup.is_live_at(fixture_time()));

        popup.start_date = Some(fixture_time() + Duration::days(1));
        assert!(!popup.is_live_at(fixture_time()));

        popup.start_date = None;
        popup.end_date = Some(fixture_time() - Duration::days(1));
        assert!(!popup.is_live_at(fixture_time()));

        popup.end_date = None;
        popup.status = PublishStatus::Inactive;
        assert!(!popup.is_live_at(fixture_time()));
    }

    #[test]
    fn field_descriptor_uses_type_key_in_json() {
        let field = mk_field("name", "text", "Name", true);
        let json = match serde_json::to_value(&field) {
            Ok(json) => json,
            Err(err) => panic!("field should serialize: {err}"),
        };
        assert_eq!(json.get("type").and_then(serde_json::Value::as_str), Some("text"));
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn slug_validation_accepts_kebab_and_rejects_others() {
        assert!(is_valid_slug("about-us"));
        assert!(is_valid_slug("services2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("About"));
        assert!(!is_valid_slug("-lead"));
        assert!(!is_valid_slug("spaced slug"));
    }
}
