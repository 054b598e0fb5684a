use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use sitecms_core::render::{
    render_form_preview, render_modal_preview, render_popup_preview, CssFramework,
    PreviewDocument,
};
use sitecms_core::splice::SpliceOp;
use sitecms_core::{
    DeviceFrame, DisplayRules, FieldDescriptor, Form, FormId, FormSettings, FormStyling,
    FormSubmission, FormType, Modal, ModalId, Page, Popup, PopupId, PopupPosition, PopupType,
    PublishStatus, SubmissionId, SubmissionStatus, Trigger,
};
use sitecms_store_sqlite::{
    ExportManifest, ImportSummary, IntegrityReport, ModalCounter, PageSpliceReport, PopupCounter,
    SchemaStatus, SqliteStore,
};
use time::OffsetDateTime;

pub const API_CONTRACT_VERSION: &str = "api.v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MigrateResult {
    pub dry_run: bool,
    pub current_version: i64,
    pub target_version: i64,
    pub would_apply_versions: Vec<i64>,
    pub inferred_from_legacy: bool,
    pub after_version: Option<i64>,
    pub up_to_date: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateFormRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub form_type: FormType,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub custom_html: Option<String>,
    #[serde(default)]
    pub settings: FormSettings,
    #[serde(default)]
    pub styling: FormStyling,
    pub status: PublishStatus,
    #[serde(default = "default_submit_button_text")]
    pub submit_button_text: String,
    #[serde(default = "default_success_message")]
    pub success_message: String,
    #[serde(default = "default_error_message")]
    pub error_message: String,
}

fn default_submit_button_text() -> String {
    "Submit".to_string()
}

fn default_success_message() -> String {
    "Thank you! Your submission has been received.".to_string()
}

fn default_error_message() -> String {
    "Something went wrong. Please try again.".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordSubmissionRequest {
    pub form_id: FormId,
    pub data: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateModalRequest {
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
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatePopupRequest {
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
    #[serde(default)]
    pub auto_close_seconds: u32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    pub status: PublishStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpsertPageRequest {
    pub slug: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SplicePageRequest {
    pub slug: String,
    pub op: SpliceOp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreviewResult {
    pub html: String,
    pub device: DeviceFrame,
    pub framework: CssFramework,
}

/// Typed facade over the store. Each call opens the database, migrates it to
/// the latest schema, performs the operation, and closes the connection.
#[derive(Debug, Clone)]
pub struct SiteCmsApi {
    db_path: PathBuf,
}

impl SiteCmsApi {
    #[must_use]
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    fn open_store(&self) -> Result<SqliteStore> {
        SqliteStore::open(&self.db_path)
    }

    fn open_migrated(&self) -> Result<SqliteStore> {
        let mut store = self.open_store()?;
        store.migrate()?;
        Ok(store)
    }

    /// Inspect schema status without mutating data.
    ///
    /// # Errors
    /// Returns an error when the `SQLite` database cannot be opened or queried.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        let store = self.open_store()?;
        store.schema_status()
    }

    /// Apply pending migrations, or return planned versions for dry-run mode.
    ///
    /// # Errors
    /// Returns an error when migration planning or execution fails.
    pub fn migrate(&self, dry_run: bool) -> Result<MigrateResult> {
        let mut store = self.open_store()?;
        let before = store.schema_status()?;
        if dry_run {
            return Ok(MigrateResult {
                dry_run: true,
                current_version: before.current_version,
                target_version: before.target_version,
                would_apply_versions: before.pending_versions,
                inferred_from_legacy: before.inferred_from_legacy,
                after_version: None,
                up_to_date: None,
            });
        }

        let planned_versions = before.pending_versions;
        store.migrate()?;
        let after = store.schema_status()?;
        Ok(MigrateResult {
            dry_run: false,
            current_version: before.current_version,
            target_version: before.target_version,
            would_apply_versions: planned_versions,
            inferred_from_legacy: before.inferred_from_legacy,
            after_version: Some(after.current_version),
            up_to_date: Some(after.pending_versions.is_empty()),
        })
    }

    /// Create one form definition.
    ///
    /// # Errors
    /// Returns an error when validation or persistence fails.
    pub fn form_create(&self, input: CreateFormRequest) -> Result<Form> {
        let mut store = self.open_migrated()?;
        let now = OffsetDateTime::now_utc();
        let form = Form {
            form_id: FormId::new(),
            name: input.name,
            description: input.description,
            form_type: input.form_type,
            fields: input.fields,
            custom_html: input.custom_html,
            settings: input.settings,
            styling: input.styling,
            status: input.status,
            submit_button_text: input.submit_button_text,
            success_message: input.success_message,
            error_message: input.error_message,
            submission_count: 0,
            last_submission_at: None,
            created_at: now,
            updated_at: now,
        };
        store.create_form(&form)?;
        Ok(form)
    }

    /// Replace the editable parts of an existing form.
    ///
    /// # Errors
    /// Returns an error when the form is missing, validation fails, or
    /// persistence fails.
    pub fn form_update(&self, form_id: FormId, input: CreateFormRequest) -> Result<Form> {
        let mut store = self.open_migrated()?;
        let existing = store
            .get_form(form_id)?
            .ok_or_else(|| anyhow!("form not found: {form_id}"))?;
        let form = Form {
            form_id,
            name: input.name,
            description: input.description,
            form_type: input.form_type,
            fields: input.fields,
            custom_html: input.custom_html,
            settings: input.settings,
            styling: input.styling,
            status: input.status,
            submit_button_text: input.submit_button_text,
            success_message: input.success_message,
            error_message: input.error_message,
            submission_count: existing.submission_count,
            last_submission_at: existing.last_submission_at,
            created_at: existing.created_at,
            updated_at: OffsetDateTime::now_utc(),
        };
        store.update_form(&form)?;
        Ok(form)
    }

    /// Fetch one form by id.
    ///
    /// # Errors
    /// Returns an error when the form does not exist or lookup fails.
    pub fn form_get(&self, form_id: FormId) -> Result<Form> {
        let store = self.open_migrated()?;
        store.get_form(form_id)?.ok_or_else(|| anyhow!("form not found: {form_id}"))
    }

    /// List forms, optionally filtered by status.
    ///
    /// # Errors
    /// Returns an error when listing fails.
    pub fn form_list(&self, status: Option<PublishStatus>) -> Result<Vec<Form>> {
        let store = self.open_migrated()?;
        store.list_forms(status)
    }

    /// Delete one form.
    ///
    /// # Errors
    /// Returns an error when the form does not exist or the delete fails.
    pub fn form_delete(&self, form_id: FormId) -> Result<()> {
        let mut store = self.open_migrated()?;
        if !store.delete_form(form_id)? {
            return Err(anyhow!("form not found: {form_id}"));
        }
        Ok(())
    }

    /// Record one visitor submission against a form.
    ///
    /// # Errors
    /// Returns an error when the form is missing or persistence fails.
    pub fn submission_record(&self, input: RecordSubmissionRequest) -> Result<FormSubmission> {
        let mut store = self.open_migrated()?;
        let submission = FormSubmission {
            submission_id: SubmissionId::new(),
            form_id: input.form_id,
            data: input.data,
            user_agent: input.user_agent,
            ip_address: input.ip_address,
            referrer: input.referrer,
            status: SubmissionStatus::New,
            created_at: OffsetDateTime::now_utc(),
        };
        store.record_submission(&submission)?;
        Ok(submission)
    }

    /// Fetch one submission by id.
    ///
    /// # Errors
    /// Returns an error when the submission does not exist or lookup fails.
    pub fn submission_get(&self, submission_id: SubmissionId) -> Result<FormSubmission> {
        let store = self.open_migrated()?;
        store
            .get_submission(submission_id)?
            .ok_or_else(|| anyhow!("submission not found: {submission_id}"))
    }

    /// List submissions for the moderation queue.
    ///
    /// # Errors
    /// Returns an error when listing fails.
    pub fn submission_list(
        &self,
        form_id: Option<FormId>,
        status: Option<SubmissionStatus>,
    ) -> Result<Vec<FormSubmission>> {
        let store = self.open_migrated()?;
        store.list_submissions(form_id, status)
    }

    /// Set a submission's moderation status.
    ///
    /// # Errors
    /// Returns an error when the submission is missing or the write fails.
    pub fn submission_set_status(
        &self,
        submission_id: SubmissionId,
        status: SubmissionStatus,
    ) -> Result<FormSubmission> {
        let mut store = self.open_migrated()?;
        store.set_submission_status(submission_id, status)?;
        store
            .get_submission(submission_id)?
            .ok_or_else(|| anyhow!("submission not found: {submission_id}"))
    }

    /// Delete one submission.
    ///
    /// # Errors
    /// Returns an error when the submission does not exist or the delete fails.
    pub fn submission_delete(&self, submission_id: SubmissionId) -> Result<()> {
        let mut store = self.open_migrated()?;
        if !store.delete_submission(submission_id)? {
            return Err(anyhow!("submission not found: {submission_id}"));
        }
        Ok(())
    }

    /// Create one modal definition.
    ///
    /// # Errors
    /// Returns an error when validation or persistence fails.
    pub fn modal_create(&self, input: CreateModalRequest) -> Result<Modal> {
        let mut store = self.open_migrated()?;
        let now = OffsetDateTime::now_utc();
        let modal = Modal {
            modal_id: ModalId::new(),
            name: input.name,
            title: input.title,
            body_html: input.body_html,
            trigger: input.trigger,
            display_rules: input.display_rules,
            form_id: input.form_id,
            status: input.status,
            views: 0,
            conversions: 0,
            created_at: now,
            updated_at: now,
        };
        store.create_modal(&modal)?;
        Ok(modal)
    }

    /// Replace the editable parts of an existing modal.
    ///
    /// # Errors
    /// Returns an error when the modal is missing, validation fails, or
    /// persistence fails.
    pub fn modal_update(&self, modal_id: ModalId, input: CreateModalRequest) -> Result<Modal> {
        let mut store = self.open_migrated()?;
        let existing = store
            .get_modal(modal_id)?
            .ok_or_else(|| anyhow!("modal not found: {modal_id}"))?;
        let modal = Modal {
            modal_id,
            name: input.name,
            title: input.title,
            body_html: input.body_html,
            trigger: input.trigger,
            display_rules: input.display_rules,
            form_id: input.form_id,
            status: input.status,
            views: existing.views,
            conversions: existing.conversions,
            created_at: existing.created_at,
            updated_at: OffsetDateTime::now_utc(),
        };
        store.update_modal(&modal)?;
        Ok(modal)
    }

    /// Fetch one modal by id.
    ///
    /// # Errors
    /// Returns an error when the modal does not exist or lookup fails.
    pub fn modal_get(&self, modal_id: ModalId) -> Result<Modal> {
        let store = self.open_migrated()?;
        store.get_modal(modal_id)?.ok_or_else(|| anyhow!("modal not found: {modal_id}"))
    }

    /// List modals, optionally filtered by status.
    ///
    /// # Errors
    /// Returns an error when listing fails.
    pub fn modal_list(&self, status: Option<PublishStatus>) -> Result<Vec<Modal>> {
        let store = self.open_migrated()?;
        store.list_modals(status)
    }

    /// Delete one modal.
    ///
    /// # Errors
    /// Returns an error when the modal does not exist or the delete fails.
    pub fn modal_delete(&self, modal_id: ModalId) -> Result<()> {
        let mut store = self.open_migrated()?;
        if !store.delete_modal(modal_id)? {
            return Err(anyhow!("modal not found: {modal_id}"));
        }
        Ok(())
    }

    /// Increment a modal engagement counter and return the updated modal.
    ///
    /// # Errors
    /// Returns an error when the modal is missing or the write fails.
    pub fn modal_track(&self, modal_id: ModalId, counter: ModalCounter) -> Result<Modal> {
        let mut store = self.open_migrated()?;
        store.bump_modal_counter(modal_id, counter)?;
        store.get_modal(modal_id)?.ok_or_else(|| anyhow!("modal not found: {modal_id}"))
    }

    /// Create one popup definition.
    ///
    /// # Errors
    /// Returns an error when validation or persistence fails.
    pub fn popup_create(&self, input: CreatePopupRequest) -> Result<Popup> {
        let mut store = self.open_migrated()?;
        let now = OffsetDateTime::now_utc();
        let popup = Popup {
            popup_id: PopupId::new(),
            name: input.name,
            title: input.title,
            body_html: input.body_html,
            popup_type: input.popup_type,
            position: input.position,
            trigger: input.trigger,
            display_rules: input.display_rules,
            form_id: input.form_id,
            auto_close_seconds: input.auto_close_seconds,
            start_date: input.start_date,
            end_date: input.end_date,
            status: input.status,
            views: 0,
            conversions: 0,
            clicks: 0,
            created_at: now,
            updated_at: now,
        };
        store.create_popup(&popup)?;
        Ok(popup)
    }

    /// Replace the editable parts of an existing popup.
    ///
    /// # Errors
    /// Returns an error when the popup is missing, validation fails, or
    /// persistence fails.
    pub fn popup_update(&self, popup_id: PopupId, input: CreatePopupRequest) -> Result<Popup> {
        let mut store = self.open_migrated()?;
        let existing = store
            .get_popup(popup_id)?
            .ok_or_else(|| anyhow!("popup not found: {popup_id}"))?;
        let popup = Popup {
            popup_id,
            name: input.name,
            title: input.title,
            body_html: input.body_html,
            popup_type: input.popup_type,
            position: input.position,
            trigger: input.trigger,
            display_rules: input.display_rules,
            form_id: input.form_id,
            auto_close_seconds: input.auto_close_seconds,
            start_date: input.start_date,
            end_date: input.end_date,
            status: input.status,
            views: existing.views,
            conversions: existing.conversions,
            clicks: existing.clicks,
            created_at: existing.created_at,
            updated_at: OffsetDateTime::now_utc(),
        };
        store.update_popup(&popup)?;
        Ok(popup)
    }

    /// Fetch one popup by id.
    ///
    /// # Errors
    /// Returns an error when the popup does not exist or lookup fails.
    pub fn popup_get(&self, popup_id: PopupId) -> Result<Popup> {
        let store = self.open_migrated()?;
        store.get_popup(popup_id)?.ok_or_else(|| anyhow!("popup not found: {popup_id}"))
    }

    /// List popups, optionally filtered by status.
    ///
    /// # Errors
    /// Returns an error when listing fails.
    pub fn popup_list(&self, status: Option<PublishStatus>) -> Result<Vec<Popup>> {
        let store = self.open_migrated()?;
        store.list_popups(status)
    }

    /// Popups active and inside their schedule window at `as_of` (defaults to now).
    ///
    /// # Errors
    /// Returns an error when listing fails.
    pub fn popup_active(&self, as_of: Option<OffsetDateTime>) -> Result<Vec<Popup>> {
        let store = self.open_migrated()?;
        store.active_popups(as_of.unwrap_or_else(OffsetDateTime::now_utc))
    }

    /// Delete one popup.
    ///
    /// # Errors
    /// Returns an error when the popup does not exist or the delete fails.
    pub fn popup_delete(&self, popup_id: PopupId) -> Result<()> {
        let mut store = self.open_migrated()?;
        if !store.delete_popup(popup_id)? {
            return Err(anyhow!("popup not found: {popup_id}"));
        }
        Ok(())
    }

    /// Increment a popup engagement counter and return the updated popup.
    ///
    /// # Errors
    /// Returns an error when the popup is missing or the write fails.
    pub fn popup_track(&self, popup_id: PopupId, counter: PopupCounter) -> Result<Popup> {
        let mut store = self.open_migrated()?;
        store.bump_popup_counter(popup_id, counter)?;
        store.get_popup(popup_id)?.ok_or_else(|| anyhow!("popup not found: {popup_id}"))
    }

    /// Insert or replace a page keyed by slug.
    ///
    /// # Errors
    /// Returns an error when validation or persistence fails.
    pub fn page_upsert(&self, input: UpsertPageRequest) -> Result<Page> {
        let mut store = self.open_migrated()?;
        let page = Page {
            slug: input.slug,
            title: input.title,
            content: input.content,
            template: input.template,
            updated_at: OffsetDateTime::now_utc(),
        };
        store.upsert_page(&page)?;
        Ok(page)
    }

    /// Fetch one page by slug.
    ///
    /// # Errors
    /// Returns an error when the page does not exist or lookup fails.
    pub fn page_get(&self, slug: &str) -> Result<Page> {
        let store = self.open_migrated()?;
        store.get_page(slug)?.ok_or_else(|| anyhow!("page not found: {slug}"))
    }

    /// List all pages.
    ///
    /// # Errors
    /// Returns an error when listing fails.
    pub fn page_list(&self) -> Result<Vec<Page>> {
        let store = self.open_migrated()?;
        store.list_pages()
    }

    /// Delete one page.
    ///
    /// # Errors
    /// Returns an error when the page does not exist or the delete fails.
    pub fn page_delete(&self, slug: &str) -> Result<()> {
        let mut store = self.open_migrated()?;
        if !store.delete_page(slug)? {
            return Err(anyhow!("page not found: {slug}"));
        }
        Ok(())
    }

    /// Apply a marker splice to a page. A missing marker is reported, not an
    /// error, and leaves the page untouched.
    ///
    /// # Errors
    /// Returns an error when the page is missing or the write fails.
    pub fn page_splice(&self, input: SplicePageRequest) -> Result<PageSpliceReport> {
        let mut store = self.open_migrated()?;
        store.splice_page_content(&input.slug, &input.op)
    }

    /// Markers present in a page's content.
    ///
    /// # Errors
    /// Returns an error when the page is missing or cannot be read.
    pub fn page_markers(&self, slug: &str) -> Result<Vec<String>> {
        let store = self.open_migrated()?;
        store.page_markers(slug)
    }

    /// Render a form preview document for a device frame.
    ///
    /// # Errors
    /// Returns an error when the form is missing or lookup fails.
    pub fn preview_form(
        &self,
        form_id: FormId,
        device: DeviceFrame,
        framework: CssFramework,
    ) -> Result<PreviewResult> {
        let form = self.form_get(form_id)?;
        let body = render_form_preview(&form);
        Ok(build_preview(&form.name, body, device, framework))
    }

    /// Render a modal preview document, resolving its attached form.
    ///
    /// # Errors
    /// Returns an error when the modal is missing or lookup fails.
    pub fn preview_modal(
        &self,
        modal_id: ModalId,
        device: DeviceFrame,
        framework: CssFramework,
    ) -> Result<PreviewResult> {
        let store = self.open_migrated()?;
        let modal = store
            .get_modal(modal_id)?
            .ok_or_else(|| anyhow!("modal not found: {modal_id}"))?;
        let form = match modal.form_id {
            Some(form_id) => store.get_form(form_id)?,
            None => None,
        };
        let body = render_modal_preview(&modal, form.as_ref());
        Ok(build_preview(&modal.name, body, device, framework))
    }

    /// Render a popup preview document, resolving its attached form.
    ///
    /// # Errors
    /// Returns an error when the popup is missing or lookup fails.
    pub fn preview_popup(
        &self,
        popup_id: PopupId,
        device: DeviceFrame,
        framework: CssFramework,
    ) -> Result<PreviewResult> {
        let store = self.open_migrated()?;
        let popup = store
            .get_popup(popup_id)?
            .ok_or_else(|| anyhow!("popup not found: {popup_id}"))?;
        let form = match popup.form_id {
            Some(form_id) => store.get_form(form_id)?,
            None => None,
        };
        let body = render_popup_preview(&popup, form.as_ref());
        Ok(build_preview(&popup.name, body, device, framework))
    }

    /// Render a stored page inside a device frame.
    ///
    /// # Errors
    /// Returns an error when the page is missing or lookup fails.
    pub fn preview_page(
        &self,
        slug: &str,
        device: DeviceFrame,
        framework: CssFramework,
    ) -> Result<PreviewResult> {
        let page = self.page_get(slug)?;
        Ok(build_preview(&page.title, page.content.clone(), device, framework))
    }

    /// Export all entities to NDJSON snapshot files plus a digest manifest.
    ///
    /// # Errors
    /// Returns an error when export fails.
    pub fn db_export(&self, out_dir: &Path) -> Result<ExportManifest> {
        let store = self.open_migrated()?;
        store.export_snapshot(out_dir)
    }

    /// Import a snapshot directory.
    ///
    /// # Errors
    /// Returns an error when manifest validation or writes fail.
    pub fn db_import(&self, in_dir: &Path, skip_existing: bool) -> Result<ImportSummary> {
        let mut store = self.open_store()?;
        store.import_snapshot(in_dir, skip_existing)
    }

    /// Create a `SQLite` backup file.
    ///
    /// # Errors
    /// Returns an error when the backup fails.
    pub fn db_backup(&self, out_file: &Path) -> Result<()> {
        let store = self.open_migrated()?;
        store.backup_database(out_file)
    }

    /// Restore from a `SQLite` backup file.
    ///
    /// # Errors
    /// Returns an error when the restore or follow-up migration fails.
    pub fn db_restore(&self, in_file: &Path) -> Result<()> {
        let mut store = self.open_store()?;
        store.restore_database(in_file)
    }

    /// Run integrity probes against the database.
    ///
    /// # Errors
    /// Returns an error when any probe query fails.
    pub fn db_verify(&self) -> Result<IntegrityReport> {
        let store = self.open_migrated()?;
        store.integrity_check()
    }
}

fn build_preview(
    title: &str,
    body_html: String,
    device: DeviceFrame,
    framework: CssFramework,
) -> PreviewResult {
    let mut document = PreviewDocument::new(title, body_html);
    document.device = device;
    document.framework = framework;
    PreviewResult { html: document.to_html(), device, framework }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;
    use serde_json::json;
    use sitecms_core::TriggerType;
    use ulid::Ulid;

    fn temp_api(label: &str) -> (SiteCmsApi, PathBuf) {
        let path =
            std::env::temp_dir().join(format!("sitecms-api-{label}-{}.sqlite3", Ulid::new()));
        (SiteCmsApi::new(path.clone()), path)
    }

    fn mk_form_request() -> CreateFormRequest {
        CreateFormRequest {
            name: "Contact".to_string(),
            description: None,
            form_type: FormType::Contact,
            fields: vec![FieldDescriptor {
                id: "name".to_string(),
                kind: "text".to_string(),
                label: "Name".to_string(),
                required: true,
                placeholder: None,
                description: None,
                options: Vec::new(),
            }],
            custom_html: None,
            settings: FormSettings::default(),
            styling: FormStyling::default(),
            status: PublishStatus::Active,
            submit_button_text: default_submit_button_text(),
            success_message: default_success_message(),
            error_message: default_error_message(),
        }
    }

    #[test]
    fn form_lifecycle_and_preview() -> Result<()> {
        let (api, path) = temp_api("form-lifecycle");

        let form = api.form_create(mk_form_request())?;
        let fetched = api.form_get(form.form_id)?;
        assert_eq!(fetched.name, "Contact");

        let preview = api.preview_form(form.form_id, DeviceFrame::Mobile, CssFramework::None)?;
        assert!(preview.html.contains("max-width:375px"));
        assert!(preview.html.contains("Name"));

        api.form_delete(form.form_id)?;
        let err = match api.form_get(form.form_id) {
            Ok(_) => panic!("deleted form should not resolve"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("form not found"));

        fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn submission_flow_updates_counters() -> Result<()> {
        let (api, path) = temp_api("submissions");
        let form = api.form_create(mk_form_request())?;

        let mut data = serde_json::Map::new();
        data.insert("name".to_string(), json!("Pat"));
        let submission = api.submission_record(RecordSubmissionRequest {
            form_id: form.form_id,
            data,
            user_agent: None,
            ip_address: None,
            referrer: None,
        })?;
        assert_eq!(submission.status, SubmissionStatus::New);

        let updated = api.form_get(form.form_id)?;
        assert_eq!(updated.submission_count, 1);
        assert!(updated.last_submission_at.is_some());

        let moderated =
            api.submission_set_status(submission.submission_id, SubmissionStatus::Read)?;
        assert_eq!(moderated.status, SubmissionStatus::Read);

        fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn popup_active_surface_respects_schedule() -> Result<()> {
        let (api, path) = temp_api("popup-active");

        let live = api.popup_create(CreatePopupRequest {
            name: "live".to_string(),
            title: "Live".to_string(),
            body_html: String::new(),
            popup_type: PopupType::Corner,
            position: PopupPosition::BottomRight,
            trigger: Trigger { trigger_type: TriggerType::Exit, value: 0 },
            display_rules: DisplayRules::default(),
            form_id: None,
            auto_close_seconds: 0,
            start_date: None,
            end_date: None,
            status: PublishStatus::Active,
        })?;

        api.popup_create(CreatePopupRequest {
            name: "future".to_string(),
            title: "Future".to_string(),
            body_html: String::new(),
            popup_type: PopupType::Banner,
            position: PopupPosition::TopBar,
            trigger: Trigger { trigger_type: TriggerType::Time, value: 5 },
            display_rules: DisplayRules::default(),
            form_id: None,
            auto_close_seconds: 10,
            start_date: Some(OffsetDateTime::now_utc() + time::Duration::days(30)),
            end_date: None,
            status: PublishStatus::Active,
        })?;

        let active = api.popup_active(None)?;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].popup_id, live.popup_id);

        let tracked = api.popup_track(live.popup_id, PopupCounter::Views)?;
        assert_eq!(tracked.views, 1);

        fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn page_splice_reports_missing_marker_without_writing() -> Result<()> {
        let (api, path) = temp_api("page-splice");
        api.page_upsert(UpsertPageRequest {
            slug: "home".to_string(),
            title: "Home".to_string(),
            content: "<!-- Hero Section --><h1>Hi</h1>".to_string(),
            template: None,
        })?;

        let report = api.page_splice(SplicePageRequest {
            slug: "home".to_string(),
            op: SpliceOp::InsertAfter {
                marker: "<!-- Missing -->".to_string(),
                fragment: "<p>x</p>".to_string(),
            },
        })?;
        assert!(!report.written);
        assert_eq!(api.page_get("home")?.content, "<!-- Hero Section --><h1>Hi</h1>");

        let report = api.page_splice(SplicePageRequest {
            slug: "home".to_string(),
            op: SpliceOp::InsertAfter {
                marker: "<!-- Hero Section -->".to_string(),
                fragment: "<p>spliced</p>".to_string(),
            },
        })?;
        assert!(report.written);
        assert!(api.page_get("home")?.content.contains("<p>spliced</p>"));

        fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn custom_form_requires_body() -> Result<()> {
        let (api, path) = temp_api("custom-form");
        let mut request = mk_form_request();
        request.form_type = FormType::Custom;
        request.fields = Vec::new();

        let err = match api.form_create(request) {
            Ok(_) => panic!("custom form without body should be rejected"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("validation failed"));

        fs::remove_file(path).ok();
        Ok(())
    }
}
