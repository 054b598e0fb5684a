use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, DatabaseName};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sitecms_core::splice::{SpliceOp, SpliceOutcome};
use sitecms_core::{
    DisplayRules, FieldDescriptor, Form, FormId, FormSettings, FormStyling, FormSubmission,
    FormType, Modal, ModalId, Page, Popup, PopupId, PopupPosition, PopupType, PublishStatus,
    SubmissionId, SubmissionStatus, Trigger, TriggerType,
};
use time::OffsetDateTime;
use ulid::Ulid;

const LATEST_SCHEMA_VERSION: i64 = 2;

const CREATE_SCHEMA_MIGRATIONS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL
);
";

const MIGRATION_001_SQL: &str = r"
CREATE TABLE IF NOT EXISTS forms (
  form_id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  description TEXT,
  form_type TEXT NOT NULL CHECK (form_type IN ('contact','newsletter','lead','custom')),
  fields_json TEXT NOT NULL,
  custom_html TEXT,
  settings_json TEXT NOT NULL,
  styling_json TEXT NOT NULL,
  status TEXT NOT NULL CHECK (status IN ('draft','active','inactive')),
  submit_button_text TEXT NOT NULL,
  success_message TEXT NOT NULL,
  error_message TEXT NOT NULL,
  submission_count INTEGER NOT NULL DEFAULT 0 CHECK (submission_count >= 0),
  last_submission_at TEXT,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS form_submissions (
  submission_id TEXT PRIMARY KEY,
  form_id TEXT NOT NULL,
  data_json TEXT NOT NULL,
  user_agent TEXT,
  ip_address TEXT,
  referrer TEXT,
  status TEXT NOT NULL CHECK (status IN ('new','read','archived','spam')),
  created_at TEXT NOT NULL,
  FOREIGN KEY (form_id) REFERENCES forms(form_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS modals (
  modal_id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  title TEXT NOT NULL,
  body_html TEXT NOT NULL,
  trigger_type TEXT NOT NULL CHECK (trigger_type IN ('time','scroll','exit','click','manual')),
  trigger_value INTEGER NOT NULL DEFAULT 0,
  display_rules_json TEXT NOT NULL,
  form_id TEXT,
  status TEXT NOT NULL CHECK (status IN ('draft','active','inactive')),
  views INTEGER NOT NULL DEFAULT 0,
  conversions INTEGER NOT NULL DEFAULT 0,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL,
  FOREIGN KEY (form_id) REFERENCES forms(form_id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS popups (
  popup_id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  title TEXT NOT NULL,
  body_html TEXT NOT NULL,
  popup_type TEXT NOT NULL CHECK (popup_type IN ('banner','slide_in','full_screen','corner','bar')),
  position TEXT NOT NULL CHECK (position IN ('top_left','top_right','bottom_left','bottom_right','top_bar','bottom_bar','center')),
  trigger_type TEXT NOT NULL CHECK (trigger_type IN ('time','scroll','exit','click','manual')),
  trigger_value INTEGER NOT NULL DEFAULT 0,
  display_rules_json TEXT NOT NULL,
  form_id TEXT,
  auto_close_seconds INTEGER NOT NULL DEFAULT 0,
  status TEXT NOT NULL CHECK (status IN ('draft','active','inactive')),
  views INTEGER NOT NULL DEFAULT 0,
  conversions INTEGER NOT NULL DEFAULT 0,
  clicks INTEGER NOT NULL DEFAULT 0,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL,
  FOREIGN KEY (form_id) REFERENCES forms(form_id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS pages (
  slug TEXT PRIMARY KEY,
  title TEXT NOT NULL,
  content TEXT NOT NULL,
  template TEXT,
  updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_forms_status ON forms(status);
CREATE INDEX IF NOT EXISTS idx_form_submissions_form_status ON form_submissions(form_id, status);
CREATE INDEX IF NOT EXISTS idx_form_submissions_created_at ON form_submissions(created_at);
CREATE INDEX IF NOT EXISTS idx_modals_status ON modals(status);
CREATE INDEX IF NOT EXISTS idx_popups_status ON popups(status);
";

const MIGRATION_002_SQL: &str = r"
ALTER TABLE popups ADD COLUMN start_date TEXT;
ALTER TABLE popups ADD COLUMN end_date TEXT;
CREATE INDEX IF NOT EXISTS idx_popups_schedule ON popups(status, start_date, end_date);
";

pub struct SqliteStore {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current_version: i64,
    pub target_version: i64,
    pub pending_versions: Vec<i64>,
    pub inferred_from_legacy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportFileDigest {
    pub path: String,
    pub sha256: String,
    pub records: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportManifest {
    pub schema_version: i64,
    pub exported_at: String,
    pub files: Vec<ExportFileDigest>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: BTreeMap<String, usize>,
    pub skipped_existing: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKeyViolation {
    pub table: String,
    pub rowid: i64,
    pub parent: String,
    pub fk_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntegrityReport {
    pub quick_check_ok: bool,
    pub quick_check_message: String,
    pub foreign_key_violations: Vec<ForeignKeyViolation>,
    pub schema_status: SchemaStatus,
}

/// Outcome of a page splice, including whether the row was written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageSpliceReport {
    pub slug: String,
    pub written: bool,
    pub outcome: SpliceOutcome,
}

impl SqliteStore {
    /// Open a SQLite-backed content store and configure required runtime pragmas.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or pragmas cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Ok(Self { conn })
    }

    /// Report current and target schema versions plus pending migrations.
    ///
    /// # Errors
    /// Returns an error when schema metadata cannot be read or initialized.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;
        let (current_version, inferred_from_legacy) = detect_effective_schema_version(&self.conn)?;
        let pending_versions = if current_version < LATEST_SCHEMA_VERSION {
            ((current_version + 1)..=LATEST_SCHEMA_VERSION).collect::<Vec<_>>()
        } else {
            Vec::new()
        };

        Ok(SchemaStatus {
            current_version,
            target_version: LATEST_SCHEMA_VERSION,
            pending_versions,
            inferred_from_legacy,
        })
    }

    /// Apply all forward migrations up to the latest supported schema version.
    ///
    /// # Errors
    /// Returns an error when migration bootstrapping or any migration step fails.
    pub fn migrate(&mut self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;

        let mut version = current_schema_version(&self.conn)?;

        if version == 0 {
            version = self.bootstrap_schema_version()?;
        }

        if version < 2 {
            self.apply_migration_2()?;
            version = current_schema_version(&self.conn)?;
        }

        if version != LATEST_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported schema version {version}; expected {LATEST_SCHEMA_VERSION}"
            ));
        }

        Ok(())
    }

    fn bootstrap_schema_version(&self) -> Result<i64> {
        if !table_exists(&self.conn, "forms")? {
            self.conn.execute_batch(MIGRATION_001_SQL).context("failed to apply migration v1")?;
            record_schema_version(&self.conn, 1)?;
            return Ok(1);
        }

        if table_has_column(&self.conn, "popups", "start_date")? {
            // Database already in v2 shape but missing migration records.
            record_schema_version(&self.conn, 1)?;
            record_schema_version(&self.conn, 2)?;
            return Ok(2);
        }

        // Legacy v1 tables exist; mark version 1 and allow the standard v2 upgrade.
        record_schema_version(&self.conn, 1)?;
        Ok(1)
    }

    fn apply_migration_2(&mut self) -> Result<()> {
        if table_has_column(&self.conn, "popups", "start_date")? {
            record_schema_version(&self.conn, 2)?;
            return Ok(());
        }

        let tx = self.conn.transaction().context("failed to start migration v2 transaction")?;
        tx.execute_batch(MIGRATION_002_SQL)
            .context("failed to add popup schedule columns")?;
        let now = now_rfc3339()?;
        tx.execute(
            "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
            params![2_i64, now],
        )
        .context("failed to record migration version 2")?;
        tx.commit().context("failed to commit migration v2")?;
        Ok(())
    }

    /// Persist a new form definition.
    ///
    /// # Errors
    /// Returns an error when validation fails or the insert fails.
    pub fn create_form(&mut self, form: &Form) -> Result<()> {
        form.validate().map_err(|err| anyhow!("form validation failed: {err}"))?;

        self.conn
            .execute(
                "INSERT INTO forms(
                    form_id, name, description, form_type, fields_json, custom_html,
                    settings_json, styling_json, status, submit_button_text,
                    success_message, error_message, submission_count, last_submission_at,
                    created_at, updated_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6,
                    ?7, ?8, ?9, ?10,
                    ?11, ?12, ?13, ?14,
                    ?15, ?16
                )",
                params![
                    form.form_id.to_string(),
                    form.name,
                    form.description,
                    form.form_type.as_str(),
                    to_json(&form.fields, "form fields")?,
                    form.custom_html,
                    to_json(&form.settings, "form settings")?,
                    to_json(&form.styling, "form styling")?,
                    form.status.as_str(),
                    form.submit_button_text,
                    form.success_message,
                    form.error_message,
                    count_to_db(form.submission_count)?,
                    optional_rfc3339(form.last_submission_at)?,
                    rfc3339(form.created_at)?,
                    rfc3339(form.updated_at)?,
                ],
            )
            .context("failed to insert form")?;
        Ok(())
    }

    /// Replace the editable parts of an existing form. Counters are owned by
    /// the submission path and are left alone.
    ///
    /// # Errors
    /// Returns an error when validation fails or the form does not exist.
    pub fn update_form(&mut self, form: &Form) -> Result<()> {
        form.validate().map_err(|err| anyhow!("form validation failed: {err}"))?;

        let changed = self
            .conn
            .execute(
                "UPDATE forms SET
                    name = ?2, description = ?3, form_type = ?4, fields_json = ?5,
                    custom_html = ?6, settings_json = ?7, styling_json = ?8, status = ?9,
                    submit_button_text = ?10, success_message = ?11, error_message = ?12,
                    updated_at = ?13
                 WHERE form_id = ?1",
                params![
                    form.form_id.to_string(),
                    form.name,
                    form.description,
                    form.form_type.as_str(),
                    to_json(&form.fields, "form fields")?,
                    form.custom_html,
                    to_json(&form.settings, "form settings")?,
                    to_json(&form.styling, "form styling")?,
                    form.status.as_str(),
                    form.submit_button_text,
                    form.success_message,
                    form.error_message,
                    rfc3339(form.updated_at)?,
                ],
            )
            .context("failed to update form")?;

        if changed == 0 {
            return Err(anyhow!("form not found: {}", form.form_id));
        }
        Ok(())
    }

    /// Load one form by id.
    ///
    /// # Errors
    /// Returns an error when the row cannot be read or decoded.
    pub fn get_form(&self, form_id: FormId) -> Result<Option<Form>> {
        let mut stmt = self.conn.prepare(&format!(
            "{FORM_SELECT_SQL} WHERE form_id = ?1"
        ))?;
        let mut rows = stmt.query(params![form_id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(form_from_row(row)?)),
            None => Ok(None),
        }
    }

    /// List forms, optionally filtered by status, newest first.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded.
    pub fn list_forms(&self, status: Option<PublishStatus>) -> Result<Vec<Form>> {
        let query = match status {
            Some(_) => {
                format!("{FORM_SELECT_SQL} WHERE status = ?1 ORDER BY created_at DESC, form_id ASC")
            }
            None => format!("{FORM_SELECT_SQL} ORDER BY created_at DESC, form_id ASC"),
        };
        let mut stmt = self.conn.prepare(&query)?;
        let mut rows = match status {
            Some(status) => stmt.query(params![status.as_str()])?,
            None => stmt.query([])?,
        };

        let mut forms = Vec::new();
        while let Some(row) = rows.next()? {
            forms.push(form_from_row(row)?);
        }
        Ok(forms)
    }

    /// Delete a form. Submissions cascade; modals and popups keep their rows
    /// with `form_id` set to null.
    ///
    /// # Errors
    /// Returns an error when the delete fails.
    pub fn delete_form(&mut self, form_id: FormId) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM forms WHERE form_id = ?1", params![form_id.to_string()])
            .context("failed to delete form")?;
        Ok(changed > 0)
    }

    /// Persist one submission and bump the parent form's counters in the same
    /// transaction.
    ///
    /// # Errors
    /// Returns an error when the parent form is missing or any write fails.
    pub fn record_submission(&mut self, submission: &FormSubmission) -> Result<()> {
        let tx = self.conn.transaction().context("failed to start transaction")?;

        let form_exists = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM forms WHERE form_id = ?1)",
                params![submission.form_id.to_string()],
                |row| row.get::<_, i64>(0),
            )
            .context("failed to check parent form")?;
        if form_exists != 1 {
            return Err(anyhow!("form not found: {}", submission.form_id));
        }

        tx.execute(
            "INSERT INTO form_submissions(
                submission_id, form_id, data_json, user_agent, ip_address, referrer,
                status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                submission.submission_id.to_string(),
                submission.form_id.to_string(),
                serde_json::to_string(&submission.data)
                    .context("failed to serialize submission data")?,
                submission.user_agent,
                submission.ip_address,
                submission.referrer,
                submission.status.as_str(),
                rfc3339(submission.created_at)?,
            ],
        )
        .context("failed to insert submission")?;

        tx.execute(
            "UPDATE forms SET submission_count = submission_count + 1, last_submission_at = ?2
             WHERE form_id = ?1",
            params![submission.form_id.to_string(), rfc3339(submission.created_at)?],
        )
        .context("failed to bump form submission counter")?;

        tx.commit().context("failed to commit submission transaction")?;
        Ok(())
    }

    /// Load one submission by id.
    ///
    /// # Errors
    /// Returns an error when the row cannot be read or decoded.
    pub fn get_submission(&self, submission_id: SubmissionId) -> Result<Option<FormSubmission>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SUBMISSION_SELECT_SQL} WHERE submission_id = ?1"))?;
        let mut rows = stmt.query(params![submission_id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(submission_from_row(row)?)),
            None => Ok(None),
        }
    }

    /// List submissions, optionally scoped to a form and status, newest first.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded.
    pub fn list_submissions(
        &self,
        form_id: Option<FormId>,
        status: Option<SubmissionStatus>,
    ) -> Result<Vec<FormSubmission>> {
        let mut clauses = Vec::new();
        let mut args: Vec<String> = Vec::new();
        if let Some(form_id) = form_id {
            args.push(form_id.to_string());
            clauses.push(format!("form_id = ?{}", args.len()));
        }
        if let Some(status) = status {
            args.push(status.as_str().to_string());
            clauses.push(format!("status = ?{}", args.len()));
        }

        let mut query = SUBMISSION_SELECT_SQL.to_string();
        if !clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&clauses.join(" AND "));
        }
        query.push_str(" ORDER BY created_at DESC, submission_id ASC");

        let mut stmt = self.conn.prepare(&query)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(args.iter()))?;

        let mut submissions = Vec::new();
        while let Some(row) = rows.next()? {
            submissions.push(submission_from_row(row)?);
        }
        Ok(submissions)
    }

    /// Set a submission's moderation status. Statuses carry no transition
    /// rules; callers set them directly.
    ///
    /// # Errors
    /// Returns an error when the submission does not exist or the write fails.
    pub fn set_submission_status(
        &mut self,
        submission_id: SubmissionId,
        status: SubmissionStatus,
    ) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE form_submissions SET status = ?2 WHERE submission_id = ?1",
                params![submission_id.to_string(), status.as_str()],
            )
            .context("failed to update submission status")?;
        if changed == 0 {
            return Err(anyhow!("submission not found: {submission_id}"));
        }
        Ok(())
    }

    /// Delete one submission.
    ///
    /// # Errors
    /// Returns an error when the delete fails.
    pub fn delete_submission(&mut self, submission_id: SubmissionId) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "DELETE FROM form_submissions WHERE submission_id = ?1",
                params![submission_id.to_string()],
            )
            .context("failed to delete submission")?;
        Ok(changed > 0)
    }

    /// Persist a new modal definition.
    ///
    /// # Errors
    /// Returns an error when validation fails or the insert fails.
    pub fn create_modal(&mut self, modal: &Modal) -> Result<()> {
        modal.validate().map_err(|err| anyhow!("modal validation failed: {err}"))?;

        self.conn
            .execute(
                "INSERT INTO modals(
                    modal_id, name, title, body_html, trigger_type, trigger_value,
                    display_rules_json, form_id, status, views, conversions,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    modal.modal_id.to_string(),
                    modal.name,
                    modal.title,
                    modal.body_html,
                    modal.trigger.trigger_type.as_str(),
                    i64::from(modal.trigger.value),
                    to_json(&modal.display_rules, "modal display rules")?,
                    modal.form_id.map(|id| id.to_string()),
                    modal.status.as_str(),
                    count_to_db(modal.views)?,
                    count_to_db(modal.conversions)?,
                    rfc3339(modal.created_at)?,
                    rfc3339(modal.updated_at)?,
                ],
            )
            .context("failed to insert modal")?;
        Ok(())
    }

    /// Replace the editable parts of an existing modal.
    ///
    /// # Errors
    /// Returns an error when validation fails or the modal does not exist.
    pub fn update_modal(&mut self, modal: &Modal) -> Result<()> {
        modal.validate().map_err(|err| anyhow!("modal validation failed: {err}"))?;

        let changed = self
            .conn
            .execute(
                "UPDATE modals SET
                    name = ?2, title = ?3, body_html = ?4, trigger_type = ?5,
                    trigger_value = ?6, display_rules_json = ?7, form_id = ?8,
                    status = ?9, updated_at = ?10
                 WHERE modal_id = ?1",
                params![
                    modal.modal_id.to_string(),
                    modal.name,
                    modal.title,
                    modal.body_html,
                    modal.trigger.trigger_type.as_str(),
                    i64::from(modal.trigger.value),
                    to_json(&modal.display_rules, "modal display rules")?,
                    modal.form_id.map(|id| id.to_string()),
                    modal.status.as_str(),
                    rfc3339(modal.updated_at)?,
                ],
            )
            .context("failed to update modal")?;
        if changed == 0 {
            return Err(anyhow!("modal not found: {}", modal.modal_id));
        }
        Ok(())
    }

    /// Load one modal by id.
    ///
    /// # Errors
    /// Returns an error when the row cannot be read or decoded.
    pub fn get_modal(&self, modal_id: ModalId) -> Result<Option<Modal>> {
        let mut stmt =
            self.conn.prepare(&format!("{MODAL_SELECT_SQL} WHERE modal_id = ?1"))?;
        let mut rows = stmt.query(params![modal_id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(modal_from_row(row)?)),
            None => Ok(None),
        }
    }

    /// List modals, optionally filtered by status, newest first.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded.
    pub fn list_modals(&self, status: Option<PublishStatus>) -> Result<Vec<Modal>> {
        let query = match status {
            Some(_) => format!(
                "{MODAL_SELECT_SQL} WHERE status = ?1 ORDER BY created_at DESC, modal_id ASC"
            ),
            None => format!("{MODAL_SELECT_SQL} ORDER BY created_at DESC, modal_id ASC"),
        };
        let mut stmt = self.conn.prepare(&query)?;
        let mut rows = match status {
            Some(status) => stmt.query(params![status.as_str()])?,
            None => stmt.query([])?,
        };

        let mut modals = Vec::new();
        while let Some(row) = rows.next()? {
            modals.push(modal_from_row(row)?);
        }
        Ok(modals)
    }

    /// Delete one modal.
    ///
    /// # Errors
    /// Returns an error when the delete fails.
    pub fn delete_modal(&mut self, modal_id: ModalId) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM modals WHERE modal_id = ?1", params![modal_id.to_string()])
            .context("failed to delete modal")?;
        Ok(changed > 0)
    }

    /// Increment a modal counter (`views` or `conversions`).
    ///
    /// # Errors
    /// Returns an error when the modal does not exist or the write fails.
    pub fn bump_modal_counter(&mut self, modal_id: ModalId, counter: ModalCounter) -> Result<()> {
        let query = match counter {
            ModalCounter::Views => {
                "UPDATE modals SET views = views + 1 WHERE modal_id = ?1"
            }
            ModalCounter::Conversions => {
                "UPDATE modals SET conversions = conversions + 1 WHERE modal_id = ?1"
            }
        };
        let changed = self
            .conn
            .execute(query, params![modal_id.to_string()])
            .context("failed to bump modal counter")?;
        if changed == 0 {
            return Err(anyhow!("modal not found: {modal_id}"));
        }
        Ok(())
    }

    /// Persist a new popup definition.
    ///
    /// # Errors
    /// Returns an error when validation fails or the insert fails.
    pub fn create_popup(&mut self, popup: &Popup) -> Result<()> {
        popup.validate().map_err(|err| anyhow!("popup validation failed: {err}"))?;

        self.conn
            .execute(
                "INSERT INTO popups(
                    popup_id, name, title, body_html, popup_type, position,
                    trigger_type, trigger_value, display_rules_json, form_id,
                    auto_close_seconds, start_date, end_date, status,
                    views, conversions, clicks, created_at, updated_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6,
                    ?7, ?8, ?9, ?10,
                    ?11, ?12, ?13, ?14,
                    ?15, ?16, ?17, ?18, ?19
                )",
                params![
                    popup.popup_id.to_string(),
                    popup.name,
                    popup.title,
                    popup.body_html,
                    popup.popup_type.as_str(),
                    popup.position.as_str(),
                    popup.trigger.trigger_type.as_str(),
                    i64::from(popup.trigger.value),
                    to_json(&popup.display_rules, "popup display rules")?,
                    popup.form_id.map(|id| id.to_string()),
                    i64::from(popup.auto_close_seconds),
                    optional_rfc3339(popup.start_date)?,
                    optional_rfc3339(popup.end_date)?,
                    popup.status.as_str(),
                    count_to_db(popup.views)?,
                    count_to_db(popup.conversions)?,
                    count_to_db(popup.clicks)?,
                    rfc3339(popup.created_at)?,
                    rfc3339(popup.updated_at)?,
                ],
            )
            .context("failed to insert popup")?;
        Ok(())
    }

    /// Replace the editable parts of an existing popup.
    ///
    /// # Errors
    /// Returns an error when validation fails or the popup does not exist.
    pub fn update_popup(&mut self, popup: &Popup) -> Result<()> {
        popup.validate().map_err(|err| anyhow!("popup validation failed: {err}"))?;

        let changed = self
            .conn
            .execute(
                "UPDATE popups SET
                    name = ?2, title = ?3, body_html = ?4, popup_type = ?5, position = ?6,
                    trigger_type = ?7, trigger_value = ?8, display_rules_json = ?9,
                    form_id = ?10, auto_close_seconds = ?11, start_date = ?12,
                    end_date = ?13, status = ?14, updated_at = ?15
                 WHERE popup_id = ?1",
                params![
                    popup.popup_id.to_string(),
                    popup.name,
                    popup.title,
                    popup.body_html,
                    popup.popup_type.as_str(),
                    popup.position.as_str(),
                    popup.trigger.trigger_type.as_str(),
                    i64::from(popup.trigger.value),
                    to_json(&popup.display_rules, "popup display rules")?,
                    popup.form_id.map(|id| id.to_string()),
                    i64::from(popup.auto_close_seconds),
                    optional_rfc3339(popup.start_date)?,
                    optional_rfc3339(popup.end_date)?,
                    popup.status.as_str(),
                    rfc3339(popup.updated_at)?,
                ],
            )
            .context("failed to update popup")?;
        if changed == 0 {
            return Err(anyhow!("popup not found: {}", popup.popup_id));
        }
        Ok(())
    }

    /// Load one popup by id.
    ///
    /// # Errors
    /// Returns an error when the row cannot be read or decoded.
    pub fn get_popup(&self, popup_id: PopupId) -> Result<Option<Popup>> {
        let mut stmt =
            self.conn.prepare(&format!("{POPUP_SELECT_SQL} WHERE popup_id = ?1"))?;
        let mut rows = stmt.query(params![popup_id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(popup_from_row(row)?)),
            None => Ok(None),
        }
    }

    /// List popups, optionally filtered by status, newest first.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded.
    pub fn list_popups(&self, status: Option<PublishStatus>) -> Result<Vec<Popup>> {
        let query = match status {
            Some(_) => format!(
                "{POPUP_SELECT_SQL} WHERE status = ?1 ORDER BY created_at DESC, popup_id ASC"
            ),
            None => format!("{POPUP_SELECT_SQL} ORDER BY created_at DESC, popup_id ASC"),
        };
        let mut stmt = self.conn.prepare(&query)?;
        let mut rows = match status {
            Some(status) => stmt.query(params![status.as_str()])?,
            None => stmt.query([])?,
        };

        let mut popups = Vec::new();
        while let Some(row) = rows.next()? {
            popups.push(popup_from_row(row)?);
        }
        Ok(popups)
    }

    /// Popups that are active and inside their schedule window at `now`,
    /// backed by the schedule index.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded.
    pub fn active_popups(&self, now: OffsetDateTime) -> Result<Vec<Popup>> {
        let now_text = rfc3339(now)?;
        let mut stmt = self.conn.prepare(&format!(
            "{POPUP_SELECT_SQL}
             WHERE status = 'active'
               AND (start_date IS NULL OR start_date <= ?1)
               AND (end_date IS NULL OR end_date >= ?1)
             ORDER BY created_at DESC, popup_id ASC"
        ))?;
        let mut rows = stmt.query(params![now_text])?;

        let mut popups = Vec::new();
        while let Some(row) = rows.next()? {
            popups.push(popup_from_row(row)?);
        }
        Ok(popups)
    }

    /// Delete one popup.
    ///
    /// # Errors
    /// Returns an error when the delete fails.
    pub fn delete_popup(&mut self, popup_id: PopupId) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM popups WHERE popup_id = ?1", params![popup_id.to_string()])
            .context("failed to delete popup")?;
        Ok(changed > 0)
    }

    /// Increment a popup counter (`views`, `clicks`, or `conversions`).
    ///
    /// # Errors
    /// Returns an error when the popup does not exist or the write fails.
    pub fn bump_popup_counter(&mut self, popup_id: PopupId, counter: PopupCounter) -> Result<()> {
        let query = match counter {
            PopupCounter::Views => "UPDATE popups SET views = views + 1 WHERE popup_id = ?1",
            PopupCounter::Clicks => "UPDATE popups SET clicks = clicks + 1 WHERE popup_id = ?1",
            PopupCounter::Conversions => {
                "UPDATE popups SET conversions = conversions + 1 WHERE popup_id = ?1"
            }
        };
        let changed = self
            .conn
            .execute(query, params![popup_id.to_string()])
            .context("failed to bump popup counter")?;
        if changed == 0 {
            return Err(anyhow!("popup not found: {popup_id}"));
        }
        Ok(())
    }

    /// Insert or replace a page keyed by slug. Page writes are last-write-wins.
    ///
    /// # Errors
    /// Returns an error when validation fails or the write fails.
    pub fn upsert_page(&mut self, page: &Page) -> Result<()> {
        page.validate().map_err(|err| anyhow!("page validation failed: {err}"))?;

        self.conn
            .execute(
                "INSERT INTO pages(slug, title, content, template, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(slug) DO UPDATE SET
                    title = excluded.title,
                    content = excluded.content,
                    template = excluded.template,
                    updated_at = excluded.updated_at",
                params![
                    page.slug,
                    page.title,
                    page.content,
                    page.template,
                    rfc3339(page.updated_at)?,
                ],
            )
            .context("failed to upsert page")?;
        Ok(())
    }

    /// Load one page by slug.
    ///
    /// # Errors
    /// Returns an error when the row cannot be read or decoded.
    pub fn get_page(&self, slug: &str) -> Result<Option<Page>> {
        let mut stmt = self.conn.prepare(
            "SELECT slug, title, content, template, updated_at FROM pages WHERE slug = ?1",
        )?;
        let mut rows = stmt.query(params![slug])?;
        match rows.next()? {
            Some(row) => Ok(Some(page_from_row(row)?)),
            None => Ok(None),
        }
    }

    /// List all pages ordered by slug.
    ///
    /// # Errors
    /// Returns an error when rows cannot be read or decoded.
    pub fn list_pages(&self) -> Result<Vec<Page>> {
        let mut stmt = self.conn.prepare(
            "SELECT slug, title, content, template, updated_at FROM pages ORDER BY slug ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut pages = Vec::new();
        while let Some(row) = rows.next()? {
            pages.push(page_from_row(row)?);
        }
        Ok(pages)
    }

    /// Delete one page.
    ///
    /// # Errors
    /// Returns an error when the delete fails.
    pub fn delete_page(&mut self, slug: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM pages WHERE slug = ?1", params![slug])
            .context("failed to delete page")?;
        Ok(changed > 0)
    }

    /// Apply a marker splice to a page's content. When the marker is missing
    /// the row is not written and the report says so; the caller decides
    /// whether that is an error.
    ///
    /// # Errors
    /// Returns an error when the page is missing or the write fails.
    pub fn splice_page_content(&mut self, slug: &str, op: &SpliceOp) -> Result<PageSpliceReport> {
        let page = self
            .get_page(slug)?
            .ok_or_else(|| anyhow!("page not found: {slug}"))?;

        let outcome = op.apply(&page.content);
        let SpliceOutcome::Spliced { content, .. } = &outcome else {
            return Ok(PageSpliceReport { slug: slug.to_string(), written: false, outcome });
        };

        self.conn
            .execute(
                "UPDATE pages SET content = ?2, updated_at = ?3 WHERE slug = ?1",
                params![slug, content, now_rfc3339()?],
            )
            .context("failed to write spliced page content")?;

        Ok(PageSpliceReport { slug: slug.to_string(), written: true, outcome })
    }

    /// Markers present in a page's content, in order of first occurrence.
    ///
    /// # Errors
    /// Returns an error when the page is missing or cannot be read.
    pub fn page_markers(&self, slug: &str) -> Result<Vec<String>> {
        let page = self
            .get_page(slug)?
            .ok_or_else(|| anyhow!("page not found: {slug}"))?;
        Ok(sitecms_core::splice::list_markers(&page.content))
    }

    /// Export all entities as deterministic NDJSON plus a digest manifest.
    ///
    /// # Errors
    /// Returns an error when export files cannot be created, written, or serialized.
    pub fn export_snapshot(&self, out_dir: &Path) -> Result<ExportManifest> {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("failed to create export directory {}", out_dir.display()))?;

        let mut files = Vec::new();
        for (name, digest) in [
            ("forms.ndjson", write_ndjson_file(&out_dir.join("forms.ndjson"), &self.list_forms(None)?)?),
            (
                "form_submissions.ndjson",
                write_ndjson_file(
                    &out_dir.join("form_submissions.ndjson"),
                    &self.list_submissions(None, None)?,
                )?,
            ),
            ("modals.ndjson", write_ndjson_file(&out_dir.join("modals.ndjson"), &self.list_modals(None)?)?),
            ("popups.ndjson", write_ndjson_file(&out_dir.join("popups.ndjson"), &self.list_popups(None)?)?),
            ("pages.ndjson", write_ndjson_file(&out_dir.join("pages.ndjson"), &self.list_pages()?)?),
        ] {
            files.push(ExportFileDigest {
                path: name.to_string(),
                sha256: digest.0,
                records: digest.1,
            });
        }

        let manifest = ExportManifest {
            schema_version: LATEST_SCHEMA_VERSION,
            exported_at: now_rfc3339()?,
            files,
        };

        let manifest_path = out_dir.join("manifest.json");
        let manifest_json =
            serde_json::to_vec_pretty(&manifest).context("failed to serialize export manifest")?;
        fs::write(&manifest_path, manifest_json).with_context(|| {
            format!("failed to write export manifest {}", manifest_path.display())
        })?;

        Ok(manifest)
    }

    /// Import an exported snapshot directory into this database. Forms import
    /// before dependent rows so foreign keys resolve.
    ///
    /// # Errors
    /// Returns an error when migration, manifest validation, parsing,
    /// duplicate handling, or writes fail.
    pub fn import_snapshot(&mut self, in_dir: &Path, skip_existing: bool) -> Result<ImportSummary> {
        self.migrate()?;
        let manifest = read_export_manifest(&in_dir.join("manifest.json"))?;
        validate_import_manifest(in_dir, &manifest)?;

        let mut summary = ImportSummary::default();

        for form in read_ndjson_file::<Form>(&in_dir.join("forms.ndjson"))? {
            if self.row_exists("forms", "form_id", &form.form_id.to_string())? {
                if skip_existing {
                    *summary.skipped_existing.entry("forms".to_string()).or_default() += 1;
                    continue;
                }
                return Err(anyhow!("form already exists: {}", form.form_id));
            }
            self.create_form(&form)?;
            self.conn
                .execute(
                    "UPDATE forms SET submission_count = ?2, last_submission_at = ?3
                     WHERE form_id = ?1",
                    params![
                        form.form_id.to_string(),
                        count_to_db(form.submission_count)?,
                        optional_rfc3339(form.last_submission_at)?,
                    ],
                )
                .context("failed to restore form counters")?;
            *summary.imported.entry("forms".to_string()).or_default() += 1;
        }

        for submission in
            read_ndjson_file::<FormSubmission>(&in_dir.join("form_submissions.ndjson"))?
        {
            if self.row_exists(
                "form_submissions",
                "submission_id",
                &submission.submission_id.to_string(),
            )? {
                if skip_existing {
                    *summary
                        .skipped_existing
                        .entry("form_submissions".to_string())
                        .or_default() += 1;
                    continue;
                }
                return Err(anyhow!(
                    "submission already exists: {}",
                    submission.submission_id
                ));
            }
            // Direct insert: counters were restored with the parent form.
            self.conn
                .execute(
                    "INSERT INTO form_submissions(
                        submission_id, form_id, data_json, user_agent, ip_address, referrer,
                        status, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        submission.submission_id.to_string(),
                        submission.form_id.to_string(),
                        serde_json::to_string(&submission.data)
                            .context("failed to serialize submission data")?,
                        submission.user_agent,
                        submission.ip_address,
                        submission.referrer,
                        submission.status.as_str(),
                        rfc3339(submission.created_at)?,
                    ],
                )
                .context("failed to import submission")?;
            *summary.imported.entry("form_submissions".to_string()).or_default() += 1;
        }

        for modal in read_ndjson_file::<Modal>(&in_dir.join("modals.ndjson"))? {
            if self.row_exists("modals", "modal_id", &modal.modal_id.to_string())? {
                if skip_existing {
                    *summary.skipped_existing.entry("modals".to_string()).or_default() += 1;
                    continue;
                }
                return Err(anyhow!("modal already exists: {}", modal.modal_id));
            }
            self.create_modal(&modal)?;
            *summary.imported.entry("modals".to_string()).or_default() += 1;
        }

        for popup in read_ndjson_file::<Popup>(&in_dir.join("popups.ndjson"))? {
            if self.row_exists("popups", "popup_id", &popup.popup_id.to_string())? {
                if skip_existing {
                    *summary.skipped_existing.entry("popups".to_string()).or_default() += 1;
                    continue;
                }
                return Err(anyhow!("popup already exists: {}", popup.popup_id));
            }
            self.create_popup(&popup)?;
            *summary.imported.entry("popups".to_string()).or_default() += 1;
        }

        for page in read_ndjson_file::<Page>(&in_dir.join("pages.ndjson"))? {
            if self.row_exists("pages", "slug", &page.slug)? {
                if skip_existing {
                    *summary.skipped_existing.entry("pages".to_string()).or_default() += 1;
                    continue;
                }
                return Err(anyhow!("page already exists: {}", page.slug));
            }
            self.upsert_page(&page)?;
            *summary.imported.entry("pages".to_string()).or_default() += 1;
        }

        Ok(summary)
    }

    /// Create a `SQLite` backup file of the current main database.
    ///
    /// # Errors
    /// Returns an error when backup directories cannot be created or backup fails.
    pub fn backup_database(&self, out_file: &Path) -> Result<()> {
        if let Some(parent) = out_file.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create parent directory for backup file {}", out_file.display())
            })?;
        }

        self.conn
            .backup(DatabaseName::Main, out_file, None)
            .with_context(|| format!("failed to create sqlite backup at {}", out_file.display()))
    }

    /// Restore this database from a `SQLite` backup file, then migrate to latest.
    ///
    /// # Errors
    /// Returns an error when the backup file is missing, restore fails, or migrations fail.
    pub fn restore_database(&mut self, in_file: &Path) -> Result<()> {
        if !in_file.exists() {
            return Err(anyhow!("backup file does not exist: {}", in_file.display()));
        }

        self.conn
            .restore(DatabaseName::Main, in_file, None::<fn(rusqlite::backup::Progress)>)
            .with_context(|| {
                format!("failed to restore sqlite backup from {}", in_file.display())
            })?;

        self.migrate()?;
        Ok(())
    }

    /// Run quick-check, foreign-key-check, and schema status health probes.
    ///
    /// # Errors
    /// Returns an error when any integrity probe query fails.
    pub fn integrity_check(&self) -> Result<IntegrityReport> {
        let quick_check_message: String = self
            .conn
            .query_row("PRAGMA quick_check", [], |row| row.get::<_, String>(0))
            .context("failed to run PRAGMA quick_check")?;

        let mut stmt = self
            .conn
            .prepare("PRAGMA foreign_key_check")
            .context("failed to prepare PRAGMA foreign_key_check")?;
        let rows = stmt.query_map([], |row| {
            Ok(ForeignKeyViolation {
                table: row.get(0)?,
                rowid: row.get(1)?,
                parent: row.get(2)?,
                fk_index: row.get(3)?,
            })
        })?;

        let mut foreign_key_violations = Vec::new();
        for row in rows {
            foreign_key_violations.push(row?);
        }

        let schema_status = self.schema_status()?;
        Ok(IntegrityReport {
            quick_check_ok: quick_check_message == "ok",
            quick_check_message,
            foreign_key_violations,
            schema_status,
        })
    }

    fn row_exists(&self, table: &str, column: &str, value: &str) -> Result<bool> {
        let query = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE {column} = ?1)");
        let exists = self
            .conn
            .query_row(&query, params![value], |row| row.get::<_, i64>(0))
            .with_context(|| format!("failed to check {table}.{column}"))?;
        Ok(exists == 1)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ModalCounter {
    Views,
    Conversions,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PopupCounter {
    Views,
    Clicks,
    Conversions,
}

const FORM_SELECT_SQL: &str = "SELECT
    form_id, name, description, form_type, fields_json, custom_html,
    settings_json, styling_json, status, submit_button_text,
    success_message, error_message, submission_count, last_submission_at,
    created_at, updated_at
 FROM forms";

const SUBMISSION_SELECT_SQL: &str = "SELECT
    submission_id, form_id, data_json, user_agent, ip_address, referrer,
    status, created_at
 FROM form_submissions";

const MODAL_SELECT_SQL: &str = "SELECT
    modal_id, name, title, body_html, trigger_type, trigger_value,
    display_rules_json, form_id, status, views, conversions,
    created_at, updated_at
 FROM modals";

const POPUP_SELECT_SQL: &str = "SELECT
    popup_id, name, title, body_html, popup_type, position,
    trigger_type, trigger_value, display_rules_json, form_id,
    auto_close_seconds, start_date, end_date, status,
    views, conversions, clicks, created_at, updated_at
 FROM popups";

fn form_from_row(row: &rusqlite::Row<'_>) -> Result<Form> {
    let form_id_raw: String = row.get(0)?;
    let form_type_raw: String = row.get(3)?;
    let fields_json: String = row.get(4)?;
    let settings_json: String = row.get(6)?;
    let styling_json: String = row.get(7)?;
    let status_raw: String = row.get(8)?;
    let last_submission_at: Option<String> = row.get(13)?;

    Ok(Form {
        form_id: FormId(parse_ulid(&form_id_raw)?),
        name: row.get(1)?,
        description: row.get(2)?,
        form_type: FormType::parse(&form_type_raw)
            .ok_or_else(|| anyhow!("unknown form_type: {form_type_raw}"))?,
        fields: from_json::<Vec<FieldDescriptor>>(&fields_json, "form fields")?,
        custom_html: row.get(5)?,
        settings: from_json::<FormSettings>(&settings_json, "form settings")?,
        styling: from_json::<FormStyling>(&styling_json, "form styling")?,
        status: PublishStatus::parse(&status_raw)
            .ok_or_else(|| anyhow!("unknown status: {status_raw}"))?,
        submit_button_text: row.get(9)?,
        success_message: row.get(10)?,
        error_message: row.get(11)?,
        submission_count: count_from_db(row.get(12)?)?,
        last_submission_at: last_submission_at.as_deref().map(parse_rfc3339).transpose()?,
        created_at: parse_rfc3339(&row.get::<_, String>(14)?)?,
        updated_at: parse_rfc3339(&row.get::<_, String>(15)?)?,
    })
}

fn submission_from_row(row: &rusqlite::Row<'_>) -> Result<FormSubmission> {
    let submission_id_raw: String = row.get(0)?;
    let form_id_raw: String = row.get(1)?;
    let data_json: String = row.get(2)?;
    let status_raw: String = row.get(6)?;

    Ok(FormSubmission {
        submission_id: SubmissionId(parse_ulid(&submission_id_raw)?),
        form_id: FormId(parse_ulid(&form_id_raw)?),
        data: from_json(&data_json, "submission data")?,
        user_agent: row.get(3)?,
        ip_address: row.get(4)?,
        referrer: row.get(5)?,
        status: SubmissionStatus::parse(&status_raw)
            .ok_or_else(|| anyhow!("unknown submission status: {status_raw}"))?,
        created_at: parse_rfc3339(&row.get::<_, String>(7)?)?,
    })
}

fn modal_from_row(row: &rusqlite::Row<'_>) -> Result<Modal> {
    let modal_id_raw: String = row.get(0)?;
    let trigger_type_raw: String = row.get(4)?;
    let display_rules_json: String = row.get(6)?;
    let form_id_raw: Option<String> = row.get(7)?;
    let status_raw: String = row.get(8)?;

    Ok(Modal {
        modal_id: ModalId(parse_ulid(&modal_id_raw)?),
        name: row.get(1)?,
        title: row.get(2)?,
        body_html: row.get(3)?,
        trigger: Trigger {
            trigger_type: TriggerType::parse(&trigger_type_raw)
                .ok_or_else(|| anyhow!("unknown trigger_type: {trigger_type_raw}"))?,
            value: trigger_value_from_db(row.get(5)?)?,
        },
        display_rules: from_json::<DisplayRules>(&display_rules_json, "modal display rules")?,
        form_id: form_id_raw.as_deref().map(parse_ulid).transpose()?.map(FormId),
        status: PublishStatus::parse(&status_raw)
            .ok_or_else(|| anyhow!("unknown status: {status_raw}"))?,
        views: count_from_db(row.get(9)?)?,
        conversions: count_from_db(row.get(10)?)?,
        created_at: parse_rfc3339(&row.get::<_, String>(11)?)?,
        updated_at: parse_rfc3339(&row.get::<_, String>(12)?)?,
    })
}

fn popup_from_row(row: &rusqlite::Row<'_>) -> Result<Popup> {
    let popup_id_raw: String = row.get(0)?;
    let popup_type_raw: String = row.get(4)?;
    let position_raw: String = row.get(5)?;
    let trigger_type_raw: String = row.get(6)?;
    let display_rules_json: String = row.get(8)?;
    let form_id_raw: Option<String> = row.get(9)?;
    let start_date: Option<String> = row.get(11)?;
    let end_date: Option<String> = row.get(12)?;
    let status_raw: String = row.get(13)?;

    Ok(Popup {
        popup_id: PopupId(parse_ulid(&popup_id_raw)?),
        name: row.get(1)?,
        title: row.get(2)?,
        body_html: row.get(3)?,
        popup_type: PopupType::parse(&popup_type_raw)
            .ok_or_else(|| anyhow!("unknown popup_type: {popup_type_raw}"))?,
        position: PopupPosition::parse(&position_raw)
            .ok_or_else(|| anyhow!("unknown popup position: {position_raw}"))?,
        trigger: Trigger {
            trigger_type: TriggerType::parse(&trigger_type_raw)
                .ok_or_else(|| anyhow!("unknown trigger_type: {trigger_type_raw}"))?,
            value: trigger_value_from_db(row.get(7)?)?,
        },
        display_rules: from_json::<DisplayRules>(&display_rules_json, "popup display rules")?,
        form_id: form_id_raw.as_deref().map(parse_ulid).transpose()?.map(FormId),
        auto_close_seconds: trigger_value_from_db(row.get(10)?)?,
        start_date: start_date.as_deref().map(parse_rfc3339).transpose()?,
        end_date: end_date.as_deref().map(parse_rfc3339).transpose()?,
        status: PublishStatus::parse(&status_raw)
            .ok_or_else(|| anyhow!("unknown status: {status_raw}"))?,
        views: count_from_db(row.get(14)?)?,
        conversions: count_from_db(row.get(15)?)?,
        clicks: count_from_db(row.get(16)?)?,
        created_at: parse_rfc3339(&row.get::<_, String>(17)?)?,
        updated_at: parse_rfc3339(&row.get::<_, String>(18)?)?,
    })
}

fn page_from_row(row: &rusqlite::Row<'_>) -> Result<Page> {
    Ok(Page {
        slug: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        template: row.get(3)?,
        updated_at: parse_rfc3339(&row.get::<_, String>(4)?)?,
    })
}

fn table_exists(conn: &Connection, table_name: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![table_name],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("failed to check if table exists: {table_name}"))?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    if !table_exists(conn, table)? {
        return Ok(false);
    }

    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("failed to inspect table_info for {table}"))?;
    let mut rows = stmt.query([])?;

    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }

    Ok(false)
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    let version = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
            row.get::<_, i64>(0)
        })
        .context("failed to read current schema version")?;
    Ok(version)
}

fn detect_effective_schema_version(conn: &Connection) -> Result<(i64, bool)> {
    let recorded = current_schema_version(conn)?;
    if recorded > 0 {
        return Ok((recorded, false));
    }

    if !table_exists(conn, "forms")? {
        return Ok((0, false));
    }

    if table_has_column(conn, "popups", "start_date")? {
        return Ok((2, true));
    }

    Ok((1, true))
}

fn record_schema_version(conn: &Connection, version: i64) -> Result<()> {
    let now = now_rfc3339()?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
        params![version, now],
    )
    .with_context(|| format!("failed to record migration version {version}"))?;
    Ok(())
}

fn now_rfc3339() -> Result<String> {
    rfc3339(OffsetDateTime::now_utc())
}

fn rfc3339(value: OffsetDateTime) -> Result<String> {
    value
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format RFC3339 timestamp")
}

fn optional_rfc3339(value: Option<OffsetDateTime>) -> Result<Option<String>> {
    value.map(rfc3339).transpose()
}

fn parse_rfc3339(value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
        .with_context(|| format!("invalid RFC3339 timestamp: {value}"))
}

fn parse_ulid(raw: &str) -> Result<Ulid> {
    Ulid::from_string(raw).with_context(|| format!("invalid ULID: {raw}"))
}

fn to_json<T: Serialize>(value: &T, what: &str) -> Result<String> {
    serde_json::to_string(value).with_context(|| format!("failed to serialize {what}"))
}

fn from_json<T: DeserializeOwned>(raw: &str, what: &str) -> Result<T> {
    serde_json::from_str(raw).with_context(|| format!("failed to deserialize {what}"))
}

fn count_to_db(value: u64) -> Result<i64> {
    i64::try_from(value).context("counter exceeds sqlite integer range")
}

fn count_from_db(value: i64) -> Result<u64> {
    u64::try_from(value).context("negative counter in database")
}

fn trigger_value_from_db(value: i64) -> Result<u32> {
    u32::try_from(value).context("out-of-range value in database")
}

fn write_ndjson_file<T: Serialize>(path: &Path, values: &[T]) -> Result<(String, usize)> {
    let file = File::create(path)
        .with_context(|| format!("failed to create export file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let mut hasher = Sha256::new();

    for value in values {
        let line = serde_json::to_string(value).context("failed to serialize NDJSON row")?;
        writer
            .write_all(line.as_bytes())
            .with_context(|| format!("failed to write export file {}", path.display()))?;
        writer
            .write_all(b"\n")
            .with_context(|| format!("failed to write export file {}", path.display()))?;
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }

    writer.flush().with_context(|| format!("failed to flush export file {}", path.display()))?;

    Ok((format!("{:x}", hasher.finalize()), values.len()))
}

fn read_ndjson_file<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open NDJSON file {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut values = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| {
            format!("failed to read line {} from {}", index + 1, path.display())
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value = serde_json::from_str(trimmed).with_context(|| {
            format!("failed to parse NDJSON row {} from {}", index + 1, path.display())
        })?;
        values.push(value);
    }

    Ok(values)
}

fn read_export_manifest(path: &Path) -> Result<ExportManifest> {
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read manifest file {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse manifest JSON {}", path.display()))
}

fn ndjson_digest_and_records(path: &Path) -> Result<(String, usize)> {
    let file = File::open(path)
        .with_context(|| format!("failed to open NDJSON file {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut records = 0_usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| {
            format!("failed to read line {} from {}", index + 1, path.display())
        })?;
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
        if !line.trim().is_empty() {
            records += 1;
        }
    }

    Ok((format!("{:x}", hasher.finalize()), records))
}

const SNAPSHOT_FILES: [&str; 5] = [
    "forms.ndjson",
    "form_submissions.ndjson",
    "modals.ndjson",
    "popups.ndjson",
    "pages.ndjson",
];

fn validate_import_manifest(in_dir: &Path, manifest: &ExportManifest) -> Result<()> {
    if manifest.schema_version <= 0 || manifest.schema_version > LATEST_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported export schema version {}; supported range is 1..={}",
            manifest.schema_version,
            LATEST_SCHEMA_VERSION
        ));
    }

    let mut by_path: BTreeMap<&str, &ExportFileDigest> = BTreeMap::new();
    for file in &manifest.files {
        if by_path.insert(file.path.as_str(), file).is_some() {
            return Err(anyhow!("manifest contains duplicate file entry: {}", file.path));
        }
    }

    for required in SNAPSHOT_FILES {
        let Some(expected) = by_path.get(required) else {
            return Err(anyhow!("manifest is missing required file entry: {required}"));
        };
        let file_path = in_dir.join(required);
        if !file_path.exists() {
            return Err(anyhow!("manifest references missing file {}", file_path.display()));
        }

        let (actual_sha256, actual_records) = ndjson_digest_and_records(&file_path)?;
        if actual_sha256 != expected.sha256 {
            return Err(anyhow!(
                "manifest digest mismatch for {required}: expected {}, got {}",
                expected.sha256,
                actual_sha256
            ));
        }
        if actual_records != expected.records {
            return Err(anyhow!(
                "manifest record count mismatch for {required}: expected {}, got {}",
                expected.records,
                actual_records
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;
    use serde_json::json;
    use time::Duration;

    fn unique_temp_db_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sitecms-store-{label}-{}.sqlite3", Ulid::new()))
    }

    fn open_migrated(label: &str) -> Result<(SqliteStore, PathBuf)> {
        let path = unique_temp_db_path(label);
        let mut store = SqliteStore::open(&path)?;
        store.migrate()?;
        Ok((store, path))
    }

    fn fixture_time() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::seconds(1_760_000_000)
    }

    fn mk_form(name: &str) -> Form {
        Form {
            form_id: FormId::new(),
            name: name.to_string(),
            description: None,
            form_type: FormType::Contact,
            fields: vec![FieldDescriptor {
                id: "name".to_string(),
                kind: "text".to_string(),
                label: "Name".to_string(),
                required: true,
                placeholder: Some("Your name".to_string()),
                description: None,
                options: Vec::new(),
            }],
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

    fn mk_submission(form_id: FormId) -> FormSubmission {
        let mut data = serde_json::Map::new();
        data.insert("name".to_string(), json!("Pat"));
        FormSubmission {
            submission_id: SubmissionId::new(),
            form_id,
            data,
            user_agent: Some("test-agent".to_string()),
            ip_address: None,
            referrer: None,
            status: SubmissionStatus::New,
            created_at: fixture_time(),
        }
    }

    fn mk_modal(form_id: Option<FormId>) -> Modal {
        Modal {
            modal_id: ModalId::new(),
            name: "welcome".to_string(),
            title: "Welcome".to_string(),
            body_html: "<p>Hi</p>".to_string(),
            trigger: Trigger { trigger_type: TriggerType::Time, value: 3 },
            display_rules: DisplayRules::default(),
            form_id,
            status: PublishStatus::Active,
            views: 0,
            conversions: 0,
            created_at: fixture_time(),
            updated_at: fixture_time(),
        }
    }

    fn mk_popup(form_id: Option<FormId>) -> Popup {
        Popup {
            popup_id: PopupId::new(),
            name: "offer".to_string(),
            title: "Offer".to_string(),
            body_html: "<p>20% off</p>".to_string(),
            popup_type: PopupType::Corner,
            position: PopupPosition::BottomRight,
            trigger: Trigger { trigger_type: TriggerType::Exit, value: 0 },
            display_rules: DisplayRules::default(),
            form_id,
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

    fn mk_page(slug: &str, content: &str) -> Page {
        Page {
            slug: slug.to_string(),
            title: "Home".to_string(),
            content: content.to_string(),
            template: None,
            updated_at: fixture_time(),
        }
    }

    #[test]
    fn fresh_database_migrates_to_latest() -> Result<()> {
        let (store, path) = open_migrated("fresh")?;
        let status = store.schema_status()?;
        assert_eq!(status.current_version, LATEST_SCHEMA_VERSION);
        assert!(status.pending_versions.is_empty());
        assert!(!status.inferred_from_legacy);
        drop(store);
        fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn legacy_v1_database_upgrades_with_schedule_columns() -> Result<()> {
        let path = unique_temp_db_path("legacy");
        {
            let conn = Connection::open(&path)?;
            conn.execute_batch(MIGRATION_001_SQL)?;
        }

        let mut store = SqliteStore::open(&path)?;
        let status = store.schema_status()?;
        assert_eq!(status.current_version, 1);
        assert!(status.inferred_from_legacy);
        assert_eq!(status.pending_versions, vec![2]);

        store.migrate()?;
        let mut popup = mk_popup(None);
        popup.start_date = Some(fixture_time());
        popup.end_date = Some(fixture_time() + Duration::days(7));
        store.create_popup(&popup)?;
        let restored = match store.get_popup(popup.popup_id)? {
            Some(popup) => popup,
            None => panic!("popup should exist after upgrade"),
        };
        assert_eq!(restored.start_date, popup.start_date);
        drop(store);
        fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn form_round_trips_with_fields_and_settings() -> Result<()> {
        let (mut store, path) = open_migrated("form-roundtrip")?;
        let mut form = mk_form("Book a visit");
        form.styling.button_color = Some("#0ea5e9".to_string());
        store.create_form(&form)?;

        let restored = match store.get_form(form.form_id)? {
            Some(form) => form,
            None => panic!("form should exist"),
        };
        assert_eq!(restored, form);

        drop(store);
        fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn create_form_rejects_unrecognized_field_kind() -> Result<()> {
        let (mut store, path) = open_migrated("bad-field")?;
        let mut form = mk_form("Broken");
        form.fields[0].kind = "signature".to_string();

        let err = match store.create_form(&form) {
            Ok(()) => panic!("unknown field kind should be rejected"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("form validation failed"));
        assert!(store.get_form(form.form_id)?.is_none());

        drop(store);
        fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn submission_bumps_form_counters() -> Result<()> {
        let (mut store, path) = open_migrated("counters")?;
        let form = mk_form("Contact");
        store.create_form(&form)?;

        store.record_submission(&mk_submission(form.form_id))?;
        store.record_submission(&mk_submission(form.form_id))?;

        let restored = match store.get_form(form.form_id)? {
            Some(form) => form,
            None => panic!("form should exist"),
        };
        assert_eq!(restored.submission_count, 2);
        assert_eq!(restored.last_submission_at, Some(fixture_time()));

        drop(store);
        fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn deleting_form_cascades_submissions_and_detaches_widgets() -> Result<()> {
        let (mut store, path) = open_migrated("fk-policy")?;
        let form = mk_form("Lead");
        store.create_form(&form)?;
        let submission = mk_submission(form.form_id);
        store.record_submission(&submission)?;
        let modal = mk_modal(Some(form.form_id));
        store.create_modal(&modal)?;
        let popup = mk_popup(Some(form.form_id));
        store.create_popup(&popup)?;

        assert!(store.delete_form(form.form_id)?);

        assert!(store.get_submission(submission.submission_id)?.is_none());
        let restored_modal = match store.get_modal(modal.modal_id)? {
            Some(modal) => modal,
            None => panic!("modal should survive form deletion"),
        };
        assert!(restored_modal.form_id.is_none());
        let restored_popup = match store.get_popup(popup.popup_id)? {
            Some(popup) => popup,
            None => panic!("popup should survive form deletion"),
        };
        assert!(restored_popup.form_id.is_none());

        drop(store);
        fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn submission_status_filtering_and_moderation() -> Result<()> {
        let (mut store, path) = open_migrated("moderation")?;
        let form = mk_form("Contact");
        store.create_form(&form)?;
        let submission = mk_submission(form.form_id);
        store.record_submission(&submission)?;

        store.set_submission_status(submission.submission_id, SubmissionStatus::Spam)?;
        assert!(store
            .list_submissions(Some(form.form_id), Some(SubmissionStatus::New))?
            .is_empty());
        let spam = store.list_submissions(Some(form.form_id), Some(SubmissionStatus::Spam))?;
        assert_eq!(spam.len(), 1);
        assert_eq!(spam[0].submission_id, submission.submission_id);

        drop(store);
        fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn popup_auto_close_zero_round_trips_as_zero() -> Result<()> {
        let (mut store, path) = open_migrated("auto-close")?;
        let popup = mk_popup(None);
        assert_eq!(popup.auto_close_seconds, 0);
        store.create_popup(&popup)?;

        let restored = match store.get_popup(popup.popup_id)? {
            Some(popup) => popup,
            None => panic!("popup should exist"),
        };
        assert_eq!(restored.auto_close_seconds, 0);
        assert_eq!(restored, popup);

        drop(store);
        fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn active_popups_honor_schedule_window_and_status() -> Result<()> {
        let (mut store, path) = open_migrated("schedule")?;

        let live = mk_popup(None);
        store.create_popup(&live)?;

        let mut future = mk_popup(None);
        future.popup_id = PopupId::new();
        future.start_date = Some(fixture_time() + Duration::days(1));
        store.create_popup(&future)?;

        let mut expired = mk_popup(None);
        expired.popup_id = PopupId::new();
        expired.end_date = Some(fixture_time() - Duration::days(1));
        store.create_popup(&expired)?;

        let mut draft = mk_popup(None);
        draft.popup_id = PopupId::new();
        draft.status = PublishStatus::Draft;
        store.create_popup(&draft)?;

        let active = store.active_popups(fixture_time())?;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].popup_id, live.popup_id);

        drop(store);
        fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn counters_increment_per_widget() -> Result<()> {
        let (mut store, path) = open_migrated("widget-counters")?;
        let modal = mk_modal(None);
        store.create_modal(&modal)?;
        let popup = mk_popup(None);
        store.create_popup(&popup)?;

        store.bump_modal_counter(modal.modal_id, ModalCounter::Views)?;
        store.bump_modal_counter(modal.modal_id, ModalCounter::Views)?;
        store.bump_modal_counter(modal.modal_id, ModalCounter::Conversions)?;
        store.bump_popup_counter(popup.popup_id, PopupCounter::Clicks)?;

        let restored_modal = match store.get_modal(modal.modal_id)? {
            Some(modal) => modal,
            None => panic!("modal should exist"),
        };
        assert_eq!(restored_modal.views, 2);
        assert_eq!(restored_modal.conversions, 1);
        let restored_popup = match store.get_popup(popup.popup_id)? {
            Some(popup) => popup,
            None => panic!("popup should exist"),
        };
        assert_eq!(restored_popup.clicks, 1);

        drop(store);
        fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn splice_missing_marker_leaves_page_unchanged() -> Result<()> {
        let (mut store, path) = open_migrated("splice-miss")?;
        let content = "<div><!-- Hero Section --><h1>Hi</h1></div>";
        store.upsert_page(&mk_page("home", content))?;

        let report = store.splice_page_content(
            "home",
            &SpliceOp::InsertAfter {
                marker: "<!-- Pricing Section -->".to_string(),
                fragment: "<p>x</p>".to_string(),
            },
        )?;
        assert!(!report.written);
        assert!(!report.outcome.spliced());

        let page = match store.get_page("home")? {
            Some(page) => page,
            None => panic!("page should exist"),
        };
        assert_eq!(page.content, content);
        assert_eq!(page.updated_at, fixture_time());

        drop(store);
        fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn splice_writes_new_content_after_marker() -> Result<()> {
        let (mut store, path) = open_migrated("splice-hit")?;
        store.upsert_page(&mk_page("home", "<!-- Hero Section --><h1>Hi</h1>"))?;

        let report = store.splice_page_content(
            "home",
            &SpliceOp::InsertAfter {
                marker: "<!-- Hero Section -->".to_string(),
                fragment: "<section>Contact bar</section>".to_string(),
            },
        )?;
        assert!(report.written);

        let page = match store.get_page("home")? {
            Some(page) => page,
            None => panic!("page should exist"),
        };
        assert_eq!(
            page.content,
            "<!-- Hero Section --><section>Contact bar</section><h1>Hi</h1>"
        );
        assert_eq!(store.page_markers("home")?, vec!["<!-- Hero Section -->".to_string()]);

        drop(store);
        fs::remove_file(path).ok();
        Ok(())
    }

    #[test]
    fn snapshot_export_import_round_trips() -> Result<()> {
        let (mut store, path) = open_migrated("export")?;
        let form = mk_form("Contact");
        store.create_form(&form)?;
        store.record_submission(&mk_submission(form.form_id))?;
        store.create_modal(&mk_modal(Some(form.form_id)))?;
        store.create_popup(&mk_popup(None))?;
        store.upsert_page(&mk_page("home", "<!-- Hero Section -->"))?;

        let out_dir = std::env::temp_dir().join(format!("sitecms-export-{}", Ulid::new()));
        let manifest = store.export_snapshot(&out_dir)?;
        assert_eq!(manifest.files.len(), 5);

        let (mut target, target_path) = open_migrated("import")?;
        let summary = target.import_snapshot(&out_dir, false)?;
        assert_eq!(summary.imported.get("forms"), Some(&1));
        assert_eq!(summary.imported.get("form_submissions"), Some(&1));
        assert_eq!(summary.imported.get("pages"), Some(&1));

        let restored = match target.get_form(form.form_id)? {
            Some(form) => form,
            None => panic!("imported form should exist"),
        };
        assert_eq!(restored.submission_count, 1);

        // Second import with skip_existing leaves counts alone.
        let again = target.import_snapshot(&out_dir, true)?;
        assert_eq!(again.imported.get("forms"), None);
        assert_eq!(again.skipped_existing.get("forms"), Some(&1));

        drop(store);
        drop(target);
        fs::remove_file(path).ok();
        fs::remove_file(target_path).ok();
        fs::remove_dir_all(out_dir).ok();
        Ok(())
    }

    #[test]
    fn tampered_snapshot_digest_is_rejected() -> Result<()> {
        let (mut store, path) = open_migrated("tamper")?;
        store.create_form(&mk_form("Contact"))?;
        let out_dir = std::env::temp_dir().join(format!("sitecms-tamper-{}", Ulid::new()));
        store.export_snapshot(&out_dir)?;

        let forms_file = out_dir.join("forms.ndjson");
        let mut contents = fs::read_to_string(&forms_file)?;
        contents.push_str("{\"garbage\":true}\n");
        fs::write(&forms_file, contents)?;

        let (mut target, target_path) = open_migrated("tamper-target")?;
        let err = match target.import_snapshot(&out_dir, false) {
            Ok(_) => panic!("tampered snapshot should be rejected"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("manifest"));

        drop(store);
        drop(target);
        fs::remove_file(path).ok();
        fs::remove_file(target_path).ok();
        fs::remove_dir_all(out_dir).ok();
        Ok(())
    }

    #[test]
    fn backup_and_restore_preserve_rows() -> Result<()> {
        let (mut store, path) = open_migrated("backup")?;
        let form = mk_form("Contact");
        store.create_form(&form)?;

        let backup_file = std::env::temp_dir().join(format!("sitecms-backup-{}.sqlite3", Ulid::new()));
        store.backup_database(&backup_file)?;

        let (mut restored_store, restored_path) = open_migrated("restore")?;
        restored_store.restore_database(&backup_file)?;
        assert!(restored_store.get_form(form.form_id)?.is_some());

        drop(store);
        drop(restored_store);
        fs::remove_file(path).ok();
        fs::remove_file(restored_path).ok();
        fs::remove_file(backup_file).ok();
        Ok(())
    }

    #[test]
    fn integrity_check_reports_healthy_database() -> Result<()> {
        let (mut store, path) = open_migrated("integrity")?;
        store.create_form(&mk_form("Contact"))?;

        let report = store.integrity_check()?;
        assert!(report.quick_check_ok);
        assert!(report.foreign_key_violations.is_empty());
        assert_eq!(report.schema_status.current_version, LATEST_SCHEMA_VERSION);

        drop(store);
        fs::remove_file(path).ok();
        Ok(())
    }
}
