use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use sitecms_api::{
    CreateFormRequest, CreateModalRequest, CreatePopupRequest, PreviewResult,
    RecordSubmissionRequest, SiteCmsApi, SplicePageRequest, UpsertPageRequest,
};
use sitecms_core::render::CssFramework;
use sitecms_core::splice::SpliceOp;
use sitecms_core::{
    DeviceFrame, DisplayRules, FieldDescriptor, FormId, FormSettings, FormStyling, FormType,
    ModalId, PopupId, PopupPosition, PopupType, PublishStatus, SubmissionId, SubmissionStatus,
    Trigger, TriggerType,
};
use sitecms_store_sqlite::{ModalCounter, PopupCounter};
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;
use ulid::Ulid;

const CLI_CONTRACT_VERSION: &str = "cli.v1";

#[derive(Debug, Parser)]
#[command(name = "sitecms")]
#[command(about = "Site CMS CLI")]
struct Cli {
    #[arg(long, default_value = "./sitecms.sqlite3")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Db {
        #[command(subcommand)]
        command: Box<DbCommand>,
    },
    Form {
        #[command(subcommand)]
        command: Box<FormCommand>,
    },
    Submission {
        #[command(subcommand)]
        command: Box<SubmissionCommand>,
    },
    Modal {
        #[command(subcommand)]
        command: Box<ModalCommand>,
    },
    Popup {
        #[command(subcommand)]
        command: Box<PopupCommand>,
    },
    Page {
        #[command(subcommand)]
        command: Box<PageCommand>,
    },
    Preview {
        #[command(subcommand)]
        command: Box<PreviewCommand>,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    SchemaVersion,
    Migrate(DbMigrateArgs),
    Export(DbExportArgs),
    Import(DbImportArgs),
    Backup(DbBackupArgs),
    Restore(DbRestoreArgs),
    IntegrityCheck,
}

#[derive(Debug, Args)]
struct DbMigrateArgs {
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct DbExportArgs {
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct DbImportArgs {
    #[arg(long = "in")]
    input: PathBuf,
    #[arg(long, default_value_t = true)]
    skip_existing: bool,
}

#[derive(Debug, Args)]
struct DbBackupArgs {
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct DbRestoreArgs {
    #[arg(long = "in")]
    input: PathBuf,
}

#[derive(Debug, Subcommand)]
enum FormCommand {
    Create(FormWriteArgs),
    Update(FormUpdateArgs),
    Get(FormIdArgs),
    List(ListArgs),
    Delete(FormIdArgs),
}

#[derive(Debug, Args)]
struct FormWriteArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    form_type: FormTypeArg,
    /// JSON array of field descriptors.
    #[arg(long, default_value = "[]")]
    fields: String,
    /// Read the field descriptor array from a file instead.
    #[arg(long)]
    fields_file: Option<PathBuf>,
    #[arg(long)]
    custom_html_file: Option<PathBuf>,
    /// JSON object with notify_email / redirect_url / store_submissions.
    #[arg(long)]
    settings: Option<String>,
    /// JSON object with theme_color / button_color / max_width_px.
    #[arg(long)]
    styling: Option<String>,
    #[arg(long)]
    status: StatusArg,
    #[arg(long, default_value = "Submit")]
    submit_button_text: String,
    #[arg(long, default_value = "Thank you! Your submission has been received.")]
    success_message: String,
    #[arg(long, default_value = "Something went wrong. Please try again.")]
    error_message: String,
}

#[derive(Debug, Args)]
struct FormUpdateArgs {
    #[arg(long)]
    id: String,
    #[command(flatten)]
    write: FormWriteArgs,
}

#[derive(Debug, Args)]
struct FormIdArgs {
    #[arg(long)]
    id: String,
}

#[derive(Debug, Args)]
struct ListArgs {
    #[arg(long)]
    status: Option<StatusArg>,
}

#[derive(Debug, Subcommand)]
enum SubmissionCommand {
    Record(SubmissionRecordArgs),
    Get(SubmissionIdArgs),
    List(SubmissionListArgs),
    SetStatus(SubmissionSetStatusArgs),
    Delete(SubmissionIdArgs),
}

#[derive(Debug, Args)]
struct SubmissionRecordArgs {
    #[arg(long)]
    form_id: String,
    /// JSON object keyed by field id.
    #[arg(long)]
    data: String,
    #[arg(long)]
    user_agent: Option<String>,
    #[arg(long)]
    ip_address: Option<String>,
    #[arg(long)]
    referrer: Option<String>,
}

#[derive(Debug, Args)]
struct SubmissionIdArgs {
    #[arg(long)]
    id: String,
}

#[derive(Debug, Args)]
struct SubmissionListArgs {
    #[arg(long)]
    form_id: Option<String>,
    #[arg(long)]
    status: Option<SubmissionStatusArg>,
}

#[derive(Debug, Args)]
struct SubmissionSetStatusArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    status: SubmissionStatusArg,
}

#[derive(Debug, Subcommand)]
enum ModalCommand {
    Create(ModalWriteArgs),
    Update(ModalUpdateArgs),
    Get(ModalIdArgs),
    List(ListArgs),
    Delete(ModalIdArgs),
    Track(ModalTrackArgs),
}

#[derive(Debug, Args)]
struct ModalWriteArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    title: String,
    #[arg(long, default_value = "")]
    body_html: String,
    #[arg(long)]
    trigger_type: TriggerTypeArg,
    #[arg(long, default_value_t = 0)]
    trigger_value: u32,
    /// JSON object with page lists / device list / visitor caps.
    #[arg(long)]
    display_rules: Option<String>,
    #[arg(long)]
    form_id: Option<String>,
    #[arg(long)]
    status: StatusArg,
}

#[derive(Debug, Args)]
struct ModalUpdateArgs {
    #[arg(long)]
    id: String,
    #[command(flatten)]
    write: ModalWriteArgs,
}

#[derive(Debug, Args)]
struct ModalIdArgs {
    #[arg(long)]
    id: String,
}

#[derive(Debug, Args)]
struct ModalTrackArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    counter: ModalCounterArg,
}

#[derive(Debug, Subcommand)]
enum PopupCommand {
    Create(PopupWriteArgs),
    Update(PopupUpdateArgs),
    Get(PopupIdArgs),
    List(ListArgs),
    Active(PopupActiveArgs),
    Delete(PopupIdArgs),
    Track(PopupTrackArgs),
}

#[derive(Debug, Args)]
struct PopupWriteArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    title: String,
    #[arg(long, default_value = "")]
    body_html: String,
    #[arg(long)]
    popup_type: PopupTypeArg,
    #[arg(long)]
    position: PositionArg,
    #[arg(long)]
    trigger_type: TriggerTypeArg,
    #[arg(long, default_value_t = 0)]
    trigger_value: u32,
    #[arg(long)]
    display_rules: Option<String>,
    #[arg(long)]
    form_id: Option<String>,
    #[arg(long, default_value_t = 0)]
    auto_close_seconds: u32,
    #[arg(long)]
    start_date: Option<String>,
    #[arg(long)]
    end_date: Option<String>,
    #[arg(long)]
    status: StatusArg,
}

#[derive(Debug, Args)]
struct PopupUpdateArgs {
    #[arg(long)]
    id: String,
    #[command(flatten)]
    write: PopupWriteArgs,
}

#[derive(Debug, Args)]
struct PopupIdArgs {
    #[arg(long)]
    id: String,
}

#[derive(Debug, Args)]
struct PopupActiveArgs {
    #[arg(long)]
    as_of: Option<String>,
}

#[derive(Debug, Args)]
struct PopupTrackArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    counter: PopupCounterArg,
}

#[derive(Debug, Subcommand)]
enum PageCommand {
    Upsert(PageUpsertArgs),
    Get(PageSlugArgs),
    List,
    Delete(PageSlugArgs),
    Splice(PageSpliceArgs),
    Markers(PageSlugArgs),
}

#[derive(Debug, Args)]
struct PageUpsertArgs {
    #[arg(long)]
    slug: String,
    #[arg(long)]
    title: String,
    #[arg(long)]
    content: Option<String>,
    #[arg(long)]
    content_file: Option<PathBuf>,
    #[arg(long)]
    template: Option<String>,
}

#[derive(Debug, Args)]
struct PageSlugArgs {
    #[arg(long)]
    slug: String,
}

#[derive(Debug, Args)]
struct PageSpliceArgs {
    #[arg(long)]
    slug: String,
    /// Insert the fragment immediately after this marker comment.
    #[arg(long, conflicts_with_all = ["insert_before", "replace_start", "replace_end"])]
    insert_after: Option<String>,
    /// Insert the fragment immediately before this marker comment.
    #[arg(long, conflicts_with_all = ["replace_start", "replace_end"])]
    insert_before: Option<String>,
    /// Replace everything between this marker and --replace-end.
    #[arg(long, requires = "replace_end")]
    replace_start: Option<String>,
    #[arg(long, requires = "replace_start")]
    replace_end: Option<String>,
    #[arg(long)]
    fragment: Option<String>,
    #[arg(long)]
    fragment_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum PreviewCommand {
    Form(PreviewIdArgs),
    Modal(PreviewIdArgs),
    Popup(PreviewIdArgs),
    Page(PreviewPageArgs),
}

#[derive(Debug, Args)]
struct PreviewIdArgs {
    #[arg(long)]
    id: String,
    #[command(flatten)]
    render: PreviewRenderArgs,
}

#[derive(Debug, Args)]
struct PreviewPageArgs {
    #[arg(long)]
    slug: String,
    #[command(flatten)]
    render: PreviewRenderArgs,
}

#[derive(Debug, Args)]
struct PreviewRenderArgs {
    #[arg(long, default_value = "desktop")]
    device: DeviceArg,
    #[arg(long, default_value = "none")]
    framework: FrameworkArg,
    /// Write the rendered HTML document to this file instead of the payload.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormTypeArg {
    Contact,
    Newsletter,
    Lead,
    Custom,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StatusArg {
    Draft,
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SubmissionStatusArg {
    New,
    Read,
    Archived,
    Spam,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TriggerTypeArg {
    Time,
    Scroll,
    Exit,
    Click,
    Manual,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PopupTypeArg {
    Banner,
    SlideIn,
    FullScreen,
    Corner,
    Bar,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PositionArg {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    TopBar,
    BottomBar,
    Center,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DeviceArg {
    Desktop,
    Tablet,
    Mobile,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FrameworkArg {
    None,
    Tailwind,
    Bootstrap,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModalCounterArg {
    Views,
    Conversions,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PopupCounterArg {
    Views,
    Clicks,
    Conversions,
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let api = SiteCmsApi::new(cli.db);
    match cli.command {
        Command::Db { command } => run_db(*command, &api),
        Command::Form { command } => run_form(*command, &api),
        Command::Submission { command } => run_submission(*command, &api),
        Command::Modal { command } => run_modal(*command, &api),
        Command::Popup { command } => run_popup(*command, &api),
        Command::Page { command } => run_page(*command, &api),
        Command::Preview { command } => run_preview(*command, &api),
    }
}

fn run_db(command: DbCommand, api: &SiteCmsApi) -> Result<()> {
    match command {
        DbCommand::SchemaVersion => {
            let status = api.schema_status()?;
            emit_json(serde_json::json!({
                "current_version": status.current_version,
                "target_version": status.target_version,
                "pending_versions": status.pending_versions,
                "up_to_date": status.pending_versions.is_empty(),
                "inferred_from_legacy": status.inferred_from_legacy
            }))
        }
        DbCommand::Migrate(args) => {
            let result = api.migrate(args.dry_run)?;
            emit_json(serde_json::to_value(&result).context("failed to serialize migrate result")?)
        }
        DbCommand::Export(args) => {
            let manifest = api.db_export(&args.out)?;
            emit_json(serde_json::json!({
                "out_dir": args.out,
                "manifest": manifest
            }))
        }
        DbCommand::Import(args) => {
            let summary = api.db_import(&args.input, args.skip_existing)?;
            emit_json(serde_json::json!({
                "in_dir": args.input,
                "skip_existing": args.skip_existing,
                "summary": summary
            }))
        }
        DbCommand::Backup(args) => {
            api.db_backup(&args.out)?;
            emit_json(serde_json::json!({
                "backup_path": args.out,
                "status": "ok"
            }))
        }
        DbCommand::Restore(args) => {
            api.db_restore(&args.input)?;
            let status = api.schema_status()?;
            emit_json(serde_json::json!({
                "restored_from": args.input,
                "current_version": status.current_version,
                "target_version": status.target_version,
                "pending_versions": status.pending_versions
            }))
        }
        DbCommand::IntegrityCheck => {
            let report = api.db_verify()?;
            emit_json(serde_json::to_value(&report).context("failed to serialize integrity report")?)
        }
    }
}

fn run_form(command: FormCommand, api: &SiteCmsApi) -> Result<()> {
    match command {
        FormCommand::Create(args) => {
            let form = api.form_create(build_form_request(&args)?)?;
            emit_json(serde_json::to_value(&form).context("failed to serialize form")?)
        }
        FormCommand::Update(args) => {
            let form_id = parse_form_id(&args.id)?;
            let form = api.form_update(form_id, build_form_request(&args.write)?)?;
            emit_json(serde_json::to_value(&form).context("failed to serialize form")?)
        }
        FormCommand::Get(args) => {
            let form = api.form_get(parse_form_id(&args.id)?)?;
            emit_json(serde_json::to_value(&form).context("failed to serialize form")?)
        }
        FormCommand::List(args) => {
            let forms = api.form_list(args.status.map(StatusArg::into_status))?;
            emit_json(serde_json::json!({ "forms": forms }))
        }
        FormCommand::Delete(args) => {
            let form_id = parse_form_id(&args.id)?;
            api.form_delete(form_id)?;
            emit_json(serde_json::json!({
                "form_id": form_id.to_string(),
                "deleted": true
            }))
        }
    }
}

fn run_submission(command: SubmissionCommand, api: &SiteCmsApi) -> Result<()> {
    match command {
        SubmissionCommand::Record(args) => {
            let data = parse_json_object(&args.data, "--data")?;
            let submission = api.submission_record(RecordSubmissionRequest {
                form_id: parse_form_id(&args.form_id)?,
                data,
                user_agent: args.user_agent,
                ip_address: args.ip_address,
                referrer: args.referrer,
            })?;
            emit_json(serde_json::to_value(&submission).context("failed to serialize submission")?)
        }
        SubmissionCommand::Get(args) => {
            let submission = api.submission_get(parse_submission_id(&args.id)?)?;
            emit_json(serde_json::to_value(&submission).context("failed to serialize submission")?)
        }
        SubmissionCommand::List(args) => {
            let form_id = args.form_id.as_deref().map(parse_form_id).transpose()?;
            let status = args.status.map(SubmissionStatusArg::into_status);
            let submissions = api.submission_list(form_id, status)?;
            emit_json(serde_json::json!({ "submissions": submissions }))
        }
        SubmissionCommand::SetStatus(args) => {
            let submission = api.submission_set_status(
                parse_submission_id(&args.id)?,
                args.status.into_status(),
            )?;
            emit_json(serde_json::to_value(&submission).context("failed to serialize submission")?)
        }
        SubmissionCommand::Delete(args) => {
            let submission_id = parse_submission_id(&args.id)?;
            api.submission_delete(submission_id)?;
            emit_json(serde_json::json!({
                "submission_id": submission_id.to_string(),
                "deleted": true
            }))
        }
    }
}

fn run_modal(command: ModalCommand, api: &SiteCmsApi) -> Result<()> {
    match command {
        ModalCommand::Create(args) => {
            let modal = api.modal_create(build_modal_request(&args)?)?;
            emit_json(serde_json::to_value(&modal).context("failed to serialize modal")?)
        }
        ModalCommand::Update(args) => {
            let modal_id = parse_modal_id(&args.id)?;
            let modal = api.modal_update(modal_id, build_modal_request(&args.write)?)?;
            emit_json(serde_json::to_value(&modal).context("failed to serialize modal")?)
        }
        ModalCommand::Get(args) => {
            let modal = api.modal_get(parse_modal_id(&args.id)?)?;
            emit_json(serde_json::to_value(&modal).context("failed to serialize modal")?)
        }
        ModalCommand::List(args) => {
            let modals = api.modal_list(args.status.map(StatusArg::into_status))?;
            emit_json(serde_json::json!({ "modals": modals }))
        }
        ModalCommand::Delete(args) => {
            let modal_id = parse_modal_id(&args.id)?;
            api.modal_delete(modal_id)?;
            emit_json(serde_json::json!({
                "modal_id": modal_id.to_string(),
                "deleted": true
            }))
        }
        ModalCommand::Track(args) => {
            let modal = api.modal_track(parse_modal_id(&args.id)?, args.counter.into_counter())?;
            emit_json(serde_json::to_value(&modal).context("failed to serialize modal")?)
        }
    }
}

fn run_popup(command: PopupCommand, api: &SiteCmsApi) -> Result<()> {
    match command {
        PopupCommand::Create(args) => {
            let popup = api.popup_create(build_popup_request(&args)?)?;
            emit_json(serde_json::to_value(&popup).context("failed to serialize popup")?)
        }
        PopupCommand::Update(args) => {
            let popup_id = parse_popup_id(&args.id)?;
            let popup = api.popup_update(popup_id, build_popup_request(&args.write)?)?;
            emit_json(serde_json::to_value(&popup).context("failed to serialize popup")?)
        }
        PopupCommand::Get(args) => {
            let popup = api.popup_get(parse_popup_id(&args.id)?)?;
            emit_json(serde_json::to_value(&popup).context("failed to serialize popup")?)
        }
        PopupCommand::List(args) => {
            let popups = api.popup_list(args.status.map(StatusArg::into_status))?;
            emit_json(serde_json::json!({ "popups": popups }))
        }
        PopupCommand::Active(args) => {
            let as_of = args.as_of.as_deref().map(parse_rfc3339).transpose()?;
            let popups = api.popup_active(as_of)?;
            emit_json(serde_json::json!({ "popups": popups }))
        }
        PopupCommand::Delete(args) => {
            let popup_id = parse_popup_id(&args.id)?;
            api.popup_delete(popup_id)?;
            emit_json(serde_json::json!({
                "popup_id": popup_id.to_string(),
                "deleted": true
            }))
        }
        PopupCommand::Track(args) => {
            let popup = api.popup_track(parse_popup_id(&args.id)?, args.counter.into_counter())?;
            emit_json(serde_json::to_value(&popup).context("failed to serialize popup")?)
        }
    }
}

fn run_page(command: PageCommand, api: &SiteCmsApi) -> Result<()> {
    match command {
        PageCommand::Upsert(args) => {
            let content = read_inline_or_file(args.content, args.content_file.as_deref(), "page content")?;
            let page = api.page_upsert(UpsertPageRequest {
                slug: args.slug,
                title: args.title,
                content,
                template: args.template,
            })?;
            emit_json(serde_json::to_value(&page).context("failed to serialize page")?)
        }
        PageCommand::Get(args) => {
            let page = api.page_get(&args.slug)?;
            emit_json(serde_json::to_value(&page).context("failed to serialize page")?)
        }
        PageCommand::List => {
            let pages = api.page_list()?;
            emit_json(serde_json::json!({ "pages": pages }))
        }
        PageCommand::Delete(args) => {
            api.page_delete(&args.slug)?;
            emit_json(serde_json::json!({
                "slug": args.slug,
                "deleted": true
            }))
        }
        PageCommand::Splice(args) => {
            let op = build_splice_op(&args)?;
            let report = api.page_splice(SplicePageRequest { slug: args.slug.clone(), op })?;
            if !report.written {
                tracing::warn!(slug = %report.slug, "splice marker not found; page left unchanged");
            }
            emit_json(serde_json::to_value(&report).context("failed to serialize splice report")?)
        }
        PageCommand::Markers(args) => {
            let markers = api.page_markers(&args.slug)?;
            emit_json(serde_json::json!({
                "slug": args.slug,
                "markers": markers
            }))
        }
    }
}

fn run_preview(command: PreviewCommand, api: &SiteCmsApi) -> Result<()> {
    let (result, render) = match command {
        PreviewCommand::Form(args) => {
            let result = api.preview_form(
                parse_form_id(&args.id)?,
                args.render.device.into_device(),
                args.render.framework.into_framework(),
            )?;
            (result, args.render)
        }
        PreviewCommand::Modal(args) => {
            let result = api.preview_modal(
                parse_modal_id(&args.id)?,
                args.render.device.into_device(),
                args.render.framework.into_framework(),
            )?;
            (result, args.render)
        }
        PreviewCommand::Popup(args) => {
            let result = api.preview_popup(
                parse_popup_id(&args.id)?,
                args.render.device.into_device(),
                args.render.framework.into_framework(),
            )?;
            (result, args.render)
        }
        PreviewCommand::Page(args) => {
            let result = api.preview_page(
                &args.slug,
                args.render.device.into_device(),
                args.render.framework.into_framework(),
            )?;
            (result, args.render)
        }
    };
    emit_preview(&result, render.out.as_deref())
}

fn emit_preview(result: &PreviewResult, out: Option<&std::path::Path>) -> Result<()> {
    if let Some(out_path) = out {
        fs::write(out_path, &result.html)
            .with_context(|| format!("failed to write preview file {}", out_path.display()))?;
        return emit_json(serde_json::json!({
            "out_file": out_path,
            "bytes": result.html.len(),
            "device": result.device,
            "framework": result.framework
        }));
    }
    emit_json(serde_json::to_value(result).context("failed to serialize preview result")?)
}

fn build_form_request(args: &FormWriteArgs) -> Result<CreateFormRequest> {
    let fields_body = match args.fields_file.as_deref() {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read fields file {}", path.display()))?,
        None => args.fields.clone(),
    };
    let fields: Vec<FieldDescriptor> =
        serde_json::from_str(&fields_body).context("invalid field descriptor JSON")?;

    let custom_html = args
        .custom_html_file
        .as_deref()
        .map(|path| {
            fs::read_to_string(path)
                .with_context(|| format!("failed to read custom HTML file {}", path.display()))
        })
        .transpose()?;

    let settings: FormSettings = match args.settings.as_deref() {
        Some(raw) => serde_json::from_str(raw).context("invalid --settings JSON")?,
        None => FormSettings::default(),
    };
    let styling: FormStyling = match args.styling.as_deref() {
        Some(raw) => serde_json::from_str(raw).context("invalid --styling JSON")?,
        None => FormStyling::default(),
    };

    Ok(CreateFormRequest {
        name: args.name.clone(),
        description: args.description.clone(),
        form_type: args.form_type.into_form_type(),
        fields,
        custom_html,
        settings,
        styling,
        status: args.status.into_status(),
        submit_button_text: args.submit_button_text.clone(),
        success_message: args.success_message.clone(),
        error_message: args.error_message.clone(),
    })
}

fn build_modal_request(args: &ModalWriteArgs) -> Result<CreateModalRequest> {
    Ok(CreateModalRequest {
        name: args.name.clone(),
        title: args.title.clone(),
        body_html: args.body_html.clone(),
        trigger: Trigger {
            trigger_type: args.trigger_type.into_trigger_type(),
            value: args.trigger_value,
        },
        display_rules: parse_display_rules(args.display_rules.as_deref())?,
        form_id: args.form_id.as_deref().map(parse_form_id).transpose()?,
        status: args.status.into_status(),
    })
}

fn build_popup_request(args: &PopupWriteArgs) -> Result<CreatePopupRequest> {
    Ok(CreatePopupRequest {
        name: args.name.clone(),
        title: args.title.clone(),
        body_html: args.body_html.clone(),
        popup_type: args.popup_type.into_popup_type(),
        position: args.position.into_position(),
        trigger: Trigger {
            trigger_type: args.trigger_type.into_trigger_type(),
            value: args.trigger_value,
        },
        display_rules: parse_display_rules(args.display_rules.as_deref())?,
        form_id: args.form_id.as_deref().map(parse_form_id).transpose()?,
        auto_close_seconds: args.auto_close_seconds,
        start_date: args.start_date.as_deref().map(parse_rfc3339).transpose()?,
        end_date: args.end_date.as_deref().map(parse_rfc3339).transpose()?,
        status: args.status.into_status(),
    })
}

fn build_splice_op(args: &PageSpliceArgs) -> Result<SpliceOp> {
    let fragment = read_inline_or_file(args.fragment.clone(), args.fragment_file.as_deref(), "fragment")?;
    if let Some(marker) = args.insert_after.clone() {
        return Ok(SpliceOp::InsertAfter { marker, fragment });
    }
    if let Some(marker) = args.insert_before.clone() {
        return Ok(SpliceOp::InsertBefore { marker, fragment });
    }
    match (args.replace_start.clone(), args.replace_end.clone()) {
        (Some(start), Some(end)) => Ok(SpliceOp::ReplaceBetween { start, end, fragment }),
        _ => Err(anyhow!(
            "provide one of --insert-after, --insert-before, or --replace-start with --replace-end"
        )),
    }
}

fn parse_display_rules(raw: Option<&str>) -> Result<DisplayRules> {
    match raw {
        Some(body) => serde_json::from_str(body).context("invalid --display-rules JSON"),
        None => Ok(DisplayRules::default()),
    }
}

fn parse_json_object(raw: &str, what: &str) -> Result<serde_json::Map<String, Value>> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("invalid JSON for {what}"))?;
    match value {
        Value::Object(object) => Ok(object),
        _ => Err(anyhow!("{what} MUST be a JSON object")),
    }
}

fn read_inline_or_file(
    inline: Option<String>,
    file: Option<&std::path::Path>,
    what: &str,
) -> Result<String> {
    match (inline, file) {
        (Some(_), Some(_)) => Err(anyhow!("{what} given both inline and as a file")),
        (Some(body), None) => Ok(body),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {what} file {}", path.display())),
        (None, None) => Err(anyhow!("{what} is required (inline or file)")),
    }
}

fn parse_rfc3339(value: &str) -> Result<OffsetDateTime> {
    let parsed = OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
        .with_context(|| format!("invalid RFC3339 UTC timestamp: {value}"))?;

    if parsed.offset() != time::UtcOffset::UTC {
        return Err(anyhow!("timestamp MUST use UTC offset Z (received: {value})"));
    }

    Ok(parsed)
}

fn parse_form_id(value: &str) -> Result<FormId> {
    let parsed = Ulid::from_string(value).with_context(|| format!("invalid ULID: {value}"))?;
    Ok(FormId(parsed))
}

fn parse_submission_id(value: &str) -> Result<SubmissionId> {
    let parsed = Ulid::from_string(value).with_context(|| format!("invalid ULID: {value}"))?;
    Ok(SubmissionId(parsed))
}

fn parse_modal_id(value: &str) -> Result<ModalId> {
    let parsed = Ulid::from_string(value).with_context(|| format!("invalid ULID: {value}"))?;
    Ok(ModalId(parsed))
}

fn parse_popup_id(value: &str) -> Result<PopupId> {
    let parsed = Ulid::from_string(value).with_context(|| format!("invalid ULID: {value}"))?;
    Ok(PopupId(parsed))
}

impl FormTypeArg {
    fn into_form_type(self) -> FormType {
        match self {
            Self::Contact => FormType::Contact,
            Self::Newsletter => FormType::Newsletter,
            Self::Lead => FormType::Lead,
            Self::Custom => FormType::Custom,
        }
    }
}

impl StatusArg {
    fn into_status(self) -> PublishStatus {
        match self {
            Self::Draft => PublishStatus::Draft,
            Self::Active => PublishStatus::Active,
            Self::Inactive => PublishStatus::Inactive,
        }
    }
}

impl SubmissionStatusArg {
    fn into_status(self) -> SubmissionStatus {
        match self {
            Self::New => SubmissionStatus::New,
            Self::Read => SubmissionStatus::Read,
            Self::Archived => SubmissionStatus::Archived,
            Self::Spam => SubmissionStatus::Spam,
        }
    }
}

impl TriggerTypeArg {
    fn into_trigger_type(self) -> TriggerType {
        match self {
            Self::Time => TriggerType::Time,
            Self::Scroll => TriggerType::Scroll,
            Self::Exit => TriggerType::Exit,
            Self::Click => TriggerType::Click,
            Self::Manual => TriggerType::Manual,
        }
    }
}

impl PopupTypeArg {
    fn into_popup_type(self) -> PopupType {
        match self {
            Self::Banner => PopupType::Banner,
            Self::SlideIn => PopupType::SlideIn,
            Self::FullScreen => PopupType::FullScreen,
            Self::Corner => PopupType::Corner,
            Self::Bar => PopupType::Bar,
        }
    }
}

impl PositionArg {
    fn into_position(self) -> PopupPosition {
        match self {
            Self::TopLeft => PopupPosition::TopLeft,
            Self::TopRight => PopupPosition::TopRight,
            Self::BottomLeft => PopupPosition::BottomLeft,
            Self::BottomRight => PopupPosition::BottomRight,
            Self::TopBar => PopupPosition::TopBar,
            Self::BottomBar => PopupPosition::BottomBar,
            Self::Center => PopupPosition::Center,
        }
    }
}

impl DeviceArg {
    fn into_device(self) -> DeviceFrame {
        match self {
            Self::Desktop => DeviceFrame::Desktop,
            Self::Tablet => DeviceFrame::Tablet,
            Self::Mobile => DeviceFrame::Mobile,
        }
    }
}

impl FrameworkArg {
    fn into_framework(self) -> CssFramework {
        match self {
            Self::None => CssFramework::None,
            Self::Tailwind => CssFramework::Tailwind,
            Self::Bootstrap => CssFramework::Bootstrap,
        }
    }
}

impl ModalCounterArg {
    fn into_counter(self) -> ModalCounter {
        match self {
            Self::Views => ModalCounter::Views,
            Self::Conversions => ModalCounter::Conversions,
        }
    }
}

impl PopupCounterArg {
    fn into_counter(self) -> PopupCounter {
        match self {
            Self::Views => PopupCounter::Views,
            Self::Clicks => PopupCounter::Clicks,
            Self::Conversions => PopupCounter::Conversions,
        }
    }
}
