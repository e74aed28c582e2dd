use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use eyre::WrapErr;
use medform_core::FragmentKey;
use medform_session::{
    CommitOutcome, Diagnostic, FormSession, GroupCommitOutcome, GroupSession, LoadOutcome,
    Session, open_form,
};
use medform_vocab::CodeCatalog;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use medform_cli::app::{self, App};
use medform_cli::config::{self, LogFormat, MedformConfig};
use medform_cli::render;

#[derive(Parser, Debug)]
#[command(name = "medform", version, about = "Edit clinical record fragments through typed forms")]
struct Cli {
    /// Config file (defaults to the platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a config file.
    Init {
        #[arg(long)]
        store: Option<PathBuf>,
        #[arg(long)]
        subject: Option<String>,
        /// Extra vocabulary table files (JSON).
        #[arg(long = "vocabulary")]
        vocabulary_files: Vec<PathBuf>,
        #[arg(long, value_enum)]
        log_format: Option<LogFormatArg>,
    },
    /// List the built-in forms and their fields.
    Forms,
    /// Print the entries of one vocabulary.
    Vocab { id: String },
    /// List stored fragment keys.
    List {
        /// Only keys a session of this form opens at.
        #[arg(long)]
        form: Option<String>,
    },
    /// Print a fresh key for a new record of `form`.
    New { form: String },
    /// Load and print a record.
    Show {
        form: String,
        instance: Uuid,
        #[arg(long)]
        json: bool,
    },
    /// Load a record, apply edits, validate and save it.
    Edit {
        form: String,
        instance: Uuid,
        /// `field=value`; an empty value clears the field.
        #[arg(long = "set")]
        sets: Vec<String>,
        /// Entry the `--set` edits apply to (repeatable forms).
        #[arg(long)]
        entry: Option<Uuid>,
        /// Append an entry; `--set` edits then apply to it.
        #[arg(long)]
        add: bool,
        #[arg(long)]
        remove: Vec<Uuid>,
        /// `entry-id:position`, position counted from 1.
        #[arg(long = "move")]
        moves: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => config::default_config_path()?,
    };
    let cfg = config::load_or_default(&config_path)?;
    init_tracing(cfg.log_format);

    match cli.cmd {
        Command::Init {
            store,
            subject,
            vocabulary_files,
            log_format,
        } => init(&config_path, cfg, store, subject, vocabulary_files, log_format),
        Command::Forms => {
            let app = App::start(cfg)?;
            print_forms(&app);
            Ok(())
        }
        Command::Vocab { id } => {
            let app = App::start(cfg)?;
            let catalog = CodeCatalog::new(&app.registry, &id)?;
            println!("{} ({})", catalog.id(), catalog.system());
            for entry in catalog.list_entries() {
                println!("  {:<12} {}", entry.code, entry.label);
            }
            Ok(())
        }
        Command::List { form } => {
            let app = App::start(cfg)?;
            let resource = match form {
                Some(name) => Some(app::listed_resource(&*app.form(&name)?)),
                None => None,
            };
            for key in app.env.gateway.list_keys(resource.as_ref()).await? {
                println!("{key}");
            }
            Ok(())
        }
        Command::New { form } => {
            let app = App::start(cfg)?;
            let key = app::session_key(&*app.form(&form)?, Uuid::new_v4());
            println!("{}", key.instance);
            Ok(())
        }
        Command::Show {
            form,
            instance,
            json,
        } => {
            let app = App::start(cfg)?;
            show(&app, &form, instance, json).await
        }
        Command::Edit {
            form,
            instance,
            sets,
            entry,
            add,
            remove,
            moves,
        } => {
            let app = App::start(cfg)?;
            let edits = Edits {
                sets: sets.iter().map(|s| parse_set(s)).collect::<eyre::Result<_>>()?,
                entry,
                add,
                remove,
                moves: moves.iter().map(|s| parse_move(s)).collect::<eyre::Result<_>>()?,
            };
            edit(&app, &form, instance, edits).await
        }
    }
}

fn init(
    path: &std::path::Path,
    mut cfg: MedformConfig,
    store: Option<PathBuf>,
    subject: Option<String>,
    vocabulary_files: Vec<PathBuf>,
    log_format: Option<LogFormatArg>,
) -> eyre::Result<()> {
    if let Some(store) = store {
        cfg.store_dir = store;
    }
    if subject.is_some() {
        cfg.subject_reference = subject;
    }
    if !vocabulary_files.is_empty() {
        cfg.vocabulary_files = vocabulary_files;
    }
    if let Some(format) = log_format {
        cfg.log_format = format.into();
    }
    // Fail before writing if a vocabulary file does not load.
    app::load_registry(&cfg)?;
    config::save_config(path, &cfg)?;
    println!("config written to {}", path.display());
    Ok(())
}

fn print_forms(app: &App) {
    for form in &app.forms {
        let shape = if form.is_repeatable() { "repeatable" } else { "single" };
        println!("{} ({}, {shape})", form.name(), form.resource());
        for field in form.fields() {
            let vocabulary = field
                .kind
                .vocabulary()
                .map(|v| format!(" <{v}>"))
                .unwrap_or_default();
            println!("  {:<18} {}{vocabulary}  {}", field.id, field.kind.name(), field.label);
        }
    }
}

async fn open(app: &App, form: &str, instance: Uuid) -> eyre::Result<Session> {
    let form = app.form(form)?;
    let key = app::session_key(&form, instance);
    let (session, outcome) = open_form(&app.env, form, key, app.subject()).await?;
    if let LoadOutcome::Loaded { drift, .. } = outcome
        && drift > 0
    {
        tracing::warn!(drift, "record holds codes the loaded vocabularies do not know");
    }
    Ok(session)
}

async fn show(app: &App, form: &str, instance: Uuid, json: bool) -> eyre::Result<()> {
    let session = open(app, form, instance).await?;
    match &session {
        Session::Form(s) => {
            let snapshot = s.snapshot()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print!("{}", render::form(&snapshot));
            }
        }
        Session::Group(s) => {
            let snapshot = s.snapshot()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print!("{}", render::group(&snapshot));
            }
        }
    }
    session.close();
    Ok(())
}

struct Edits {
    sets: Vec<(String, String)>,
    entry: Option<Uuid>,
    add: bool,
    remove: Vec<Uuid>,
    moves: Vec<(Uuid, usize)>,
}

fn parse_set(text: &str) -> eyre::Result<(String, String)> {
    let (field, value) = text
        .split_once('=')
        .ok_or_else(|| eyre::eyre!("expected field=value, got '{text}'"))?;
    Ok((field.trim().to_string(), value.to_string()))
}

fn parse_move(text: &str) -> eyre::Result<(Uuid, usize)> {
    let (id, position) = text
        .rsplit_once(':')
        .ok_or_else(|| eyre::eyre!("expected entry-id:position, got '{text}'"))?;
    let id = Uuid::parse_str(id).wrap_err_with(|| format!("bad entry id in '{text}'"))?;
    let position: usize = position
        .parse()
        .wrap_err_with(|| format!("bad position in '{text}'"))?;
    Ok((id, position.saturating_sub(1)))
}

async fn edit(app: &App, form: &str, instance: Uuid, edits: Edits) -> eyre::Result<()> {
    let mut diagnostics = app.env.diagnostics.subscribe();
    let session = open(app, form, instance).await?;

    let result = match &session {
        Session::Form(s) => edit_form(s, &edits).await,
        Session::Group(s) => edit_group(s, &edits).await,
    };
    session.close();
    print_diagnostics(&mut diagnostics);
    result
}

async fn edit_form(session: &FormSession, edits: &Edits) -> eyre::Result<()> {
    if edits.add || edits.entry.is_some() || !edits.remove.is_empty() || !edits.moves.is_empty() {
        eyre::bail!("'{}' is not a repeatable form", session.form().name());
    }
    for (field, value) in &edits.sets {
        session.set_field_text(field, value)?;
    }

    match session.commit().await? {
        CommitOutcome::Saved { cleared: false } => println!("saved {}", session.key()),
        CommitOutcome::Saved { cleared: true } => println!("cleared {}", session.key()),
        CommitOutcome::Blocked { issues } => {
            for issue in &issues {
                println!("  {}: {}", issue.field, issue.message);
            }
            eyre::bail!("{} not saved: {} issue(s)", session.key(), issues.len());
        }
        CommitOutcome::Failed { error } => eyre::bail!("saving {} failed: {error}", session.key()),
        CommitOutcome::Abandoned => eyre::bail!("session closed before the save completed"),
    }
    Ok(())
}

async fn edit_group(session: &GroupSession, edits: &Edits) -> eyre::Result<()> {
    for id in &edits.remove {
        session.remove(*id)?;
    }

    let target = if edits.add {
        let id = session.add()?;
        println!("added entry {id}");
        Some(id)
    } else {
        edits.entry
    };

    if !edits.sets.is_empty() {
        let id = target.ok_or_else(|| eyre::eyre!("--set on a repeatable form needs --entry or --add"))?;
        for (field, value) in &edits.sets {
            session.set_field_text(id, field, value)?;
        }
    }
    for (id, position) in &edits.moves {
        session.reorder(*id, *position)?;
    }

    let report = match session.commit().await? {
        GroupCommitOutcome::Committed(report) => report,
        GroupCommitOutcome::Abandoned => eyre::bail!("session closed before the saves completed"),
    };
    for key in &report.saved {
        println!("saved {key}");
    }
    for blocked in &report.blocked {
        println!("entry {} not saved:", blocked.id);
        for issue in &blocked.issues {
            println!("  {}: {}", issue.field, issue.message);
        }
    }
    for (key, error) in &report.failed {
        println!("saving {key} failed: {error}");
    }
    if !report.is_clean() {
        eyre::bail!(
            "{} entr(y/ies) blocked, {} save(s) failed",
            report.blocked.len(),
            report.failed.len()
        );
    }
    Ok(())
}

fn print_diagnostics(rx: &mut broadcast::Receiver<Diagnostic>) {
    loop {
        match rx.try_recv() {
            Ok(Diagnostic::VocabularyDrift { key, drift }) => eprintln!(
                "note: {key}: {} code '{}' is not in vocabulary '{}'{}",
                drift.field,
                drift.code,
                drift.vocabulary,
                if drift.preserved { " (kept as stored)" } else { "" }
            ),
            Ok(Diagnostic::FetchDiscarded { key, fields }) => {
                eprintln!("note: {key}: stored values for {} fields replaced by edits", fields.len());
            }
            Ok(Diagnostic::PersistenceFailure { keys, error }) => {
                let keys: Vec<String> = keys.iter().map(FragmentKey::to_string).collect();
                eprintln!("error: store failure for {}: {error}", keys.join(", "));
            }
            // Printed with the commit result.
            Ok(Diagnostic::CommitBlocked { .. }) => {}
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                eprintln!("note: {n} diagnostics dropped");
            }
            Err(_) => break,
        }
    }
}
