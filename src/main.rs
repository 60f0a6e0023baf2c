//! cvforge – command-line résumé builder.
//!
//! Usage:
//!   cvforge init <resume.json>
//!   cvforge export <resume.json> [--out DIR] [--template KIND] [--scale N]
//!                                [--font FILE] [--scene FILE] [--save]
//!   cvforge save <resume.json>
//!   cvforge list | delete <id> | duplicate <id>
//!   cvforge chat [--save] [--json FILE] [--resume ID]
//!   cvforge conversations [delete <id>]
//!   cvforge templates
//!
//! Settings not given as flags come from the environment (see `config`).

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::{env, fs, process};

use cv_forge::chat::{ConversationService, ConversationState};
use cv_forge::config::{parse_scale, AppConfig};
use cv_forge::export::{ConsoleSurface, DirectoryDownload, Exporter};
use cv_forge::fonts::FontManager;
use cv_forge::llm::GroqClient;
use cv_forge::raster::{Capture, Preview};
use cv_forge::store::{ConversationLibrary, CvLibrary, FileStore};
use cv_forge::{render_scene, ExportConfig, Resume, TemplateKind};

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let prog = args.first().map(String::as_str).unwrap_or("cvforge");

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => fail(&format!("Configuration error: {e}")),
    };

    let Some(command) = args.get(1) else {
        print_usage(prog);
        process::exit(1);
    };
    let rest = &args[2..];

    match command.as_str() {
        "init" => init(rest),
        "export" => export(rest, &config),
        "save" => save(rest, &config),
        "list" => list(&config),
        "delete" => delete(rest, &config),
        "duplicate" => duplicate(rest, &config),
        "chat" => chat(rest, &config).await,
        "conversations" => conversations(rest, &config),
        "templates" => {
            for kind in TemplateKind::ALL {
                println!("{:<10} {}", kind.as_str(), kind.description());
            }
        }
        "--help" | "-h" | "help" => print_usage(prog),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage(prog);
            process::exit(1);
        }
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{message}");
    process::exit(1);
}

fn library(config: &AppConfig) -> CvLibrary<FileStore> {
    CvLibrary::new(FileStore::new(&config.data_dir), config.user.clone())
}

fn conversation_library(config: &AppConfig) -> ConversationLibrary<FileStore> {
    ConversationLibrary::new(FileStore::new(&config.data_dir), config.user.clone())
}

fn single_positional<'a>(rest: &'a [String], what: &str) -> &'a str {
    match rest {
        [one] if !one.starts_with('-') => one,
        _ => fail(&format!("Error: expected exactly one {what}.")),
    }
}

fn read_resume(path: &Path) -> Resume {
    let text = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => fail(&format!("Error reading '{}': {e}", path.display())),
    };
    match serde_json::from_str::<Resume>(&text) {
        Ok(mut resume) => {
            resume.normalize();
            resume
        }
        Err(e) => fail(&format!("Error parsing '{}': {e}", path.display())),
    }
}

fn write_json(path: &Path, resume: &Resume) {
    let json = match serde_json::to_string_pretty(resume) {
        Ok(j) => j,
        Err(e) => fail(&format!("Error serialising résumé: {e}")),
    };
    if let Err(e) = fs::write(path, json) {
        fail(&format!("Error writing '{}': {e}", path.display()));
    }
}

fn init(rest: &[String]) {
    let path = PathBuf::from(single_positional(rest, "output path"));
    if path.exists() {
        fail(&format!("Refusing to overwrite '{}'.", path.display()));
    }
    write_json(&path, &Resume::default());
    eprintln!("Wrote empty résumé to '{}'", path.display());
}

fn export(rest: &[String], config: &AppConfig) {
    let mut input: Option<PathBuf> = None;
    let mut out_dir = config.out_dir.clone();
    let mut template: Option<TemplateKind> = None;
    let mut scale = config.scale;
    let mut font = config.font.clone();
    let mut scene_out: Option<PathBuf> = None;
    let mut save = false;

    let mut iter = rest.iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| match iter.next() {
            Some(v) => v.clone(),
            None => fail(&format!("Missing value for {flag}")),
        };
        match arg.as_str() {
            "--out" | "-o" => out_dir = PathBuf::from(value(arg)),
            "--template" | "-t" => match value(arg).parse() {
                Ok(kind) => template = Some(kind),
                Err(e) => fail(&format!("Error: {e}")),
            },
            "--scale" => match parse_scale(&value(arg)) {
                Ok(s) => scale = s,
                Err(e) => fail(&format!("Error: {e}")),
            },
            "--font" => font = Some(PathBuf::from(value(arg))),
            "--scene" => scene_out = Some(PathBuf::from(value(arg))),
            "--save" => save = true,
            other if other.starts_with('-') => fail(&format!("Unknown flag: {other}")),
            path if input.is_none() => input = Some(PathBuf::from(path)),
            path => fail(&format!("Unexpected argument: {path}")),
        }
    }

    let Some(input) = input else {
        fail("Error: no résumé file specified.");
    };
    let mut resume = read_resume(&input);
    if let Some(kind) = template {
        resume.selected_template = kind;
    }
    let missing = resume.missing_for_export();
    if !missing.is_empty() {
        log::warn!("Résumé is missing {}", missing.join(", "));
    }

    let mut fonts = FontManager::default();
    if let Some(path) = &font {
        if let Err(e) = fonts.load_file(path) {
            fail(&format!("Error: {e}"));
        }
    }

    let mut preview = Preview::new(fonts);
    let scene = render_scene(&resume, preview.fonts());
    if let Some(path) = &scene_out {
        if let Err(e) = fs::write(path, scene.to_json()) {
            fail(&format!("Error writing '{}': {e}", path.display()));
        }
    }
    preview.mount(scene);

    let name = resume.personal_info.full_name();
    let exporter = Exporter::new(ExportConfig {
        title: if name.is_empty() {
            "Curriculum Vitae".to_string()
        } else {
            format!("{name} - CV")
        },
        ..ExportConfig::with_scale(scale)
    });

    let target = preview.target();
    let report = match exporter.export(
        target.as_ref().map(|t| t as &dyn Capture),
        &resume.personal_info,
        &ConsoleSurface::default(),
        &DirectoryDownload::new(out_dir),
    ) {
        Ok(r) => r,
        Err(e) => fail(&format!("Error generating PDF: {e}")),
    };
    eprintln!(
        "Wrote '{}' ({} bytes, {} page{})",
        report.path.display(),
        report.bytes,
        report.pages,
        if report.pages == 1 { "" } else { "s" }
    );

    if save {
        let lib = library(config);
        let saved = lib
            .create(&resume, report.thumbnail.clone())
            .and_then(|id| lib.record_download(&id).map(|_| id));
        match saved {
            Ok(id) => eprintln!("Saved to library as {id}"),
            Err(e) => fail(&format!("Error saving CV: {e}")),
        }
    }
}

fn save(rest: &[String], config: &AppConfig) {
    let resume = read_resume(Path::new(single_positional(rest, "résumé file")));
    match library(config).create(&resume, None) {
        Ok(id) => println!("{id}"),
        Err(e) => fail(&format!("Error saving CV: {e}")),
    }
}

fn list(config: &AppConfig) {
    let items = match library(config).list() {
        Ok(items) => items,
        Err(e) => fail(&format!("Error reading library: {e}")),
    };
    if items.is_empty() {
        eprintln!("No saved CVs for '{}'.", config.user);
    }
    for cv in items {
        println!(
            "{}  {:<8} {:>3} dl  {}  {}",
            cv.id,
            cv.template.as_str(),
            cv.downloads,
            cv.updated_at.format("%Y-%m-%d %H:%M"),
            cv.title
        );
    }
}

fn delete(rest: &[String], config: &AppConfig) {
    let id = single_positional(rest, "CV id");
    match library(config).delete(id) {
        Ok(true) => eprintln!("Deleted {id}"),
        Ok(false) => fail(&format!("No CV with id {id}")),
        Err(e) => fail(&format!("Error deleting CV: {e}")),
    }
}

fn duplicate(rest: &[String], config: &AppConfig) {
    let id = single_positional(rest, "CV id");
    match library(config).duplicate(id) {
        Ok(Some(new_id)) => println!("{new_id}"),
        Ok(None) => fail(&format!("No CV with id {id}")),
        Err(e) => fail(&format!("Error duplicating CV: {e}")),
    }
}

async fn chat(rest: &[String], config: &AppConfig) {
    let mut save = false;
    let mut json_out: Option<PathBuf> = None;
    let mut resume_id: Option<String> = None;
    let mut iter = rest.iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| match iter.next() {
            Some(v) => v.clone(),
            None => fail(&format!("Missing value for {flag}")),
        };
        match arg.as_str() {
            "--save" => save = true,
            "--json" => json_out = Some(PathBuf::from(value(arg))),
            "--resume" => resume_id = Some(value(arg)),
            other => fail(&format!("Unexpected argument: {other}")),
        }
    }

    let api_key = match config.require_api_key() {
        Ok(k) => k.to_string(),
        Err(e) => fail(&format!("Error: {e}")),
    };
    let client = match GroqClient::new(api_key, config.groq_model.clone()) {
        Ok(c) => c,
        Err(e) => fail(&format!("Error: {e}")),
    };
    let service = ConversationService::new(client);

    let lib = library(config);
    let convos = conversation_library(config);
    let draft = match lib.load_draft() {
        Ok(draft) => draft,
        // Saving would replace the unreadable draft.
        Err(e) if save => fail(&format!(
            "Error reading saved draft: {e}\nRefusing to run with --save; \
             move the draft aside or run without --save."
        )),
        Err(e) => {
            log::warn!("Ignoring unreadable saved draft: {e}");
            None
        }
    };
    let mut state = match (&resume_id, draft) {
        (Some(id), _) => match convos.load(id) {
            Ok(Some(saved)) => {
                log::info!("Resuming conversation {id}: {}", saved.title);
                saved.state
            }
            Ok(None) => fail(&format!("No conversation with id {id}")),
            Err(e) => fail(&format!("Error reading conversation {id}: {e}")),
        },
        (None, Some(draft)) => {
            log::info!("Resuming from saved draft");
            ConversationState::resume(draft)
        }
        (None, None) => ConversationState::start(),
    };
    if let Some(last) = state.messages.last() {
        println!("{}\n", last.content);
    }

    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => fail(&format!("Error reading input: {e}")),
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit" | "/q") {
            break;
        }

        match service.send_message(&state, line).await {
            Ok((reply, next)) => {
                println!("\n{reply}\n");
                if let Some(warning) = &next.warning {
                    println!("({warning})\n");
                }
                if next.completed && !state.completed {
                    println!("(All required details collected. Type 'quit' to finish.)\n");
                }
                state = next;
            }
            Err(e) => eprintln!("Error: {e}"),
        }
    }

    if let Some(path) = &json_out {
        write_json(path, &state.draft);
        eprintln!("Wrote draft to '{}'", path.display());
    }
    if save {
        if let Err(e) = lib.save_draft(&state.draft) {
            fail(&format!("Error saving draft: {e}"));
        }
        let saved = match &resume_id {
            Some(id) => convos.update(id, &state).map(|_| id.clone()),
            None => convos.save(&state),
        };
        match saved {
            Ok(id) => eprintln!("Draft and conversation {id} saved for '{}'", config.user),
            Err(e) => fail(&format!("Error saving conversation: {e}")),
        }
    }
}

fn conversations(rest: &[String], config: &AppConfig) {
    let convos = conversation_library(config);
    match rest {
        [] => {
            let items = match convos.list() {
                Ok(items) => items,
                Err(e) => fail(&format!("Error reading conversations: {e}")),
            };
            if items.is_empty() {
                eprintln!("No saved conversations for '{}'.", config.user);
            }
            for c in items {
                println!(
                    "{}  {:>3} msg  {}  {}{}",
                    c.id,
                    c.state.messages.len(),
                    c.updated_at.format("%Y-%m-%d %H:%M"),
                    c.title,
                    if c.state.completed { "  (complete)" } else { "" }
                );
            }
        }
        [cmd, id] if cmd == "delete" => match convos.delete(id) {
            Ok(true) => eprintln!("Deleted {id}"),
            Ok(false) => fail(&format!("No conversation with id {id}")),
            Err(e) => fail(&format!("Error deleting conversation: {e}")),
        },
        _ => fail("Usage: conversations [delete <id>]"),
    }
}

fn print_usage(prog: &str) {
    eprintln!("cvforge – résumé builder with paginated PDF export");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} init <resume.json>          Write an empty résumé document");
    eprintln!("  {prog} export <resume.json> [flags] Export an A4 PDF");
    eprintln!("  {prog} save <resume.json>          Add a résumé to the CV library");
    eprintln!("  {prog} list                        List saved CVs");
    eprintln!("  {prog} delete <id>                 Remove a saved CV");
    eprintln!("  {prog} duplicate <id>              Copy a saved CV");
    eprintln!("  {prog} chat [--save] [--json FILE] Fill a draft by chatting (needs GROQ_API_KEY)");
    eprintln!("       [--resume ID]                 Continue a saved conversation");
    eprintln!("  {prog} conversations [delete <id>] List or remove saved conversations");
    eprintln!("  {prog} templates                   List available templates");
    eprintln!();
    eprintln!("Export flags:");
    eprintln!("  --out, -o DIR        Output directory (default: $CVFORGE_OUT_DIR or .)");
    eprintln!("  --template, -t KIND  Override the résumé's selected template");
    eprintln!("  --scale N            Capture oversampling factor (default: 2)");
    eprintln!("  --font FILE          TTF used to draw text (default: $CVFORGE_FONT)");
    eprintln!("  --scene FILE         Also write the laid-out scene as JSON");
    eprintln!("  --save               Store the CV and its thumbnail in the library");
}
