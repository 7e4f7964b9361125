//! Purpose: `galerie` CLI entry point — the admin panels as subcommands.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: All writes go through `api::GalleryClient` (validation +
//! cache invalidation).

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::aot::Shell;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use galerie::api::{
    Error, ErrorKind, ExhibitionKind, ExhibitionsByKind, GalleryClient, HttpStore, MediaUpload,
    NewProject, NewWork, PageCache, PagedFetcher, Record, collections, to_exit_code,
};

#[derive(Parser)]
#[command(name = "galerie", version, about = "Admin CLI for the gallery's remote collections")]
struct Cli {
    /// Store base URL; defaults to $GALERIE_URL.
    #[arg(long, global = true, value_name = "URL")]
    url: Option<String>,

    /// Bearer token; defaults to $GALERIE_TOKEN.
    #[arg(long, global = true, value_name = "TOKEN")]
    token: Option<String>,

    /// First-page cache directory (default ~/.galerie/cache).
    #[arg(long, global = true, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[arg(long, global = true, value_name = "SECONDS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Archived exhibitions.
    Exhibitions {
        #[command(subcommand)]
        action: ExhibitionsAction,
    },
    /// Studio works.
    Works {
        #[command(subcommand)]
        action: WorksAction,
    },
    /// Project pages.
    Projects {
        #[command(subcommand)]
        action: ProjectsAction,
    },
    /// Upcoming exhibitions.
    Upcoming {
        #[command(subcommand)]
        action: UpcomingAction,
    },
    /// Exhibition carousel images.
    Images {
        #[command(subcommand)]
        action: ImagesAction,
    },
    /// Splash video.
    Splash {
        #[command(subcommand)]
        action: SplashAction,
    },
    /// Generate shell completions.
    Completions { shell: Shell },
}

#[derive(Args)]
struct ListArgs {
    /// Records per page.
    #[arg(long, default_value_t = 10)]
    page_size: usize,

    /// Keep fetching until the collection is exhausted.
    #[arg(long)]
    all: bool,
}

#[derive(Subcommand)]
enum ExhibitionsAction {
    List {
        #[command(flatten)]
        list: ListArgs,

        /// Group output by exhibition kind.
        #[arg(long)]
        grouped: bool,
    },
    Add {
        #[arg(long)]
        title: String,

        /// Group, Solo, or Special.
        #[arg(long)]
        kind: String,
    },
    Rm {
        id: String,
    },
}

#[derive(Subcommand)]
enum WorksAction {
    List {
        #[command(flatten)]
        list: ListArgs,
    },
    Add {
        #[arg(long)]
        caption: String,
        #[arg(long)]
        measurements: String,
        #[arg(long)]
        medium: String,
        #[arg(long)]
        gallery: String,
        /// Image file to upload alongside the record.
        #[arg(long, value_name = "FILE")]
        image: Option<PathBuf>,
    },
    Rm {
        id: String,
    },
}

#[derive(Subcommand)]
enum ProjectsAction {
    List {
        #[command(flatten)]
        list: ListArgs,
    },
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        date: String,
        #[arg(long, value_name = "URL")]
        main_image: String,
        #[arg(long)]
        description: String,
        #[arg(long, value_name = "URL")]
        video: String,
        #[arg(long = "additional-image", value_name = "URL")]
        additional_images: Vec<String>,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long = "about", value_name = "ITEM")]
        about: Vec<String>,
        #[arg(long = "partner", value_name = "NAME")]
        partners: Vec<String>,
    },
    Rm {
        id: String,
    },
}

#[derive(Subcommand)]
enum UpcomingAction {
    List {
        #[command(flatten)]
        list: ListArgs,
    },
    /// Print the exhibition shown on the landing page.
    Show,
}

#[derive(Subcommand)]
enum ImagesAction {
    List {
        #[command(flatten)]
        list: ListArgs,
    },
    Add {
        /// Image file to upload.
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        caption: Option<String>,
    },
    Rm {
        id: String,
    },
}

#[derive(Subcommand)]
enum SplashAction {
    /// Print the current splash video record.
    Show,
    /// Upload a video and make it the splash record.
    Set {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Delete the splash video record (the current one when no id is given).
    Clear { id: Option<String> },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(()) => 0,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<(), Error> {
    if let Command::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "galerie", &mut io::stdout());
        return Ok(());
    }

    let client = build_client(&cli)?;
    match cli.command {
        Command::Exhibitions { action } => run_exhibitions(&client, action),
        Command::Works { action } => run_works(&client, action),
        Command::Projects { action } => run_projects(&client, action),
        Command::Upcoming { action } => run_upcoming(&client, action),
        Command::Images { action } => run_images(&client, action),
        Command::Splash { action } => run_splash(&client, action),
        Command::Completions { .. } => unreachable!("handled above"),
    }
}

fn build_client(cli: &Cli) -> Result<GalleryClient<HttpStore, HttpStore>, Error> {
    let url = cli
        .url
        .clone()
        .or_else(|| std::env::var("GALERIE_URL").ok())
        .ok_or_else(|| {
            Error::new(ErrorKind::InvalidArgument)
                .with_message("store url required (--url or GALERIE_URL)")
        })?;
    let mut store = HttpStore::new(url)?;
    if let Some(token) = cli
        .token
        .clone()
        .or_else(|| std::env::var("GALERIE_TOKEN").ok())
    {
        store = store.with_token(token);
    }
    if let Some(secs) = cli.timeout {
        store = store.with_timeout(Duration::from_secs(secs));
    }
    let cache = match &cli.cache_dir {
        Some(dir) => PageCache::with_dir(dir),
        None => PageCache::new(),
    };
    Ok(GalleryClient::new(store.clone(), store).with_cache(cache))
}

fn run_exhibitions(
    client: &GalleryClient<HttpStore, HttpStore>,
    action: ExhibitionsAction,
) -> Result<(), Error> {
    match action {
        ExhibitionsAction::List { list, grouped } => {
            let mut fetcher = client.exhibitions();
            let records = fetch_pages(&mut fetcher, &list)?;
            client.remember_first_page(collections::EXHIBITIONS, &records);
            if grouped {
                let groups = ExhibitionsByKind::project(&records);
                emit(&json!({
                    "collection": collections::EXHIBITIONS,
                    "group": groups.group,
                    "solo": groups.solo,
                    "special": groups.special,
                }));
            } else {
                emit_records(collections::EXHIBITIONS, &records, fetcher.state().exhausted());
            }
            Ok(())
        }
        ExhibitionsAction::Add { title, kind } => {
            let kind: ExhibitionKind = kind.parse()?;
            let id = client.add_exhibition(&title, kind)?;
            emit(&json!({ "added": { "collection": collections::EXHIBITIONS, "id": id } }));
            Ok(())
        }
        ExhibitionsAction::Rm { id } => {
            client.remove_exhibition(&id)?;
            emit(&json!({ "removed": { "collection": collections::EXHIBITIONS, "id": id } }));
            Ok(())
        }
    }
}

fn run_works(
    client: &GalleryClient<HttpStore, HttpStore>,
    action: WorksAction,
) -> Result<(), Error> {
    match action {
        WorksAction::List { list } => {
            let mut fetcher = client.works();
            let records = fetch_pages(&mut fetcher, &list)?;
            client.remember_first_page(collections::PAINTINGS, &records);
            emit_records(collections::PAINTINGS, &records, fetcher.state().exhausted());
            Ok(())
        }
        WorksAction::Add {
            caption,
            measurements,
            medium,
            gallery,
            image,
        } => {
            let image = image.map(|path| read_upload(&path)).transpose()?;
            let id = client.add_work(NewWork {
                caption,
                measurements,
                medium,
                gallery,
                image,
            })?;
            emit(&json!({ "added": { "collection": collections::PAINTINGS, "id": id } }));
            Ok(())
        }
        WorksAction::Rm { id } => {
            client.remove_work(&id)?;
            emit(&json!({ "removed": { "collection": collections::PAINTINGS, "id": id } }));
            Ok(())
        }
    }
}

fn run_projects(
    client: &GalleryClient<HttpStore, HttpStore>,
    action: ProjectsAction,
) -> Result<(), Error> {
    match action {
        ProjectsAction::List { list } => {
            let mut fetcher = client.projects();
            let records = fetch_pages(&mut fetcher, &list)?;
            client.remember_first_page(collections::PROJECTS, &records);
            emit_records(collections::PROJECTS, &records, fetcher.state().exhausted());
            Ok(())
        }
        ProjectsAction::Add {
            title,
            date,
            main_image,
            description,
            video,
            additional_images,
            icon,
            about,
            partners,
        } => {
            let id = client.add_project(NewProject {
                title,
                date,
                main_image,
                description,
                video,
                additional_images,
                icon,
                about,
                partners,
                ..NewProject::default()
            })?;
            emit(&json!({ "added": { "collection": collections::PROJECTS, "id": id } }));
            Ok(())
        }
        ProjectsAction::Rm { id } => {
            client.remove_project(&id)?;
            emit(&json!({ "removed": { "collection": collections::PROJECTS, "id": id } }));
            Ok(())
        }
    }
}

fn run_upcoming(
    client: &GalleryClient<HttpStore, HttpStore>,
    action: UpcomingAction,
) -> Result<(), Error> {
    match action {
        UpcomingAction::List { list } => {
            let mut fetcher = client.upcoming_exhibitions();
            let records = fetch_pages(&mut fetcher, &list)?;
            client.remember_first_page(collections::UPCOMING_EXHIBITIONS, &records);
            emit_records(
                collections::UPCOMING_EXHIBITIONS,
                &records,
                fetcher.state().exhausted(),
            );
            Ok(())
        }
        UpcomingAction::Show => {
            let exhibition = client.upcoming_exhibition()?;
            emit(&json!({ "exhibition": exhibition }));
            Ok(())
        }
    }
}

fn run_images(
    client: &GalleryClient<HttpStore, HttpStore>,
    action: ImagesAction,
) -> Result<(), Error> {
    match action {
        ImagesAction::List { list } => {
            let mut fetcher = client.exhibition_images();
            let records = fetch_pages(&mut fetcher, &list)?;
            client.remember_first_page(collections::EXHIBITION_IMAGES, &records);
            emit_records(
                collections::EXHIBITION_IMAGES,
                &records,
                fetcher.state().exhausted(),
            );
            Ok(())
        }
        ImagesAction::Add { file, caption } => {
            let upload = read_upload(&file)?;
            let id = client.add_exhibition_image(upload, caption.as_deref())?;
            emit(&json!({ "added": { "collection": collections::EXHIBITION_IMAGES, "id": id } }));
            Ok(())
        }
        ImagesAction::Rm { id } => {
            client.remove_exhibition_image(&id)?;
            emit(&json!({ "removed": { "collection": collections::EXHIBITION_IMAGES, "id": id } }));
            Ok(())
        }
    }
}

fn run_splash(
    client: &GalleryClient<HttpStore, HttpStore>,
    action: SplashAction,
) -> Result<(), Error> {
    match action {
        SplashAction::Show => {
            let video = client.splash_video()?;
            emit(&json!({ "video": video }));
            Ok(())
        }
        SplashAction::Set { file } => {
            let upload = read_upload(&file)?;
            let id = client.set_splash_video(upload)?;
            emit(&json!({ "added": { "collection": collections::VIDEOS, "id": id } }));
            Ok(())
        }
        SplashAction::Clear { id } => {
            let id = match id {
                Some(id) => id,
                // Resolve the current record from the store, not the cache.
                None => {
                    let mut fetcher = client.fetcher(collections::VIDEOS);
                    fetcher.fetch_next(1)?;
                    if let Some(err) = fetcher.take_last_error() {
                        return Err(err);
                    }
                    match fetcher.state().items().first() {
                        Some(record) => record.id.clone(),
                        None => {
                            return Err(Error::new(ErrorKind::NotFound)
                                .with_message("no splash video to clear")
                                .with_collection(collections::VIDEOS));
                        }
                    }
                }
            };
            client.clear_splash_video(&id)?;
            emit(&json!({ "removed": { "collection": collections::VIDEOS, "id": id } }));
            Ok(())
        }
    }
}

/// Fetch one page, or pages until exhaustion with `--all`. A failed page is
/// fatal to the command.
fn fetch_pages<S: galerie::api::RecordStore>(
    fetcher: &mut PagedFetcher<S>,
    list: &ListArgs,
) -> Result<Vec<Record>, Error> {
    loop {
        fetcher.fetch_next(list.page_size)?;
        if let Some(err) = fetcher.take_last_error() {
            return Err(err);
        }
        if !list.all || fetcher.state().exhausted() {
            break;
        }
    }
    Ok(fetcher.state().items().to_vec())
}

fn read_upload(path: &PathBuf) -> Result<MediaUpload, Error> {
    let bytes = std::fs::read(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to read {}", path.display()))
            .with_source(err)
    })?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.bin".to_string());
    Ok(MediaUpload { bytes, name })
}

fn emit_records(collection: &str, records: &[Record], exhausted: bool) {
    emit(&json!({
        "collection": collection,
        "records": records,
        "count": records.len(),
        "exhausted": exhausted,
    }));
}

fn emit(value: &serde_json::Value) {
    println!("{value}");
}

fn emit_error(err: &Error) {
    let payload = json!({
        "error": {
            "kind": format!("{:?}", err.kind()),
            "message": err.message(),
            "collection": err.collection(),
            "record_id": err.record_id(),
        }
    });
    eprintln!("{payload}");
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
