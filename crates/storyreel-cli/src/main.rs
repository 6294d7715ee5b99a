//! StoryReel CLI
//!
//! Headless driver for the storyboard core: analysis, shot media, scene
//! compilation and version navigation against a local data directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use storyreel_lib::core::generative::{ProviderFamily, ProviderKind};
use storyreel_lib::core::prompt::{self, CompiledPrompt};
use storyreel_lib::core::settings::{EndpointSettings, SettingsManager, StudioSettings};
use storyreel_lib::core::storage::{FileBlobStore, FileKeyValueStore};
use storyreel_lib::core::studio::Studio;
use storyreel_lib::core::versions::{self, Direction, NewScene};
use storyreel_lib::core::AspectRatio;

#[derive(Parser, Debug)]
#[command(name = "storyreel", version, about = "Storyboard compilation and generation")]
struct Cli {
    /// Directory holding the storyboard and generated blobs
    #[arg(long, global = true, default_value = ".storyreel")]
    data_dir: PathBuf,

    /// Settings directory (defaults to the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show or change provider settings
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Break a script file into shots and append them
    Analyze(AnalyzeArgs),
    /// Print the current shot list
    Shots,
    /// Apply chat-style shot patches from a JSON file
    Patch {
        file: PathBuf,
    },
    /// Generate a still image for a shot
    Image {
        shot: String,
    },
    /// Voice a shot's dialogue line
    Dialogue {
        shot: String,
    },
    /// Render a shot's sound-effect note
    Sfx {
        shot: String,
    },
    /// Compile shots into a prompt without creating a scene
    Compile(CompileArgs),
    /// Scene and version management
    #[command(subcommand)]
    Scene(SceneCommand),
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    /// Print the effective settings
    Show,
    /// Configure an endpoint (all kinds unless --kind is given)
    Set(SetArgs),
}

#[derive(Parser, Debug)]
struct SetArgs {
    #[arg(long, value_enum)]
    family: Option<FamilyArg>,
    #[arg(long, value_enum)]
    kind: Option<KindArg>,
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long)]
    model: Option<String>,
}

#[derive(Parser, Debug)]
struct AnalyzeArgs {
    /// Script text file
    script: PathBuf,
    /// Reference images sent along with the script
    #[arg(long = "image")]
    images: Vec<String>,
}

#[derive(Parser, Debug)]
struct CompileArgs {
    /// Comma-separated shot ids, in order
    #[arg(long, value_delimiter = ',', required = true)]
    shots: Vec<String>,
    #[arg(long)]
    style: Option<String>,
    #[arg(long)]
    ratio: Option<String>,
}

#[derive(Subcommand, Debug)]
enum SceneCommand {
    /// List scenes
    List,
    /// Create a scene from a shot selection
    Create {
        #[arg(long)]
        name: String,
        #[command(flatten)]
        compile: CompileArgs,
    },
    /// Print a scene with its active prompt
    Show { scene: String },
    /// Replace the shot composition
    SetShots {
        scene: String,
        #[arg(long, value_delimiter = ',', required = true)]
        shots: Vec<String>,
    },
    /// Replace the draft prompt with the contents of a file
    Edit { scene: String, file: PathBuf },
    /// Drop manual edits and recompile the draft
    Recompose { scene: String },
    /// Snapshot the draft into a new version
    Save { scene: String },
    /// Move the active pointer
    Navigate {
        scene: String,
        #[arg(long)]
        backward: bool,
    },
    /// Generate a video for the active prompt
    Video { scene: String },
    /// Delete a scene, keeping its shots
    Delete { scene: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FamilyArg {
    Native,
    ChatStyle,
}

impl From<FamilyArg> for ProviderFamily {
    fn from(value: FamilyArg) -> Self {
        match value {
            FamilyArg::Native => ProviderFamily::Native,
            FamilyArg::ChatStyle => ProviderFamily::ChatStyle,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Analysis,
    Image,
    Speech,
    SoundEffect,
    Video,
}

impl From<KindArg> for ProviderKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Analysis => ProviderKind::Analysis,
            KindArg::Image => ProviderKind::Image,
            KindArg::Speech => ProviderKind::Speech,
            KindArg::SoundEffect => ProviderKind::SoundEffect,
            KindArg::Video => ProviderKind::Video,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings_manager = match &cli.config_dir {
        Some(dir) => SettingsManager::new(dir),
        None => SettingsManager::default_location().context("no platform config directory; pass --config-dir")?,
    };

    match cli.cmd {
        Command::Settings(cmd) => cmd_settings(&settings_manager, cmd),
        cmd => {
            let settings = settings_manager.load();
            let studio = open_studio(&cli.data_dir, &settings).await?;
            run(&studio, cmd).await
        }
    }
}

async fn open_studio(data_dir: &Path, settings: &StudioSettings) -> anyhow::Result<Studio> {
    let kv = Arc::new(FileKeyValueStore::new(data_dir));
    let blobs = Arc::new(FileBlobStore::new(data_dir.join("blobs")));
    let studio = Studio::open(settings.providers.clone(), kv, blobs)
        .await
        .context("open studio")?;

    let board = studio.snapshot().await;
    if board.global_style.is_empty() && board.shots.is_empty() && board.scenes.is_empty() {
        let defaults = settings.defaults.clone();
        studio
            .store()
            .update(|board| {
                board.global_style = defaults.global_style;
                board.aspect_ratio = defaults.aspect_ratio;
                Ok(())
            })
            .await?;
    }
    Ok(studio)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_settings(manager: &SettingsManager, cmd: SettingsCommand) -> anyhow::Result<()> {
    let mut settings = manager.load();
    match cmd {
        SettingsCommand::Show => {
            eprintln!("{}", manager.path().display());
            print_json(&settings)
        }
        SettingsCommand::Set(args) => {
            if let Some(family) = args.family {
                settings.providers.family = family.into();
            }

            let kinds: Vec<ProviderKind> = match args.kind {
                Some(kind) => vec![kind.into()],
                None => ProviderKind::all().to_vec(),
            };
            for kind in kinds {
                let endpoint: &mut EndpointSettings = settings.providers.endpoint_mut(kind);
                if let Some(base_url) = &args.base_url {
                    endpoint.base_url = base_url.clone();
                }
                if let Some(api_key) = &args.api_key {
                    endpoint.api_key = api_key.clone();
                }
                if let Some(model) = &args.model {
                    endpoint.model = Some(model.clone());
                }
            }

            let saved = manager.save(&settings)?;
            print_json(&saved)
        }
    }
}

async fn run(studio: &Studio, cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Settings(_) => Ok(()),
        Command::Analyze(args) => {
            let script = std::fs::read_to_string(&args.script)
                .with_context(|| format!("read script '{}'", args.script.display()))?;
            let ids = studio.analyze_script(&script, &args.images).await?;
            print_json(&ids)
        }
        Command::Shots => print_json(&studio.snapshot().await.shots),
        Command::Patch { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("read patches '{}'", file.display()))?;
            let summary = studio.apply_shot_patches(&text).await?;
            eprintln!(
                "{} updated, {} created, {} deleted",
                summary.updated, summary.created, summary.deleted
            );
            Ok(())
        }
        Command::Image { shot } => print_json(&studio.generate_shot_image(&shot).await?),
        Command::Dialogue { shot } => print_json(&studio.generate_dialogue(&shot).await?),
        Command::Sfx { shot } => print_json(&studio.generate_sound_effect(&shot).await?),
        Command::Compile(args) => {
            let compiled = compile_preview(studio, &args).await?;
            println!("{}", compiled.prompt);
            Ok(())
        }
        Command::Scene(cmd) => run_scene(studio, cmd).await,
    }
}

async fn compile_preview(studio: &Studio, args: &CompileArgs) -> anyhow::Result<CompiledPrompt> {
    let board = studio.snapshot().await;
    let shots = args
        .shots
        .iter()
        .map(|id| board.shot(id).with_context(|| format!("shot not found: {}", id)))
        .collect::<anyhow::Result<Vec<_>>>()?;

    prompt::check_policy(&shots).map_err(anyhow::Error::msg)?;

    let mut cast_ids: Vec<String> = Vec::new();
    for id in shots.iter().flat_map(|shot| shot.main_cast_ids.iter()) {
        if !cast_ids.contains(id) {
            cast_ids.push(id.clone());
        }
    }

    let style = args.style.clone().unwrap_or_else(|| board.global_style.clone());
    let ratio = args
        .ratio
        .as_deref()
        .map(AspectRatio::parse_or_default)
        .unwrap_or(board.aspect_ratio);

    prompt::compile(&shots, &style, &cast_ids, ratio, board.anchor.as_ref(), &board.actors)
        .context("shot selection rejected")
}

async fn run_scene(studio: &Studio, cmd: SceneCommand) -> anyhow::Result<()> {
    let store = studio.store();
    match cmd {
        SceneCommand::List => {
            let board = studio.snapshot().await;
            for scene in &board.scenes {
                println!(
                    "{}\t{}\t{} shots\t{} versions",
                    scene.id,
                    scene.name,
                    scene.shot_ids.len(),
                    scene.versions.len()
                );
            }
            Ok(())
        }
        SceneCommand::Create { name, compile } => {
            let mut request = NewScene::new(name, compile.shots);
            if let Some(style) = compile.style {
                request = request.with_style(style);
            }
            if let Some(ratio) = compile.ratio {
                request = request.with_aspect_ratio(AspectRatio::parse_or_default(&ratio));
            }
            let id = studio.create_scene(request).await?;
            println!("{}", id);
            Ok(())
        }
        SceneCommand::Show { scene } => {
            let board = studio.snapshot().await;
            let scene = board
                .scene(&scene)
                .with_context(|| format!("scene not found: {}", scene))?;
            eprintln!("active: {:?}", scene.active);
            println!("{}", scene.active_prompt());
            Ok(())
        }
        SceneCommand::SetShots { scene, shots } => {
            store.update(|board| versions::set_shots(board, &scene, shots)).await?;
            Ok(())
        }
        SceneCommand::Edit { scene, file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("read prompt '{}'", file.display()))?;
            store.update(|board| versions::edit_draft(board, &scene, text)).await?;
            Ok(())
        }
        SceneCommand::Recompose { scene } => {
            store.update(|board| versions::recompose(board, &scene)).await?;
            Ok(())
        }
        SceneCommand::Save { scene } => {
            let id = store.update(|board| versions::save(board, &scene)).await?;
            println!("{}", id);
            Ok(())
        }
        SceneCommand::Navigate { scene, backward } => {
            let direction = if backward {
                Direction::Backward
            } else {
                Direction::Forward
            };
            let active = store
                .update(|board| versions::navigate(board, &scene, direction))
                .await?;
            print_json(&active)
        }
        SceneCommand::Video { scene } => {
            let id = studio.generate_scene_video(&scene).await?;
            println!("{}", id);
            Ok(())
        }
        SceneCommand::Delete { scene } => {
            let removed = store.update(|board| versions::delete_scene(board, &scene)).await?;
            eprintln!("deleted {} ({} shots kept)", removed.name, removed.shot_ids.len());
            Ok(())
        }
    }
}
