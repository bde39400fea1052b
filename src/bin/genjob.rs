//! CLI for GenJob - long-running AI media jobs.

use clap::{Args, Parser, Subcommand, ValueEnum};
use genjob::{
    ArkProvider, ArkVideoModel, ArtifactKind, ClientConfig, DashScopeProvider,
    DashScopeVideoModel, GenJobError, JobClient, JobHandle, JobProvider, JobRequest, JobState,
    ProviderKind, TaskFilter,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "genjob")]
#[command(about = "Submit, poll and download AI video jobs (DashScope, Ark)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a video and wait for it
    Video(VideoArgs),

    /// Poll a job once
    Status(StatusArgs),

    /// Manage Ark tasks
    #[command(subcommand)]
    Tasks(TaskCommands),

    /// List available providers
    Providers,
}

#[derive(Args)]
struct VideoArgs {
    /// The text prompt describing the video
    prompt: String,

    /// Provider to use
    #[arg(short, long, value_enum, default_value = "dashscope")]
    provider: ProviderArg,

    /// Model id (defaults to the provider's text-to-video model)
    #[arg(short, long)]
    model: Option<String>,

    /// Reference image for image-to-video (URL or local file)
    #[arg(short, long)]
    image: Option<String>,

    /// Pixel size, e.g. 1920*1080 (DashScope)
    #[arg(long)]
    size: Option<String>,

    /// Resolution class, e.g. 720p
    #[arg(long)]
    resolution: Option<String>,

    /// Aspect ratio, e.g. 16:9 (Ark)
    #[arg(long)]
    aspect_ratio: Option<String>,

    /// Video duration in seconds
    #[arg(short, long)]
    duration: Option<u32>,

    /// Frames per second (Ark)
    #[arg(long)]
    fps: Option<u32>,

    /// Seed for deterministic generation
    #[arg(long)]
    seed: Option<u64>,

    /// Ask the provider to watermark the output
    #[arg(long)]
    watermark: Option<bool>,

    /// Keep the camera fixed (Ark)
    #[arg(long)]
    camera_fixed: Option<bool>,

    /// Directory for manifests and the downloaded video
    #[arg(short, long, default_value = "genjob_output")]
    output_dir: PathBuf,

    /// Seconds between status polls
    #[arg(long, default_value_t = 4)]
    poll_interval: u64,

    /// Seconds to wait before giving up
    #[arg(long, default_value_t = 300)]
    max_wait: u64,

    /// Do not write every raw response to disk
    #[arg(long)]
    no_record: bool,
}

#[derive(Args)]
struct StatusArgs {
    /// Task id returned at submission
    task_id: String,

    /// Provider that owns the task
    #[arg(short, long, value_enum, default_value = "dashscope")]
    provider: ProviderArg,
}

#[derive(Subcommand)]
enum TaskCommands {
    /// List Ark tasks
    List {
        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Page size
        #[arg(long, default_value_t = 10)]
        page_size: u32,

        /// Only tasks in this state
        #[arg(long, value_enum)]
        status: Option<StateArg>,

        /// Only tasks on this model
        #[arg(long)]
        model: Option<String>,
    },

    /// Delete (or cancel, if still queued) an Ark task
    Delete {
        /// Task id
        task_id: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderArg {
    Dashscope,
    Ark,
}

impl ProviderArg {
    fn kind(self) -> ProviderKind {
        match self {
            Self::Dashscope => ProviderKind::DashScope,
            Self::Ark => ProviderKind::Ark,
        }
    }

    fn default_model(self, with_image: bool) -> &'static str {
        match (self, with_image) {
            (Self::Dashscope, false) => DashScopeVideoModel::Wan22T2vPlus.as_str(),
            (Self::Dashscope, true) => DashScopeVideoModel::Wan22I2vPlus.as_str(),
            (Self::Ark, false) => ArkVideoModel::Seaweed.as_str(),
            (Self::Ark, true) => ArkVideoModel::SeedanceLiteI2v.as_str(),
        }
    }

    fn build(self) -> genjob::Result<Box<dyn JobProvider>> {
        Ok(match self {
            Self::Dashscope => Box::new(DashScopeProvider::builder().build()?),
            Self::Ark => Box::new(ArkProvider::builder().build()?),
        })
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StateArg {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl From<StateArg> for JobState {
    fn from(arg: StateArg) -> Self {
        match arg {
            StateArg::Queued => JobState::Queued,
            StateArg::Running => JobState::Running,
            StateArg::Succeeded => JobState::Succeeded,
            StateArg::Failed => JobState::Failed,
            StateArg::Cancelled => JobState::Canceled,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("genjob=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Video(args) => {
            generate_video(args, cli.json).await?;
        }
        Commands::Status(args) => {
            show_status(args, cli.json).await?;
        }
        Commands::Tasks(cmd) => {
            manage_tasks(cmd, cli.json).await?;
        }
        Commands::Providers => {
            list_providers(cli.json)?;
        }
    }

    Ok(())
}

fn build_request(args: &VideoArgs) -> anyhow::Result<JobRequest> {
    let model = args
        .model
        .clone()
        .unwrap_or_else(|| args.provider.default_model(args.image.is_some()).to_string());
    let mut request = JobRequest::new(model, &args.prompt);

    if let Some(ref image) = args.image {
        request = if image.starts_with("http://") || image.starts_with("https://") {
            request.with_image_url(image)
        } else {
            request.with_image_file(Path::new(image))?
        };
    }
    if let Some(ref size) = args.size {
        request = request.with_size(size);
    }
    if let Some(ref res) = args.resolution {
        request = request.with_resolution(res);
    }
    if let Some(ref ar) = args.aspect_ratio {
        request = request.with_aspect_ratio(ar);
    }
    if let Some(d) = args.duration {
        request = request.with_duration(d);
    }
    if let Some(fps) = args.fps {
        request = request.with_fps(fps);
    }
    if let Some(s) = args.seed {
        request = request.with_seed(s);
    }
    if let Some(wm) = args.watermark {
        request = request.with_watermark(wm);
    }
    if let Some(cf) = args.camera_fixed {
        request = request.with_camera_fixed(cf);
    }

    Ok(request)
}

async fn generate_video(args: VideoArgs, json_output: bool) -> anyhow::Result<()> {
    let request = build_request(&args)?;

    let config = ClientConfig::builder()
        .output_dir(&args.output_dir)
        .poll_interval(Duration::from_secs(args.poll_interval))
        .max_wait(Duration::from_secs(args.max_wait))
        .record_responses(!args.no_record)
        .build()?;
    let client = JobClient::new(args.provider.build()?, config)?;

    let outcome = match client.run(&request).await {
        Ok(outcome) => outcome,
        Err(GenJobError::Timeout { task_id, waited }) => {
            anyhow::bail!(
                "job {} still pending after {}s; check later with `genjob status {} --provider {}`",
                task_id,
                waited.as_secs(),
                task_id,
                args.provider.kind()
            );
        }
        Err(e @ GenJobError::Download { .. }) => {
            anyhow::bail!("{} (the result URL is kept in the job manifest)", e);
        }
        Err(e) => return Err(e.into()),
    };

    let result = &outcome.result;
    if json_output {
        let json = serde_json::json!({
            "type": "video",
            "success": true,
            "task_id": result.handle.task_id(),
            "provider": result.handle.provider.to_string(),
            "model": result.handle.model,
            "video_url": result.url,
            "output": outcome.artifact_path.display().to_string(),
            "manifest": outcome.manifest_path.display().to_string(),
            "polls": result.polls,
            "elapsed_secs": result.elapsed.as_secs(),
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!(
            "Generated video: {} via {} (task {})",
            outcome.artifact_path.display(),
            result.handle.provider,
            result.handle.task_id()
        );
        if let Some(ref prompt) = result.actual_prompt {
            println!("Actual prompt: {}", prompt);
        }
        println!("Manifest: {}", outcome.manifest_path.display());
        println!(
            "Generation time: {}s over {} polls",
            result.elapsed.as_secs(),
            result.polls
        );
    }

    Ok(())
}

async fn show_status(args: StatusArgs, json_output: bool) -> anyhow::Result<()> {
    let provider = args.provider.build()?;
    let handle = JobHandle::resume(
        &args.task_id,
        args.provider.kind(),
        args.provider.default_model(false),
        ArtifactKind::Video,
    )?;
    let status = provider.poll(&handle).await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&status.raw)?);
    } else {
        println!("Task {}: {}", args.task_id, status.state);
        if let Some(ref url) = status.result_url {
            println!("Result URL: {}", url);
        }
        if let Some(ref message) = status.message {
            println!("Message: {}", message);
        }
    }

    Ok(())
}

async fn manage_tasks(cmd: TaskCommands, json_output: bool) -> anyhow::Result<()> {
    let provider = ArkProvider::builder().build()?;

    match cmd {
        TaskCommands::List {
            page,
            page_size,
            status,
            model,
        } => {
            let filter = TaskFilter {
                page_num: page,
                page_size,
                status: status.map(Into::into),
                model,
                ..TaskFilter::default()
            };
            let listing = provider.list_tasks(&filter).await?;

            if json_output {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                println!("{} task(s) in total", listing.total);
                for task in &listing.items {
                    let state = task.state.map(|s| s.as_str()).unwrap_or("?");
                    println!(
                        "  {} {} {}",
                        task.task_id,
                        state,
                        task.model.as_deref().unwrap_or("")
                    );
                }
            }
        }
        TaskCommands::Delete { task_id } => {
            provider.delete_task(&task_id).await?;
            if json_output {
                let json = serde_json::json!({ "task_id": task_id, "deleted": true });
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                println!("Deleted task {}", task_id);
            }
        }
    }

    Ok(())
}

fn list_providers(json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct ProviderInfo {
        name: &'static str,
        kind: &'static str,
        env_var: &'static str,
        default_model: &'static str,
        enabled: bool,
    }

    let providers = vec![
        ProviderInfo {
            name: "DashScope (Alibaba Model Studio)",
            kind: "dashscope",
            env_var: "DASHSCOPE_API_KEY",
            default_model: DashScopeVideoModel::default().as_str(),
            enabled: cfg!(feature = "dashscope-video"),
        },
        ProviderInfo {
            name: "Ark (Volcengine)",
            kind: "ark",
            env_var: "ARK_API_KEY",
            default_model: ArkVideoModel::default().as_str(),
            enabled: cfg!(feature = "ark-video"),
        },
    ];

    if json_output {
        println!("{}", serde_json::to_string_pretty(&providers)?);
    } else {
        println!("Available providers:\n");
        for p in &providers {
            let status = if p.enabled { "✓" } else { "✗" };
            println!("  {} {} ({})", status, p.name, p.kind);
            println!("    API key: {}", p.env_var);
            println!("    Default model: {}", p.default_model);
        }
    }

    Ok(())
}
