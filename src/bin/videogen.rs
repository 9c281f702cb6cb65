//! CLI for VideoGen - AI video generation.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use videogen::{
    ArkProvider, CogQuality, CogVideoModel, CogVideoProvider, Dispatcher, ImageStore,
    VideoGenerationRequest, WanModel, WanProvider,
};

#[derive(Parser)]
#[command(name = "videogen")]
#[command(about = "Generate videos via AI APIs (Ark, Wanxiang, CogVideoX)")]
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
    /// Generate a video from a text prompt
    Generate(GenerateArgs),

    /// List providers configured in the environment
    Providers,
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the video
    prompt: String,

    /// Provider to use
    #[arg(short, long, value_enum, default_value = "ark")]
    provider: ProviderArg,

    /// Source image for image-to-video (path to image file)
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Video duration in seconds (Ark: 5 or 10)
    #[arg(short, long)]
    duration: Option<u32>,

    /// Aspect ratio (e.g., 16:9)
    #[arg(long)]
    ratio: Option<String>,

    /// Output resolution (e.g., 1280*720 for Wan, 1920x1080 for CogVideoX)
    #[arg(long)]
    size: Option<String>,

    /// Frame rate (CogVideoX only)
    #[arg(long)]
    fps: Option<u32>,

    /// Generate an audio track (CogVideoX only)
    #[arg(long)]
    with_audio: bool,

    /// Wanxiang model label or identifier
    #[arg(long)]
    wan_model: Option<String>,

    /// CogVideoX model
    #[arg(long, value_enum, default_value = "cogvideox-2")]
    cog_model: CogModelArg,

    /// CogVideoX quality mode
    #[arg(long, value_enum, default_value = "speed")]
    quality: QualityArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderArg {
    Ark,
    Wan,
    Cogvideo,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CogModelArg {
    #[value(name = "cogvideox-2")]
    CogVideoX2,
    #[value(name = "cogvideox-flash")]
    CogVideoXFlash,
}

impl From<CogModelArg> for CogVideoModel {
    fn from(arg: CogModelArg) -> Self {
        match arg {
            CogModelArg::CogVideoX2 => CogVideoModel::CogVideoX2,
            CogModelArg::CogVideoXFlash => CogVideoModel::CogVideoXFlash,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum QualityArg {
    Speed,
    Quality,
}

impl From<QualityArg> for CogQuality {
    fn from(arg: QualityArg) -> Self {
        match arg {
            QualityArg::Speed => CogQuality::Speed,
            QualityArg::Quality => CogQuality::Quality,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "videogen=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => generate(args, cli.json).await,
        Commands::Providers => list_providers(cli.json),
    }
}

async fn generate(args: GenerateArgs, json_output: bool) -> anyhow::Result<()> {
    let mut request = VideoGenerationRequest::new(&args.prompt);

    if let Some(d) = args.duration {
        request = request.with_duration(d);
    }
    if let Some(ratio) = &args.ratio {
        request = request.with_aspect_ratio(ratio);
    }
    if let Some(size) = &args.size {
        request = request.with_resolution(size);
    }
    if let Some(fps) = args.fps {
        request = request.with_fps(fps);
    }
    if args.with_audio {
        request = request.with_audio(true);
    }

    let mut builder = Dispatcher::builder();
    builder = match args.provider {
        ProviderArg::Ark => builder.provider(ArkProvider::builder().build()?),
        ProviderArg::Wan => {
            let model = args
                .wan_model
                .as_deref()
                .map(WanModel::from_label)
                .unwrap_or_default();
            builder.provider(WanProvider::builder().model(model).build()?)
        }
        ProviderArg::Cogvideo => builder.provider(
            CogVideoProvider::builder()
                .model(args.cog_model.into())
                .quality(args.quality.into())
                .build()?,
        ),
    };
    if args.image.is_some() {
        // Best-effort: whether staging is actually needed depends on the
        // provider's predicate; dispatch reports the missing store only then.
        match ImageStore::builder().build() {
            Ok(store) => builder = builder.store(store),
            Err(e) => tracing::warn!(error = %e, "object storage not configured"),
        }
    }
    let dispatcher = builder.build();

    let kind = match args.provider {
        ProviderArg::Ark => videogen::ProviderKind::Ark,
        ProviderArg::Wan => videogen::ProviderKind::Wan,
        ProviderArg::Cogvideo => videogen::ProviderKind::CogVideo,
    };
    let outcome = dispatcher
        .generate(kind, request, args.image.as_deref())
        .await;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if let Some(url) = &outcome.video_url {
        println!("Generated video: {url}");
    } else {
        eprintln!("Generation failed: {}", outcome.status);
    }

    if outcome.is_success() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn list_providers(json_output: bool) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::from_env();
    let available = dispatcher.available();

    if json_output {
        let names: Vec<String> = available.iter().map(|k| k.to_string()).collect();
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else if available.is_empty() {
        println!("No providers configured. Set ARK_API_KEY, DASHSCOPE_API_KEY or ZHIPUAI_API_KEY.");
    } else {
        for kind in available {
            println!("{kind}");
        }
    }

    Ok(())
}
