use anyhow::Result;
use clap::{Parser, Subcommand};
use facebridge_core::{ImageArg, ModelGate};
use facebridged::{Config, Gateway, Request};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "facebridge", about = "Run facebridge requests from the command line")]
struct Cli {
    /// Directory containing det_10g.onnx and w600k_r50.onnx (overrides FACEBRIDGE_MODEL_DIR)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a query face against reference images
    Match {
        /// Query image (path, file:// or http(s) URL, data URI)
        #[arg(short, long)]
        query: String,
        /// Reference images, in order
        #[arg(short, long, num_args = 1.., required = true)]
        training: Vec<String>,
    },
    /// Detect the face in one or more images
    Detect {
        #[arg(required = true)]
        images: Vec<String>,
        /// Always answer with a list, even for a single image
        #[arg(long)]
        batch: bool,
    },
}

impl Commands {
    fn into_request(self) -> Request {
        match self {
            Commands::Match { query, training } => Request::MatchFace {
                query_image: query,
                training_images: training,
            },
            Commands::Detect { mut images, batch } => {
                let query_image = if images.len() == 1 && !batch {
                    ImageArg::Single(images.remove(0))
                } else {
                    ImageArg::Batch(images)
                };
                Request::DetectFace { query_image }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(dir) = cli.model_dir {
        config.model_dir = dir;
    }

    let gateway = Gateway::new(Arc::new(ModelGate::new(config.loader())), None);
    let response = gateway.dispatch(cli.command.into_request()).await;

    println!("{}", serde_json::to_string_pretty(&response)?);
    if response.is_error {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_detect_is_single_mode() {
        let cli = Cli::parse_from(["facebridge", "detect", "a.jpg"]);
        assert_eq!(
            cli.command.into_request(),
            Request::DetectFace { query_image: ImageArg::Single("a.jpg".into()) }
        );
    }

    #[test]
    fn test_batch_flag_forces_list() {
        let cli = Cli::parse_from(["facebridge", "detect", "--batch", "a.jpg"]);
        assert_eq!(
            cli.command.into_request(),
            Request::DetectFace { query_image: ImageArg::Batch(vec!["a.jpg".into()]) }
        );
    }

    #[test]
    fn test_match_request() {
        let cli = Cli::parse_from([
            "facebridge", "--model-dir", "/m", "match", "-q", "q.jpg", "-t", "a.jpg", "b.jpg",
        ]);
        assert_eq!(cli.model_dir, Some(PathBuf::from("/m")));
        assert_eq!(
            cli.command.into_request(),
            Request::MatchFace {
                query_image: "q.jpg".into(),
                training_images: vec!["a.jpg".into(), "b.jpg".into()],
            }
        );
    }
}
