//! tandem CLI - dual-model speculative decoding.
//!
//! ## Usage
//!
//! ```bash
//! # Both models in one process
//! tandem duo -m corpus.txt --draft-model small.txt -p "Hello"
//!
//! # Target node serving /messages and /hint
//! tandem lead -m corpus.txt --port 5555
//!
//! # Remote drafter polling a lead
//! tandem back -m small.txt --host lead-host --port 5555 --n-ahead 16
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use tandem::config::{RuntimeConfig, ServerConfig, SpeculationConfig};
use tandem::core::Coordinator;
use tandem::engine::{DraftEngine, HttpHintTransport, RemoteDrafter, TargetEngine};
use tandem::model::{ByteCodec, LanguageModel, NgramLm, TextCodec};
use tandem::server::{self, LeadNode};

/// tandem: dual-model speculative decoding
#[derive(Parser, Debug)]
#[command(name = "tandem")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Model-runtime flags shared by every variant.
#[derive(Args, Debug)]
struct RuntimeArgs {
    /// Model path (corpus file for the built-in n-gram backend)
    #[arg(short, long)]
    model: PathBuf,

    /// Batch size: maximum positions per decode call
    #[arg(short = 'b', long, default_value_t = 512)]
    batch_size: usize,

    /// Context size in tokens
    #[arg(short = 'c', long, default_value_t = 4096)]
    n_ctx: usize,

    /// CPU threads for evaluation
    #[arg(short = 't', long, default_value_t = 16)]
    threads: usize,

    /// Layers to offload to the GPU
    #[arg(long, default_value_t = 0)]
    n_gpu_layers: usize,
}

impl RuntimeArgs {
    fn runtime(&self) -> RuntimeConfig {
        RuntimeConfig {
            n_batch: self.batch_size,
            n_ctx: self.n_ctx,
            n_threads: self.threads,
            n_gpu_layers: self.n_gpu_layers,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run drafter and target as peer threads in one process
    Duo {
        #[command(flatten)]
        runtime: RuntimeArgs,

        /// Draft model path
        #[arg(long)]
        draft_model: PathBuf,

        /// Layers of the draft model to offload to the GPU
        #[arg(long, default_value_t = 0)]
        draft_gpu_layers: usize,

        /// Input prompt
        #[arg(short, long)]
        prompt: String,

        /// Maximum tokens to generate
        #[arg(long, default_value_t = 256)]
        max_tokens: usize,

        /// Tokens the drafter extends per turn
        #[arg(long, default_value_t = 5)]
        n_draft: usize,
    },

    /// Serve the target model: /messages for clients, /hint for drafters
    Lead {
        #[command(flatten)]
        runtime: RuntimeArgs,

        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value_t = 5555)]
        port: u16,
    },

    /// Run the remote drafter against a lead node
    Back {
        #[command(flatten)]
        runtime: RuntimeArgs,

        /// Lead host to connect to
        #[arg(long, default_value = "localhost")]
        host: String,

        /// Lead port to connect to
        #[arg(short, long, default_value_t = 5555)]
        port: u16,

        /// Maximum speculative lead over the approved frontier
        #[arg(long, default_value_t = 16)]
        n_ahead: usize,

        /// Tokens to extend per hint round
        #[arg(long, default_value_t = 5)]
        n_draft: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Duo {
            runtime,
            draft_model,
            draft_gpu_layers,
            prompt,
            max_tokens,
            n_draft,
        } => run_duo(
            runtime,
            draft_model,
            draft_gpu_layers,
            &prompt,
            max_tokens,
            n_draft,
        ),
        Command::Lead {
            runtime,
            host,
            port,
        } => run_lead(runtime, ServerConfig { host, port }),
        Command::Back {
            runtime,
            host,
            port,
            n_ahead,
            n_draft,
        } => run_back(runtime, ServerConfig { host, port }, n_ahead, n_draft),
    }
}

fn run_duo(
    args: RuntimeArgs,
    draft_model_path: PathBuf,
    draft_gpu_layers: usize,
    prompt: &str,
    max_tokens: usize,
    n_draft: usize,
) -> anyhow::Result<()> {
    let target_model = NgramLm::open(&args.model, NgramLm::DEFAULT_ORDER)?;
    let draft_model = NgramLm::open(&draft_model_path, NgramLm::DEFAULT_ORDER)?;
    let runtime = args.runtime();
    let draft_runtime = RuntimeConfig {
        n_gpu_layers: draft_gpu_layers,
        ..runtime.clone()
    };
    let spec = SpeculationConfig {
        n_draft,
        ..Default::default()
    };

    let codec = ByteCodec;
    let prompt_tokens = codec.encode(prompt);
    let coordinator = Arc::new(Coordinator::new(prompt_tokens.clone()));

    let drafter = std::thread::spawn({
        let coordinator = Arc::clone(&coordinator);
        let prompt_tokens = prompt_tokens.clone();
        move || DraftEngine::new(draft_model, draft_runtime, spec).run(&prompt_tokens, &coordinator)
    });

    print!("{prompt}");
    let _ = std::io::stdout().flush();
    let mut engine = TargetEngine::new(target_model, runtime);
    let output = engine.run(&prompt_tokens, max_tokens, &*coordinator, &mut |tokens| {
        print!("{}", codec.decode(tokens));
        let _ = std::io::stdout().flush();
    })?;
    println!();
    info!(n_generated = output.len(), "generation complete");

    drafter
        .join()
        .map_err(|_| anyhow::anyhow!("drafter thread panicked"))??;
    Ok(())
}

fn run_lead(args: RuntimeArgs, endpoint: ServerConfig) -> anyhow::Result<()> {
    let model = NgramLm::open(&args.model, NgramLm::DEFAULT_ORDER)?;
    let engine = TargetEngine::new(Box::new(model) as Box<dyn LanguageModel>, args.runtime());
    let node = LeadNode::new(engine, Arc::new(ByteCodec));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let listener =
            tokio::net::TcpListener::bind((endpoint.host.as_str(), endpoint.port)).await?;
        info!(host = %endpoint.host, port = endpoint.port, "lead listening");
        axum::serve(listener, server::router(node)).await?;
        anyhow::Ok(())
    })
}

fn run_back(
    args: RuntimeArgs,
    endpoint: ServerConfig,
    n_ahead: usize,
    n_draft: usize,
) -> anyhow::Result<()> {
    let model = NgramLm::open(&args.model, NgramLm::DEFAULT_ORDER)?;
    let transport = HttpHintTransport::new(&endpoint.host, endpoint.port)?;
    let spec = SpeculationConfig {
        n_draft,
        n_ahead,
        ..Default::default()
    };
    info!(host = %endpoint.host, port = endpoint.port, n_ahead, "remote drafter starting");
    RemoteDrafter::new(model, transport, args.runtime(), spec).run()?;
    Ok(())
}
