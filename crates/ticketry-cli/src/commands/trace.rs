//! Trace command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::{info, warn};

use ticketry_trace::{parse_traceparent_header, Sampler, SamplingConfig, TraceContext};

/// Arguments for the trace command.
#[derive(Args)]
pub struct TraceArgs {
    #[command(subcommand)]
    pub action: TraceAction,
}

/// Trace subcommands.
#[derive(Subcommand)]
pub enum TraceAction {
    /// Start a trace and print its traceparent header
    New(NewArgs),

    /// Decode a traceparent header
    Parse(ParseArgs),
}

/// Arguments for `trace new`.
#[derive(Args)]
pub struct NewArgs {
    /// Operation name used for the sampling decision
    #[arg(short, long, default_value = "cli")]
    pub operation: String,

    /// YAML sampling configuration
    #[arg(long, env = "TICKETRY_SAMPLING_CONFIG")]
    pub sampling_config: Option<PathBuf>,

    /// Continue the trace in this traceparent header instead of starting one
    #[arg(long)]
    pub parent: Option<String>,

    /// Print the full context as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `trace parse`.
#[derive(Args)]
pub struct ParseArgs {
    /// traceparent header value
    pub header: String,

    /// Print the context as JSON
    #[arg(long)]
    pub json: bool,
}

/// Runs the trace command.
pub fn run(args: &TraceArgs) -> Result<()> {
    match &args.action {
        TraceAction::New(new) => {
            let ctx = mint(new)?;
            print_context(&ctx, new.json)
        }
        TraceAction::Parse(parse) => {
            let ctx = parse_traceparent_header(&parse.header)
                .with_context(|| format!("Not a valid traceparent header: {}", parse.header))?;
            print_context(&ctx, parse.json)
        }
    }
}

fn load_sampler(path: Option<&PathBuf>) -> Result<Sampler> {
    let Some(path) = path else {
        return Ok(Sampler::always_on());
    };
    info!(path = %path.display(), "Loading sampling configuration");
    let config = SamplingConfig::load(path)?;
    Ok(Sampler::new(config)?)
}

/// Builds the context for `trace new`.
pub fn mint(args: &NewArgs) -> Result<TraceContext> {
    let sampler = load_sampler(args.sampling_config.as_ref())?;

    let parent = args.parent.as_deref().and_then(|header| {
        let parsed = parse_traceparent_header(header);
        if parsed.is_none() {
            warn!(header, "Ignoring malformed parent header, starting a new trace");
        }
        parsed
    });

    let ctx = match parent {
        Some(parent) => sampler.decide(parent.child(), &args.operation),
        None => TraceContext::root_sampled(&sampler, &args.operation),
    };
    Ok(ctx)
}

fn print_context(ctx: &TraceContext, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(ctx)?);
        return Ok(());
    }

    println!("traceparent: {}", ctx.to_traceparent());
    println!("trace_id:    {}", ctx.trace_id());
    println!("span_id:     {}", ctx.span_id());
    if let Some(parent) = ctx.parent_span_id() {
        println!("parent:      {parent}");
    }
    println!("sampled:     {}", ctx.is_sampled());
    Ok(())
}
