//! sp-fieldlinks — 将字段链接批量添加到内容类型
//!
//! Usage:
//!   sp-fieldlinks <content-type-id> <internal-name>[:display-name]...
//!
//! Configuration comes from the environment (`SP_MODEL_BASE_URL`,
//! `SP_MODEL_ACCESS_TOKEN`, `SP_MODEL_HTTP_TIMEOUT_SECS`,
//! `SP_MODEL_DUPLICATE_POLICY`); log verbosity from `RUST_LOG`.

use anyhow::{bail, Context};
use sp_model::model::FieldLinkOptions;
use sp_model::{ClientContext, ContextConfig};
use tracing_subscriber::EnvFilter;

fn print_usage() {
    println!(
        r#"sp-fieldlinks — add field links to a content type in one batch

USAGE:
    sp-fieldlinks <content-type-id> <internal-name>[:display-name]...

ENVIRONMENT:
    SP_MODEL_BASE_URL           Site url (required)
    SP_MODEL_ACCESS_TOKEN       Bearer token
    SP_MODEL_HTTP_TIMEOUT_SECS  HTTP timeout (default 30)
    SP_MODEL_DUPLICATE_POLICY   reject | allow (default reject)
    RUST_LOG                    Log filter (e.g. sp_model=debug)"#
    );
}

fn parse_link(arg: &str) -> (String, FieldLinkOptions) {
    match arg.split_once(':') {
        Some((name, display)) if !display.is_empty() => {
            (name.to_string(), FieldLinkOptions::new().display_name(display))
        }
        Some((name, _)) => (name.to_string(), FieldLinkOptions::new()),
        None => (arg.to_string(), FieldLinkOptions::new()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return Ok(());
    }
    if args.len() < 2 {
        print_usage();
        bail!("expected a content type id and at least one field");
    }

    let ctx = ClientContext::builder()
        .config(ContextConfig::from_env())
        .build()
        .context("building client context")?;
    let content_type = ctx.content_type(args[0].as_str());

    for arg in &args[1..] {
        let (name, options) = parse_link(arg);
        content_type
            .field_links()
            .add_batch_current(name.as_str(), options)
            .with_context(|| format!("queueing field link '{}'", name))?;
    }

    let result = ctx.execute_current().await.context("executing batch")?;
    for entry in &result.entries {
        let name = entry.key.as_deref().unwrap_or("?");
        match &entry.outcome {
            Ok(id) => println!("ok      {:<32} {}", name, id),
            Err(failure) => println!("failed  {:<32} {}", name, failure),
        }
    }

    if !result.all_succeeded() {
        bail!(
            "{} of {} field links failed",
            result.failure_count(),
            result.len()
        );
    }
    Ok(())
}
