//! `campusfetch get`

use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::{CommandContext, GetArgs, GlobalOptions, OutputFormat};
use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::fetch::{FetchOptions, Query};

/// Query name shared by every `get`; the path and params are its dependencies
const QUERY_NAME: &str = "get";

/// Fetch `args.path` through the cache and print the JSON.
pub async fn run(globals: &GlobalOptions, args: GetArgs) -> Result<()> {
    let ctx = CommandContext::new(globals)?;
    let client = Arc::new(ApiClient::new(
        ctx.config.base_url()?,
        ctx.config.api.token.clone(),
    )?);

    let options = options_for(ctx.config.fetch_options(), &args, ctx.no_cache);
    // A spawned refetch would not outlive the process: revalidate in the foreground
    let revalidate = options.refetch_on_mount && options.use_cache && !args.refresh;
    let fetch_ctx = ctx.fetch_context()?;
    let query = Query::new(
        fetch_ctx.clone(),
        QUERY_NAME,
        dependencies(&args),
        client.operation(&args.path, args.params.clone()),
        options.with_refetch_on_mount(false),
    );

    if args.refresh {
        let data = query
            .refresh()
            .await
            .map_err(|e| Error::Query(e.message()))?;
        return print_data(&data, ctx.format);
    }

    let cached = revalidate && fetch_ctx.store.get(&query.key()).await.is_some();
    query.mount().await;

    let state = query.state();
    if let Some(message) = state.error {
        return Err(Error::Query(message));
    }
    print_data(&state.data.unwrap_or(Value::Null), ctx.format)?;

    if cached && let Err(e) = query.refresh().await {
        log::warn!("Revalidation of {} failed: {}", query.key(), e);
    }
    Ok(())
}

/// Apply per-invocation overrides to the configured defaults
fn options_for(base: FetchOptions, args: &GetArgs, no_cache: bool) -> FetchOptions {
    let mut options = base;
    if let Some(ttl) = args.ttl {
        options = options.with_cache_duration(Duration::from_secs(ttl));
    }
    if let Some(timeout) = args.timeout {
        options = options.with_timeout(Duration::from_secs(timeout));
    }
    if no_cache {
        options = options.with_cache(false);
    }
    options
}

/// Path plus sorted `[key, value]` pairs: order-insensitive, repeats kept
fn dependencies(args: &GetArgs) -> Vec<Value> {
    let mut pairs = args.params.clone();
    pairs.sort();

    let params: Vec<Value> = pairs.into_iter().map(|(k, v)| json!([k, v])).collect();
    vec![json!(args.path), Value::Array(params)]
}

fn print_data(data: &Value, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(data)?),
        OutputFormat::Pretty => println!("{}", serde_json::to_string_pretty(data)?),
    }
    Ok(())
}
