use anyhow::Context;
use quotaguard::{
    config::QuotaConfig,
    init_tracing,
    plans::{PlanAction, PlanTier},
    rate_limit::{RateLimitScope, RateLimiterService},
};
use std::env;
use std::process;

const USAGE: &str = "Usage: quotaguard [config_file] <scope> <identifier> [tier]";

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    if let Err(e) = run(args).await {
        eprintln!("quotaguard error: {:#}", e);
        eprintln!("{}", USAGE);
        process::exit(1);
    }
}

async fn run(args: Vec<String>) -> anyhow::Result<()> {
    // A leading YAML path selects the config file
    let (config_path, rest) = match args.first() {
        Some(first) if first.ends_with(".yaml") || first.ends_with(".yml") => {
            (first.clone(), &args[1..])
        }
        _ => ("config/quotaguard.yaml".to_string(), &args[..]),
    };

    let (scope, identifier, tier) = match rest {
        [scope, identifier] => (scope, identifier, None),
        [scope, identifier, tier] => (scope, identifier, Some(PlanTier::from_name(tier))),
        _ => anyhow::bail!("expected a scope and an identifier"),
    };

    let mut config = if std::path::Path::new(&config_path).exists() {
        QuotaConfig::from_file(&config_path)
            .with_context(|| format!("Failed to load configuration from {}", config_path))?
    } else {
        QuotaConfig::default()
    };
    config.apply_env_overrides();

    init_tracing(&config.logging);

    let service = RateLimiterService::from_config(&config)
        .await
        .context("Failed to initialize rate limiter")?;

    let scope = RateLimitScope::from_name(scope)?;
    let decision = match (tier, PlanAction::from_scope(&scope)) {
        (Some(tier), Some(action)) => service.check_plan_action(identifier, tier, action).await?,
        _ => service.check_action(&scope, identifier).await?,
    };

    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}
