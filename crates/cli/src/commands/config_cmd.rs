//! `convoke config`: configuration commands.

use convoke_config::AppConfig;

pub fn validate(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Configuration");
    println!("   ✅ Config parsed successfully");

    let runtime = &config.runtime;
    let mut warnings = Vec::new();
    if config.telemetry.budget_tokens == 0 && config.telemetry.budget_usd == 0.0 && runtime.stop_on_budget() {
        warnings.push("stop_on_budget is set but no budget is configured");
    }
    if runtime.history_compact_after() > 0 && runtime.history_keep() >= runtime.history_compact_after() {
        warnings.push("history_keep is not below history_compact_after; compaction never triggers");
    }
    if !config.agent.error_handling.treat_errors_as_results && config.agent.error_handling.max_error_retries > 0 {
        warnings.push("max_error_retries has no effect while tool errors abort the turn");
    }

    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    println!();
    println!("   Model:            {}", config.default_model);
    println!(
        "   Prompt:           {}",
        if config.agent.prompt.as_deref().is_some_and(|p| !p.trim().is_empty()) {
            "custom"
        } else {
            "default"
        }
    );
    println!(
        "   Max iterations:   {}",
        runtime
            .max_iterations()
            .map_or_else(|| "unbounded".to_string(), |n| n.to_string())
    );
    println!("   Output reserve:   {}", runtime.context_reserve_output());
    println!("   Plan follow-up:   {}", runtime.plan_heuristic());
    println!("   Stop on budget:   {}", runtime.stop_on_budget());

    Ok(())
}

pub fn show(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

pub fn path() {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
}
