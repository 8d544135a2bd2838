//! `convoke budget`: show how the context window resolves for a model.

use convoke_agent::{BudgetWindow, pricing_table};
use convoke_config::AppConfig;

pub fn run(config: &AppConfig, model: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let model = model.unwrap_or(&config.default_model);
    let pricing = pricing_table(config);
    let window = BudgetWindow::resolve(model, &config.runtime, &pricing);

    let source = match config.runtime.context_max_tokens() {
        Some(_) => "config override".to_string(),
        None => match pricing.context_limit(model) {
            0 => "default (model unknown)".to_string(),
            limit => format!("pricing table, {limit} tokens"),
        },
    };

    println!("📐 Context window for {model}");
    println!("─────────────────────────────────────");
    println!("  Ceiling:  {:>8}  ({source})", window.ceiling);
    println!("  Reserve:  {:>8}", window.reserve);
    println!("  Target:   {:>8}", window.target);

    Ok(())
}
