//! `convoke pricing`: list model prices and context limits.

use convoke_agent::pricing_table;
use convoke_config::AppConfig;

pub fn run(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let table = pricing_table(config);
    let models = table.models();

    println!("💰 Model Pricing (per 1M tokens)");
    println!("──────────────────────────────────────────────────────────────");
    println!("{:<36} {:>10} {:>10} {:>10}", "Model", "Input", "Output", "Context");
    println!("{:<36} {:>10} {:>10} {:>10}", "─────", "─────", "──────", "───────");

    for name in &models {
        if let Some(p) = table.get(name) {
            println!(
                "{:<36} ${:>8.3} ${:>8.3} {:>10}",
                name, p.input_per_m, p.output_per_m, p.context_limit
            );
        }
    }

    println!();
    println!("  {} models with pricing data", models.len());

    Ok(())
}
