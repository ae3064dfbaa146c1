//! CLI `data-info` command: list loaded datasets with their counts and fields.

use anyhow::Result;

use embedviz::config::EmbedVizConfig;
use embedviz::dataset::loader::load_catalog;

pub fn data_info(config: &EmbedVizConfig) -> Result<()> {
    let catalog = load_catalog(config);
    let datasets = catalog.describe();

    if datasets.is_empty() {
        println!("No datasets found.");
        println!("Data directory: {}", config.resolved_data_dir().display());
        return Ok(());
    }

    println!("Available Datasets");
    println!("{}", "=".repeat(40));
    for info in &datasets {
        println!();
        println!("  {} ({})", info.data_type, info.origin);
        println!("    Records:         {}", info.count);
        println!("    Fields:          {}", info.fields.join(", "));
        println!(
            "    Default fields:  text={} title={}",
            info.default_fields.text, info.default_fields.title
        );
    }

    Ok(())
}
