//! `finsight init`: First-time setup.

use finsight_config::AppConfig;
use std::path::Path;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();

    println!("FinSight: First-Time Setup");
    println!("===========================\n");

    let created = write_default_config(&config_dir)?;
    let config_path = super::config_path();

    if created {
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Add your API key to {} (or set FINSIGHT_API_KEY)", config_path.display());
        println!("   2. Run: finsight analyze PL_2023.xlsx Notes.pdf --lang en");
        println!("   3. Or:  finsight chat PL_2023.xlsx to edit the report interactively\n");
    } else {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run init.\n");
    }

    Ok(())
}

/// Write `config.toml` under `dir` unless one is already there.
///
/// Returns whether a file was written.
fn write_default_config(dir: &Path) -> std::io::Result<bool> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join("config.toml");
    if path.exists() {
        return Ok(false);
    }
    std::fs::write(&path, AppConfig::default_toml())?;
    Ok(true)
}
