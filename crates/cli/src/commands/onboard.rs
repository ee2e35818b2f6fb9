//! `juliet onboard` — First-time setup.

use juliet_config::AppConfig;
use juliet_core::instructions::Instructions;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Juliet — First-Time Setup");
    println!("=========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("  Config already exists at: {}", config_path.display());
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("Created config.toml at: {}", config_path.display());
    }

    let config = AppConfig::load_from(&config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    let instructions_path = config.instructions_path();
    if instructions_path.exists() {
        println!("  Instructions already exist at: {}", instructions_path.display());
    } else {
        if let Some(parent) = instructions_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&instructions_path, Instructions::default().to_toml())?;
        println!("Created instructions at: {}", instructions_path.display());
    }

    let data_dir = config.user_data_dir();
    std::fs::create_dir_all(&data_dir)?;
    println!("  Memory directory: {}", data_dir.display());

    println!("\nNext steps:");
    println!("   1. Set JULIET_API_KEY (or add provider.api_key to {})", config_path.display());
    println!("   2. Edit {} to shape the assistant", instructions_path.display());
    println!("   3. Run: juliet chat\n");

    Ok(())
}
