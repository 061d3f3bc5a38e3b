use anyhow::Result;

use podclaw::config::config_path;
use podclaw::voice::presets;
use podclaw::Settings;

pub fn cmd_voices() -> Result<()> {
    let settings = Settings::load()?;

    println!("🎤 Built-in voices:\n");
    for (key, profile) in presets() {
        println!(
            "  {key:<10} {:<22} {}",
            profile.external_voice_id, profile.description
        );
    }

    if !settings.voices.custom.is_empty() {
        println!("\n🎛️  Custom voices ({}):\n", config_path().display());
        for (key, profile) in &settings.voices.custom {
            println!("  {key:<10} {:<22} {}", profile.external_voice_id, profile.name);
        }
    }

    println!("\nDefault pool: {}", settings.voices.pool.join(", "));
    println!("Any other name is sent to the service as a raw voice id.");
    Ok(())
}
