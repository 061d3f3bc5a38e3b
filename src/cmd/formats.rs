use podclaw::EpisodeFormat;

pub fn cmd_formats() {
    println!("📻 Episode formats:\n");
    for format in EpisodeFormat::ALL {
        println!("  {:<14} {}", format.name(), format.description());
        println!("  {:<14} tags: {}", "", format.roles().join(", "));
    }
}
