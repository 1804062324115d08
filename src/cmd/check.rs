use anyhow::{bail, Result};

use rhymesync::{Config, Pipeline};

pub async fn cmd_check(config: Config) -> Result<()> {
    let pipeline = Pipeline::new(config);

    eprintln!("🔍 Checking dependencies");
    let results = pipeline.check_dependencies().await;
    let mut missing = 0;
    for (tool, ok) in &results {
        if *ok {
            eprintln!("   ✅ {tool}");
        } else {
            eprintln!("   ❌ {tool} not found");
            missing += 1;
        }
    }

    if missing > 0 {
        bail!("{missing} required tool(s) missing");
    }
    eprintln!("\nAll dependencies available");
    Ok(())
}
