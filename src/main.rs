use anyhow::{Context, Result};

use canopia::core::CanopyPipeline;
use canopia::platform::RestPlatform;
use canopia::Config;

fn main() -> Result<()> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "canopia.json".to_string());
    let config = Config::from_file(&path).with_context(|| format!("failed to load {}", path))?;

    let platform_config = config
        .platform
        .as_ref()
        .context("config has no platform section")?;
    let platform = RestPlatform::new(&platform_config.endpoint, &platform_config.token)?;

    let pipeline = CanopyPipeline::new(&platform);
    let job = pipeline
        .run(&config.workflow)
        .context("export workflow failed")?;

    println!("submitted export job {} ({})", job.id, job.description);
    println!("poll the platform's job-status channel for completion");
    Ok(())
}
