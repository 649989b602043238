use anyhow::{bail, Context as _};
use env_logger::Env;
use page_structurer::{
    configuration::get_configuration,
    dal::ContextStore,
    services::{Droid, OpenaiClient, PageExtractor, Pipeline, PipelineConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().context("Failed to read configuration.")?;
    let sources = configuration
        .validate()
        .context("Invalid configuration.")?;
    if configuration.structuring.api_key.trim().is_empty() {
        bail!("structuring.api_key is empty, set APP_STRUCTURING__API_KEY");
    }

    let store = ContextStore::new(&configuration.store.path);
    let mut context = store.load();

    let pipeline = Pipeline::new(
        PipelineConfig {
            sources,
            on_structuring_failure: configuration.pipeline.on_structuring_failure,
        },
        OpenaiClient::new(&configuration.structuring),
        store,
    );

    let droid = Droid::new(&configuration.browser)
        .await
        .context("Failed to start browser session.")?;
    let mut extractor = PageExtractor::new(droid, &configuration.browser);

    let summary = pipeline
        .run_and_close(&mut extractor, &mut context)
        .await
        .context("Run aborted.")?;
    for (name, outcome) in &summary.outcomes {
        log::info!("{}: {:?}", name, outcome);
    }

    Ok(())
}
