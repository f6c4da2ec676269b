use std::path::Path;

use anyhow::Result;

use crate::{
    infra::{self, config::FileConfigAdapter, contracts::ConfigAdapter},
    usecases::context::AppContext,
};

pub fn bootstrap(config_path: Option<&Path>) -> Result<AppContext> {
    let context = build_context(&FileConfigAdapter::new(config_path))?;
    let guard = infra::logging::init(&context.config.logging)?;

    Ok(context.with_log_guard(guard))
}

fn build_context(adapter: &dyn ConfigAdapter) -> Result<AppContext> {
    let config = adapter.load()?;

    Ok(AppContext::new(config))
}
