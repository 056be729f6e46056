use anyhow::{anyhow, bail};
use std::path::Path;
use stepwork_core::config::Config;

/// Print a bearer token for `user_id`, for local testing against `serve`.
pub fn run(root: &Path, user_id: &str) -> anyhow::Result<()> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        bail!("user id must not be empty");
    }
    let config = Config::load(root)?;
    let secret = config.auth.resolve_secret().ok_or_else(|| {
        anyhow!(
            "{} is not set; export the signing secret first",
            config.auth.secret_env
        )
    })?;
    println!("{}", stepwork_server::auth::sign_token(&secret, user_id));
    Ok(())
}
