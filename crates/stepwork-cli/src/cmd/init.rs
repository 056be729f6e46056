use anyhow::Context;
use std::path::Path;
use stepwork_core::{config::Config, io, paths, script::QuestionScript};

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing stepwork in: {}", root.display());

    for dir in [paths::STEPWORK_DIR, paths::SESSIONS_DIR] {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    if paths::config_path(root).exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
    } else {
        Config::default()
            .save(root)
            .context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
    }

    let created = io::write_if_missing(
        &paths::script_path(root),
        QuestionScript::builtin_yaml().as_bytes(),
    )
    .context("failed to write script.yaml")?;
    if created {
        println!("  created: {}", paths::SCRIPT_FILE);
    } else {
        println!("  exists:  {}", paths::SCRIPT_FILE);
    }

    let config = Config::load(root)?;
    if config.auth.resolve_secret().is_none() {
        println!(
            "\nSet {} before running `stepwork serve`; without it every API call is rejected.",
            config.auth.secret_env
        );
    }
    Ok(())
}
