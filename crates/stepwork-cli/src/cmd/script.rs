use crate::output::{print_json, print_table, truncate};
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;
use stepwork_core::config::{Config, WarnLevel};
use stepwork_core::question::PresentedQuestion;
use stepwork_core::script::QuestionScript;
use stepwork_core::types::Step;

#[derive(Subcommand)]
pub enum ScriptSubcommand {
    /// List the active questions for a step, in order
    Show {
        /// Step number (1-3)
        #[arg(long)]
        step: u8,
    },
    /// Validate the script and config, then summarize them
    Check,
}

pub fn run(root: &Path, subcommand: ScriptSubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        ScriptSubcommand::Show { step } => show(root, step, json),
        ScriptSubcommand::Check => check(root, json),
    }
}

fn load(root: &Path) -> anyhow::Result<QuestionScript> {
    QuestionScript::load(root).context("failed to load question script")
}

fn show(root: &Path, step: u8, json: bool) -> anyhow::Result<()> {
    let script = load(root)?;
    let questions = script.questions_for_step_number(step)?;

    if json {
        let list: Vec<PresentedQuestion> = questions
            .into_iter()
            .map(PresentedQuestion::scripted)
            .collect();
        return print_json(&list);
    }

    if questions.is_empty() {
        println!("No active questions for step {step}.");
        return Ok(());
    }

    let rows = questions
        .iter()
        .map(|q| {
            let mut flags = Vec::new();
            if !q.is_required {
                flags.push("optional");
            }
            if q.safety_flag {
                flags.push("safety");
            }
            if q.completion_marker {
                flags.push("completes");
            }
            if !q.conditional_follow_ups.is_empty() {
                flags.push("branches");
            }
            vec![
                q.order.to_string(),
                q.id.clone(),
                q.phase.clone(),
                q.question_type.to_string(),
                flags.join(","),
                truncate(&q.text, 60),
            ]
        })
        .collect();
    print_table(&["ORDER", "ID", "PHASE", "TYPE", "FLAGS", "TEXT"], rows);
    Ok(())
}

fn check(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let script = load(root)?;
    let warnings = config.validate();

    let counts: Vec<(Step, usize)> = Step::all()
        .iter()
        .map(|&s| (s, script.questions_for_step(s).len()))
        .collect();

    if json {
        let steps: serde_json::Map<String, serde_json::Value> = counts
            .iter()
            .map(|(s, n)| (s.to_string(), serde_json::json!(n)))
            .collect();
        print_json(&serde_json::json!({
            "questions": script.len(),
            "activeByStep": steps,
            "warnings": warnings,
        }))?;
    } else {
        println!("Script OK: {} questions", script.len());
        for (step, n) in &counts {
            println!("  {step}: {n} active");
        }
        for w in &warnings {
            let label = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("  {label}: {}", w.message);
        }
    }

    if let Some((step, _)) = counts.iter().find(|(_, n)| *n == 0) {
        anyhow::bail!("{step} has no active questions");
    }
    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config has errors");
    }
    Ok(())
}
