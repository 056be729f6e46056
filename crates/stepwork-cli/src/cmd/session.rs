use crate::output::{print_json, print_table, truncate};
use clap::Subcommand;
use std::path::Path;
use stepwork_core::session::StepSession;
use stepwork_core::walker::Analytics;

#[derive(Subcommand)]
pub enum SessionSubcommand {
    /// List stored sessions, oldest first
    List {
        /// Only sessions for this user id
        #[arg(long)]
        user: Option<String>,
    },
    /// Show one session and its conversation
    Show { id: String },
}

pub fn run(root: &Path, subcommand: SessionSubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        SessionSubcommand::List { user } => list(root, user.as_deref(), json),
        SessionSubcommand::Show { id } => show(root, &id, json),
    }
}

fn list(root: &Path, user: Option<&str>, json: bool) -> anyhow::Result<()> {
    let sessions: Vec<StepSession> = StepSession::list(root)?
        .into_iter()
        .filter(|s| user.map_or(true, |u| s.is_owned_by(u)))
        .collect();

    if json {
        return print_json(&sessions);
    }
    if sessions.is_empty() {
        println!("No sessions.");
        return Ok(());
    }

    let rows = sessions
        .iter()
        .map(|s| {
            let a = Analytics::from_history(&s.step_responses);
            vec![
                s.id.clone(),
                s.user_id.clone(),
                s.current_step.to_string(),
                if s.is_complete { "complete" } else { "open" }.to_string(),
                a.questions_completed.to_string(),
                s.updated_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "USER", "STEP", "STATUS", "ANSWERS", "UPDATED"], rows);
    Ok(())
}

fn show(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let session = StepSession::load(root, id)?;
    if json {
        return print_json(&session);
    }

    let a = Analytics::from_history(&session.step_responses);
    println!("Session:  {}", session.id);
    println!("User:     {}", session.user_id);
    println!("Step:     {}", session.current_step);
    println!(
        "Status:   {}",
        if session.is_complete { "complete" } else { "open" }
    );
    if let Some(mood) = &session.mood {
        println!("Mood:     {mood}");
    }
    if let Some(intention) = &session.intention {
        println!("Intent:   {intention}");
    }
    println!(
        "Answers:  {} ({} vague, {} breakthrough, {} safety)",
        a.questions_completed, a.red_flags_encountered, a.breakthrough_moments, a.safety_concerns
    );

    for (i, turn) in session.step_responses.iter().enumerate() {
        let c = &turn.classification;
        let mut marks = Vec::new();
        if c.red_flag {
            marks.push("vague");
        }
        if c.breakthrough {
            marks.push("breakthrough");
        }
        if c.safety_concern {
            marks.push("SAFETY");
        }
        let marks = if marks.is_empty() {
            String::new()
        } else {
            format!(" [{}]", marks.join(", "))
        };
        println!("\n{}. {}{marks}", i + 1, turn.question_id);
        println!("   Q: {}", truncate(&turn.question_text, 100));
        println!("   A: {}", turn.answer_text);
    }
    Ok(())
}
