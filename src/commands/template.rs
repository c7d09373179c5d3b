use std::fs;

use anyhow::Result;
use colored::Colorize;

use crate::cli::TemplateCmd;
use crate::models::WorkoutTemplate;
use crate::session::timer;

pub async fn handle(cmd: TemplateCmd, json: bool) -> Result<()> {
    match cmd {
        TemplateCmd::Show { file } => {
            let raw = match fs::read_to_string(&file) {
                Ok(raw) => raw,
                Err(err) => {
                    println!(
                        "{} could not read template `{}`: {}",
                        "error:".red().bold(),
                        file,
                        err
                    );
                    return Ok(());
                }
            };
            let template: WorkoutTemplate = match toml::from_str(&raw) {
                Ok(template) => template,
                Err(err) => {
                    println!(
                        "{} invalid template `{}`: {}",
                        "error:".red().bold(),
                        file,
                        err
                    );
                    return Ok(());
                }
            };

            if template.exercises_list.is_empty() {
                println!(
                    "{} template `{}` has no exercises; a session cannot start from it",
                    "warning:".yellow().bold(),
                    template.name
                );
                return Ok(());
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&template)?);
                return Ok(());
            }

            println!(
                "{} {} (workout id {})",
                "Template:".cyan().bold(),
                template.name.bold(),
                template.id
            );
            for (i, exercise) in template.exercises_list.iter().enumerate() {
                let idx = format!("{}", i + 1).yellow();
                let sets = exercise.sets.filter(|&s| s > 0).unwrap_or(3);
                let reps = format!(
                    "{}-{}",
                    exercise.min_reps.unwrap_or(8),
                    exercise.max_reps.unwrap_or(12)
                );
                let rest = timer::format_remaining(exercise.rest_seconds.unwrap_or(120));
                println!(
                    "{} • {} — {} sets, {} reps, rest {}",
                    idx,
                    exercise.exercise_name.bold(),
                    sets,
                    reps,
                    rest
                );
                if let Some(observations) = &exercise.observations {
                    println!("    {}", observations.dimmed());
                }
            }

            Ok(())
        }
    }
}
