//! `buildchain plan` command

use anyhow::{Context, Result};

use crate::cli::{PlanArgs, PlanFormat};
use buildchain::ops::plan;
use buildchain::util::shell::Shell;

pub fn execute(args: PlanArgs, shell: &Shell) -> Result<()> {
    let opts = args.target.into_options();
    let plan = plan(&opts, shell)?;

    match args.format {
        PlanFormat::Json => {
            let json = serde_json::to_string_pretty(&plan).context("failed to serialize plan")?;
            println!("{}", json);
        }
        PlanFormat::Text => {
            println!("Build plan for {} ({}):", plan.target, plan.libc);
            for (i, step) in plan.steps.iter().enumerate() {
                println!("{:>4}. {:<40} [{}]", i + 1, step.name, step.stage);
                if shell.is_verbose() && !step.deps.is_empty() {
                    println!("        after: {}", step.deps.join(", "));
                }
            }
            println!("default: {}", plan.defaults.join(" "));
        }
    }

    Ok(())
}
