//! `buildchain configure` command

use anyhow::Result;

use crate::cli::ConfigureArgs;
use buildchain::ops::configure;
use buildchain::util::shell::{format_duration, Shell, Status};

pub fn execute(args: ConfigureArgs, shell: &Shell) -> Result<()> {
    let mut opts = args.target.into_options();
    opts.output = args.output;

    shell.status(Status::Checking, format!("toolchain for {}", opts.target));

    let result = configure(&opts, shell)?;

    if result.fresh {
        shell.status(
            Status::Fresh,
            format!("{} is up to date", result.path.display()),
        );
    } else {
        shell.status(Status::Writing, result.path.display());
    }

    if !shell.is_quiet() {
        println!("Dependencies:");
        for (name, version) in &result.dependencies {
            println!("{:>12} {}", name, version);
        }
    }

    shell.status(
        Status::Finished,
        format!(
            "{} build steps in {}",
            result.steps,
            format_duration(result.duration)
        ),
    );

    Ok(())
}
