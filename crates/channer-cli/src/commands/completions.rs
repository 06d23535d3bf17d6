use std::io::{self, Write};
use std::path::Path;

use clap::CommandFactory;
use clap_complete::aot::Generator;
use clap_complete::{generate, shells};

use crate::cli::{Cli, CompletionShell};
use crate::error::CliError;

/// Render the completion script for `shell`
pub fn render_completions(shell: CompletionShell) -> Vec<u8> {
    let mut command = Cli::command();
    let bin_name = command.get_name().to_string();
    let mut script = Vec::new();
    match shell {
        CompletionShell::Bash => write_script(shells::Bash, &mut command, &bin_name, &mut script),
        CompletionShell::Zsh => write_script(shells::Zsh, &mut command, &bin_name, &mut script),
        CompletionShell::Fish => write_script(shells::Fish, &mut command, &bin_name, &mut script),
    }
    script
}

pub fn run_completions(shell: CompletionShell, output_path: Option<&Path>) -> Result<(), CliError> {
    let script = render_completions(shell);
    match output_path {
        Some(path) => {
            std::fs::write(path, &script)?;
            println!("Wrote {shell:?} completions to {}", path.display());
        }
        None => io::stdout().write_all(&script)?,
    }
    Ok(())
}

fn write_script<G: Generator>(
    generator: G,
    command: &mut clap::Command,
    bin_name: &str,
    script: &mut Vec<u8>,
) {
    generate(generator, command, bin_name, script);
}
