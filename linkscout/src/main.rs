use colored::Colorize;
use commands::command_argument_builder;
use linkscout::handlers::{handle_init, handle_run, init_tracing};
use linkscout_core::run::Mode;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();

    // Global flags propagate down, so the subcommand sees them wherever they were given
    let verbosity = chosen_command
        .subcommand()
        .map(|(_, sub)| sub.get_count("verbose"))
        .unwrap_or_else(|| chosen_command.get_count("verbose"));
    init_tracing(verbosity);

    let outcome = match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command),
        Some((name, primary_command)) => match Mode::from_str(name) {
            Some(mode) => handle_run(mode, primary_command).await,
            None => unreachable!("clap should ensure we don't get here"),
        },
        None => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = outcome {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
