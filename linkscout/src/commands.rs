use crate::CLAP_STYLING;
use clap::{Arg, ArgAction, arg, command};
use std::path::PathBuf;

/// Target selection and output flags shared by every run subcommand.
fn run_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!([DOMAINS] ...)
            .required(false)
            .help("Target domains or URLs (www. and scheme are stripped)"),
    )
    .arg(
        arg!(-d --"domains-file" <PATH>)
            .required(false)
            .help("Path to a newline-delimited file of target domains")
            .value_parser(clap::value_parser!(PathBuf)),
    )
    .arg(
        arg!(-f --"format" <FORMAT>)
            .required(false)
            .help("Report format: text, json")
            .value_parser(["text", "json"])
            .default_value("text"),
    )
    .arg(
        arg!(-o --"output" <PATH>)
            .required(false)
            .help("Save report to file (default: display to screen)")
            .value_parser(clap::value_parser!(PathBuf)),
    )
}

fn usize_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_name("N")
        .required(false)
        .help(help)
        .value_parser(clap::value_parser!(usize))
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("linkscout")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("linkscout")
        .about("Relationship discovery over backlink graphs and entity co-occurrence")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress the progress spinner")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Increase log verbosity (-v info, -vv debug)")
                .action(ArgAction::Count)
                .global(true),
        )
        .arg(
            arg!(-c --"config" <PATH>)
                .required(false)
                .global(true)
                .help("Configuration file (default: ~/.config/linkscout/config.json)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .subcommand_required(true)
        .subcommand(
            command!("init")
                .about("Writes a default configuration file")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Where to write the configuration")
                        .default_value("~/.config/linkscout/config.json"),
                )
                .arg(
                    arg!(--"force")
                        .help("Overwrite an existing configuration without asking")
                        .required(false),
                ),
        )
        .subcommand(
            run_args(command!("search"))
                .about(
                    "Extract people and organizations from each domain and search for pages \
                where they appear together",
                )
                .arg(usize_arg("top-k", "Number of ranked URLs to keep per domain"))
                .arg(usize_arg(
                    "max-per-tier",
                    "Upper bound on combinations per size tier when sampling",
                ))
                .arg(
                    arg!(--"min-confidence" <SCORE>)
                        .required(false)
                        .help("Drop extracted entities below this confidence (0.0-1.0)")
                        .value_parser(clap::value_parser!(f32)),
                ),
        )
        .subcommand(
            run_args(command!("similar"))
                .about("Find domains linked by the same referrers as the target")
                .arg(usize_arg("min-shared", "Minimum number of shared referrers"))
                .arg(usize_arg("max-referrers", "Referrers of the target to examine"))
                .arg(usize_arg(
                    "max-outlinks",
                    "Outlinks to examine per referrer",
                )),
        )
        .subcommand(
            run_args(command!("colinked"))
                .about("Find domains co-promoted with the target by the same referrers")
                .arg(usize_arg("min-shared", "Minimum number of shared referrers"))
                .arg(usize_arg("max-referrers", "Referrers of the target to examine"))
                .arg(usize_arg(
                    "max-outlinks",
                    "Outlinks to examine per referrer",
                )),
        )
        .subcommand(
            run_args(command!("twice-removed"))
                .about("Find the referrers of the target's referrers")
                .arg(usize_arg("max-referrers", "First-level referrers to walk"))
                .arg(usize_arg(
                    "max-second-level",
                    "Second-level referrers to keep per first-level referrer",
                )),
        )
        .subcommand(
            run_args(command!("compare"))
                .about("Common backlinks and outlinks of two or more domains")
                .arg(usize_arg("link-cap", "Links fetched per domain and direction")),
        )
        .subcommand(
            run_args(command!("anchors"))
                .about("Anchor text and surrounding context of links pointing at the target")
                .arg(
                    arg!(-r --"referrer" <DOMAIN>)
                        .required(false)
                        .help("Only links from this referring domain"),
                )
                .arg(
                    arg!(-t --"term" <TEXT>)
                        .required(false)
                        .help("Only anchors whose text or context contains this term"),
                )
                .arg(usize_arg(
                    "context-window",
                    "Characters of context kept on each side of the anchor",
                )),
        )
}
