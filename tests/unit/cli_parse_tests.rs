use clap::Parser;
use tierkv::cli::commands::logs::LogsCommand;
use tierkv::cli::{Cli, Commands};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("tierkv").chain(args.iter().copied())).unwrap()
}

#[test]
fn robot_flag_is_global() {
    let cli = parse(&["probe", "--robot"]);
    assert!(cli.robot);
    assert!(matches!(cli.command, Commands::Probe(_)));

    let cli = parse(&["--machine", "health"]);
    assert!(cli.robot);
}

#[test]
fn save_takes_value_or_file() {
    let cli = parse(&["save", "settings", r#"{"a":1}"#]);
    let Commands::Save(args) = cli.command else {
        panic!("expected save");
    };
    assert_eq!(args.key, "settings");
    assert_eq!(args.value.as_deref(), Some(r#"{"a":1}"#));

    let cli = parse(&["save", "settings", "--file", "v.json"]);
    let Commands::Save(args) = cli.command else {
        panic!("expected save");
    };
    assert!(args.value.is_none());

    assert!(Cli::try_parse_from(["tierkv", "save", "settings"]).is_err());
    assert!(Cli::try_parse_from(["tierkv", "save", "settings", "1", "--file", "v.json"]).is_err());
}

#[test]
fn logs_append_requires_type_and_subject() {
    let cli = parse(&["logs", "append", "petAbilityLogs", "--type", "Gold", "--subject", "Rex"]);
    let Commands::Logs(args) = cli.command else {
        panic!("expected logs");
    };
    let LogsCommand::Append { kind, subject, timestamp, .. } = args.command else {
        panic!("expected append");
    };
    assert_eq!(kind.as_deref(), Some("Gold"));
    assert_eq!(subject.as_deref(), Some("Rex"));
    assert!(timestamp.is_none());

    assert!(Cli::try_parse_from(["tierkv", "logs", "append", "petAbilityLogs", "--type", "Gold"]).is_err());
}

#[test]
fn hard_clear_is_kebab_case() {
    let cli = parse(&["hard-clear", "petAbilityLogs"]);
    assert!(matches!(cli.command, Commands::HardClear(_)));
}
