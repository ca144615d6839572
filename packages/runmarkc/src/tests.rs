use clap::{CommandFactory, Parser};
use runmark_ir::reg::Reg;
use runmark_passes::config::{PassConfig, TerminatorPolicy};

use crate::{annotate_file, Args, Color, Outcome, Policy};

#[test]
fn args_are_consistent() {
    Args::command().debug_assert();
}

#[test]
fn defaults_match_pass_config() {
    let args = Args::try_parse_from(["runmarkc", "-i", "a.s"]).unwrap();
    let default = PassConfig::default();
    assert_eq!(args.carrier, default.carrier);
    assert_eq!(TerminatorPolicy::from(args.policy), default.policy);
    assert_eq!(args.color, Color::Auto);
    assert_eq!(args.verbose, 0);
    assert!(!args.stats);
}

#[test]
fn flags() {
    let args = Args::try_parse_from([
        "runmarkc",
        "--carrier",
        "x5",
        "--policy",
        "ordinary",
        "--color",
        "never",
        "-vv",
        "--stats",
    ])
    .unwrap();
    assert_eq!(args.carrier, Reg::X(5));
    assert_eq!(args.policy, Policy::Ordinary);
    assert_eq!(args.color, Color::Never);
    assert_eq!(args.verbose, 2);
    assert!(args.stats);
    assert!(args.input.is_none());
}

#[test]
fn bad_carrier() {
    let err = Args::try_parse_from(["runmarkc", "--carrier", "q7"]).unwrap_err();
    assert!(err.to_string().contains("`q7` is not a register"));
}

#[test]
fn bad_input_is_a_failure() {
    let dir = std::env::temp_dir().join(format!("runmarkc-annotate-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let config = PassConfig::default();

    let short = dir.join("short.s");
    std::fs::write(&short, "f:\n    add a0\n").unwrap();
    assert_eq!(
        annotate_file(&short, None, &config, false).unwrap(),
        Outcome::Reported
    );
    assert!(annotate_file(&dir.join("notes.txt"), None, &config, false).is_err());
    assert!(annotate_file(&dir.join("missing.s"), None, &config, false).is_err());

    let good = dir.join("good.s");
    let output = dir.join("good.out.s");
    std::fs::write(&good, "f:\n    add a0, a1, a2\n").unwrap();
    assert_eq!(
        annotate_file(&good, Some(&output), &config, false).unwrap(),
        Outcome::Success
    );
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "f:\n    noopn   t3, 1\n    add     a0, a1, a2\n"
    );
    std::fs::remove_dir_all(&dir).unwrap();
}
