use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, fs, path::PathBuf};

use touchview::config::{self, Profile, ProfileStore};

use crate::{input, pipeline, replay};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("watch") => pipeline::run_watch(ProfileStore::load_or_install_default()?),

        Some("replay") => {
            let profile_path: Option<PathBuf> = pargs.opt_value_from_str("--profile")?;
            let trace: PathBuf = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: touchview replay <trace.jsonl> [--profile <file>]"))?;
            let profile = match profile_path {
                Some(p) => config::load_profile_file(&p)?,
                None => Profile::builtin()?,
            };
            let txt = fs::read_to_string(&trace)
                .map_err(|e| anyhow!("failed to read {}: {e}", trace.display()))?;
            let events = replay::parse_trace(&txt)?;
            let r = replay::replay(&profile, &events)?;
            print_response(&r);
            Ok(())
        }

        Some("list") => {
            let store = ProfileStore::load_or_install_default()?;
            for name in store.list_profiles() {
                let mark = if name == store.active_name { '*' } else { ' ' };
                println!("{mark} {name}");
            }
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: touchview use <profile_name>"))?;
            let mut store = ProfileStore::load_or_install_default()?;
            store.set_active(&name)?;
            println!("ok: active profile is now '{name}'");
            Ok(())
        }

        Some("doctor") => {
            let store = ProfileStore::load_or_install_default()?;
            let devices: Vec<String> = input::discover_multitouch()
                .into_iter()
                .map(|d| format!("{} ({})", d.name, d.path))
                .collect();
            print_response(&store.doctor_report(&devices));
            Ok(())
        }

        Some("check") => {
            let path: PathBuf = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: touchview check <profile.toml>"))?;
            let profile = config::load_profile_file(&path)?;
            let name = profile.meta.name.as_deref().unwrap_or("(unnamed)");
            println!("ok: {} is a valid profile ({name})", path.display());
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!(
        r#"touchview - multi-touch map gesture recognizer

USAGE:
  touchview help [command]                       Show general or command-specific help
  touchview watch                                Drive a viewport from live touch devices
  touchview replay <trace> [--profile <file>]    Replay a JSON-lines touch trace
  touchview list                                 List profiles
  touchview use <name>                           Switch active profile
  touchview doctor                               Diagnose permissions/devices
  touchview check <file>                         Validate a profile file

TIPS:
  - Profiles: ~/.config/touchview/profiles
  - Active profile pointer: ~/.config/touchview/active
  - RUST_LOG=debug shows every gesture decision
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "watch" => println!(
            "usage: touchview watch\nReads multitouch devices, recognizes gestures and logs them.\nEdits to the active profile are picked up live; Ctrl-C stops."
        ),
        "replay" => println!(
            "usage: touchview replay <trace.jsonl> [--profile <file>]\nOne JSON object per line, e.g.\n  {{\"op\":\"press\",\"id\":1,\"x\":10,\"y\":20,\"t_ms\":0}}\n  {{\"op\":\"move\",\"id\":1,\"x\":15,\"y\":20,\"t_ms\":16}}\n  {{\"op\":\"release\",\"id\":1,\"x\":15,\"y\":20,\"t_ms\":40}}\nPrints the final viewport and every recognized gesture."
        ),
        "use" => {
            println!("usage: touchview use <name>\nSwitches active profile to <name>.")
        }
        "list" => {
            println!("usage: touchview list\nLists available profiles; marks active with '*'.")
        }
        "doctor" => println!(
            "usage: touchview doctor\nChecks permissions and lists detected multitouch devices."
        ),
        "check" => println!(
            "usage: touchview check <file>\nParses and validates a profile without activating it."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
