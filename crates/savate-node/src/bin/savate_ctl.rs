//! savate-ctl CLI tool
//!
//! Sends one command to a running savate-node and prints the response.
//!
//! Usage:
//!   savate-ctl score <round> <red|blue> <1|2|3|->
//!   savate-ctl warning <red|blue> <round>
//!   savate-ctl count <red|blue> <round>
//!   savate-ctl abandon <red|blue>
//!   savate-ctl bonus <red|blue> <0|1>
//!   savate-ctl fighters <red name> <blue name>
//!   savate-ctl undo | sync | status | recap | ping
//!   savate-ctl reset-partial | reset-complete

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

use savate_node::{ControlCommand, ControlResponse};
use savate_scoring::Corner;

fn print_usage() {
    eprintln!("savate-ctl - Drive a Savate scoring node");
    eprintln!();
    eprintln!("Judge commands:");
    eprintln!("  savate-ctl score <round> <red|blue> <1|2|3|->  Enter or clear a score");
    eprintln!("  savate-ctl warning <red|blue> <round>          Toggle a warning");
    eprintln!("  savate-ctl count <red|blue> <round>            Toggle a standing count (combat)");
    eprintln!("  savate-ctl abandon <red|blue>                  Toggle an abandon");
    eprintln!("  savate-ctl bonus <red|blue> <0|1>              Set the bonus");
    eprintln!("  savate-ctl sync                                Resynchronise with the delegate");
    eprintln!();
    eprintln!("Delegate commands:");
    eprintln!("  savate-ctl fighters <red> <blue>               Set fighter names");
    eprintln!("  savate-ctl recap                               Show the recap and final result");
    eprintln!("  savate-ctl reset-partial                       Clear scores, keep judges");
    eprintln!("  savate-ctl reset-complete                      End the session");
    eprintln!();
    eprintln!("Both:");
    eprintln!("  savate-ctl undo                                Undo the last change");
    eprintln!("  savate-ctl status                              Show session and links");
    eprintln!("  savate-ctl ping                                Check if the node is running");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  SAVATE_CONTROL_SOCKET  Path to control socket (default: ./savate-data/control.sock)");
}

fn get_socket_path() -> PathBuf {
    std::env::var("SAVATE_CONTROL_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./savate-data/control.sock"))
}

fn send_command(cmd: &ControlCommand) -> Result<ControlResponse, String> {
    let socket_path = get_socket_path();

    let mut stream = UnixStream::connect(&socket_path).map_err(|e| {
        format!(
            "Failed to connect to savate-node at {:?}: {}\n\
             Is the savate-node running?",
            socket_path, e
        )
    })?;

    let cmd_json = serde_json::to_string(cmd).map_err(|e| e.to_string())?;
    writeln!(stream, "{}", cmd_json).map_err(|e| e.to_string())?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .map_err(|e| e.to_string())?;

    serde_json::from_str(&response_line).map_err(|e| format!("Invalid response: {}", e))
}

fn corner(arg: Option<&String>) -> Result<Corner, String> {
    arg.ok_or("missing corner (red|blue)")?
        .parse::<Corner>()
        .map_err(|e| e.to_string())
}

fn number(arg: Option<&String>, what: &str) -> Result<u8, String> {
    arg.ok_or(format!("missing {what}"))?
        .parse::<u8>()
        .map_err(|e| format!("invalid {what}: {e}"))
}

fn parse_command(args: &[String]) -> Result<Option<ControlCommand>, String> {
    let cmd = match args[1].as_str() {
        "score" => {
            let round = number(args.get(2), "round")?;
            let corner = corner(args.get(3))?;
            let value = match args.get(4).map(String::as_str) {
                None | Some("-") => None,
                Some(_) => Some(number(args.get(4), "score")?),
            };
            ControlCommand::SetScore { round, corner, value }
        }
        "warning" => ControlCommand::ToggleWarning {
            corner: corner(args.get(2))?,
            round: number(args.get(3), "round")?,
        },
        "count" => ControlCommand::ToggleCount {
            corner: corner(args.get(2))?,
            round: number(args.get(3), "round")?,
        },
        "abandon" => ControlCommand::ToggleAbandon {
            corner: corner(args.get(2))?,
        },
        "bonus" => ControlCommand::SetBonus {
            corner: corner(args.get(2))?,
            value: number(args.get(3), "bonus")?,
        },
        "fighters" => {
            if args.len() < 4 {
                return Err("fighters requires a red and a blue name".into());
            }
            ControlCommand::SetFighters {
                red: args[2].clone(),
                blue: args[3].clone(),
            }
        }
        "undo" => ControlCommand::Undo,
        "sync" => ControlCommand::Sync,
        "status" => ControlCommand::Status,
        "recap" => ControlCommand::Recap,
        "reset-partial" => ControlCommand::ResetPartial,
        "reset-complete" => ControlCommand::ResetComplete,
        "ping" => ControlCommand::Ping,
        "-h" | "--help" | "help" => return Ok(None),
        other => return Err(format!("Unknown command: {}", other)),
    };
    Ok(Some(cmd))
}

fn print_response(response: ControlResponse) {
    match response {
        ControlResponse::Ok { message } => {
            println!("{}", message);
        }
        ControlResponse::Error { error } => {
            eprintln!("Error: {}", error);
            std::process::exit(1);
        }
        ControlResponse::Record {
            record,
            equality_warning,
        } => {
            let total = record.totals.total;
            println!("Juge {} ({})", record.name, record.number);
            println!("Total: {} - {}", total.red, total.blue);
            println!("Décision: {}", record.decision);
            if equality_warning {
                println!("Attention: égalité sans bonus");
            }
        }
        ControlResponse::Recap { recap, result } => {
            for round in &recap.rounds {
                let cells: Vec<String> = round
                    .judges
                    .iter()
                    .map(|j| {
                        let show = |v: Option<u8>| v.map_or("-".to_string(), |v| v.to_string());
                        format!("{}-{}", show(j.red), show(j.blue))
                    })
                    .collect();
                println!(
                    "Reprise {}: {}  [{}-{}]",
                    round.round,
                    cells.join("  "),
                    round.total.red,
                    round.total.blue
                );
            }
            for vote in &result.votes {
                println!("  {}: {}", vote.name, vote.decision);
            }
            println!("{}", result.winner);
            println!("{}", result.summary);
        }
        ControlResponse::Status { node } => match serde_json::to_string_pretty(&node) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        ControlResponse::Pong => {
            println!("pong - savate-node is running");
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let cmd = match parse_command(&args) {
        Ok(Some(cmd)) => cmd,
        Ok(None) => {
            print_usage();
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    match send_command(&cmd) {
        Ok(response) => print_response(response),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
