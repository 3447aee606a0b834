mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use session::{DEFAULT_LOG_PATH, Session};

fn main() -> io::Result<()> {
    let log_path = parse_log_path().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("Usage: dimmer-emulator [--log <path>] [--no-log]");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(log_path)?;
    let mut line = String::new();

    writeln!(
        writer,
        "AC dimmer emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_log_path() -> Result<Option<PathBuf>, String> {
    let mut args = env::args().skip(1);
    let Some(arg) = args.next() else {
        return Ok(Some(PathBuf::from(DEFAULT_LOG_PATH)));
    };

    if arg == "--no-log" {
        Ok(None)
    } else if let Some(value) = arg.strip_prefix("--log=") {
        Ok(Some(PathBuf::from(value)))
    } else if arg == "--log" {
        match args.next() {
            Some(value) => Ok(Some(PathBuf::from(value))),
            None => Err("Expected value after --log".to_string()),
        }
    } else {
        Err(format!("Unrecognized argument `{arg}`"))
    }
}
