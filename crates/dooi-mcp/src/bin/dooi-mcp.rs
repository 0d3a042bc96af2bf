use std::env;
use std::time::Duration;

use dooi::DooiConfig;
use dooi_mcp::{init_tracing, run_stdio_server};

fn usage_error(message: &str) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

fn parse_timeout(raw: &str) -> Duration {
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Duration::from_millis(ms),
        _ => usage_error("--timeout-ms requires a positive integer"),
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let mut args = env::args().skip(1);
    let mut config = DooiConfig::from_env();

    while let Some(arg) = args.next() {
        if let Some(cmd) = arg.strip_prefix("--cli=") {
            config = config.with_cli_command(cmd);
        } else if arg == "--cli" {
            match args.next() {
                Some(cmd) => config = config.with_cli_command(&cmd),
                None => usage_error("--cli requires a command argument"),
            }
        } else if let Some(ms) = arg.strip_prefix("--timeout-ms=") {
            config.timeout = parse_timeout(ms);
        } else if arg == "--timeout-ms" {
            match args.next() {
                Some(ms) => config.timeout = parse_timeout(&ms),
                None => usage_error("--timeout-ms requires a value"),
            }
        } else {
            usage_error(&format!("unknown argument: {arg}"));
        }
    }

    if let Err(err) = run_stdio_server(config).await {
        eprintln!("dooi-mcp server failed: {err}");
        std::process::exit(1);
    }
}
