mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "muxconn", version, about = "Connection multiplexing CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr). MUXCONN_LOG overrides this.
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use muxconn_transport::Address;

    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "muxconn",
            "send",
            "tcp://127.0.0.1:7000",
            "--channels",
            "4",
            "--channel",
            "2",
            "--data",
            "hello",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send command");
        };
        assert_eq!(args.address, Address::Tcp("127.0.0.1:7000".to_string()));
        assert_eq!(args.channel, 2);
        assert_eq!(args.split.channels, 4);
        assert_eq!(args.split.max_frame, 4096);
        assert!(args.split.buffer.is_none());
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "muxconn",
            "send",
            "/tmp/test.sock",
            "--channels",
            "1",
            "--file",
            "/tmp/payload.bin",
            "--data",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_buffered_echo() {
        let cli = Cli::try_parse_from([
            "muxconn",
            "--log-level",
            "debug",
            "echo",
            "unix:///tmp/echo.sock",
            "--channels",
            "8",
            "--buffer",
            "8192",
        ])
        .expect("echo args should parse");

        let Command::Echo(args) = cli.command else {
            panic!("expected echo command");
        };
        assert_eq!(args.address, Address::Unix("/tmp/echo.sock".into()));
        let config = args.split.mux_config();
        assert_eq!(
            config.inbound,
            muxconn_split::InboundMode::Bounded { capacity: 8192 }
        );
        assert!(config.on_fatal.is_some());
    }

    #[test]
    fn rejects_malformed_address() {
        let err = Cli::try_parse_from(["muxconn", "listen", "ftp://nowhere", "--channels", "2"])
            .expect_err("unknown scheme should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
