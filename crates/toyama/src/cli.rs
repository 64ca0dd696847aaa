//! Clap derive structures for the `toyama` CLI.

use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand, ValueEnum};

use toyama_core::DeviceType;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// toyama -- control Toyama switch and fan-dimmer boards
#[derive(Debug, Parser)]
#[command(
    name = "toyama",
    version,
    about = "Control Toyama switch and fan-dimmer boards through their gateway",
    long_about = "Sends commands to a Toyama home-automation gateway over HTTP and\n\
        listens for the state updates boards broadcast over UDP.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Gateway host, e.g. 192.168.1.20 or gw.local:8900
    #[arg(long, short = 'g', env = "TOYAMA_GATEWAY", global = true)]
    pub gateway: Option<String>,

    /// Command timeout in seconds
    #[arg(long, env = "TOYAMA_TIMEOUT", default_value = "5", global = true)]
    pub timeout: u64,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Color if stdout is a terminal
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Switch a button on (fans go to full speed)
    On(ButtonArgs),

    /// Switch a button off
    Off(ButtonArgs),

    /// Set a fan's speed level
    #[command(alias = "fan")]
    Speed(SpeedArgs),

    /// Ask every board to broadcast its current state
    Status,

    /// Print state updates as boards report them
    #[command(alias = "watch")]
    Listen(ListenArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct ButtonArgs {
    /// Numeric board id
    #[arg(long, short = 'b')]
    pub board: u64,

    /// Button number on the board (1-based, as printed on the catalog)
    #[arg(long, short = 'n')]
    pub button: u32,

    /// What the button drives
    #[arg(long, short = 'k', default_value = "switch")]
    pub kind: ButtonKind,
}

#[derive(Debug, Args)]
pub struct SpeedArgs {
    /// Numeric board id
    #[arg(long, short = 'b')]
    pub board: u64,

    /// Button number of the fan dimmer
    #[arg(long, short = 'n')]
    pub button: u32,

    /// Speed level: 0, 25, 50, 75 or 100
    #[arg(long, short = 'l', allow_negative_numbers = true)]
    pub level: i32,
}

#[derive(Debug, Args)]
pub struct ListenArgs {
    /// Emit one JSON object per update
    #[arg(long)]
    pub json: bool,

    /// Address to receive updates on
    #[arg(long, default_value = "0.0.0.0:56000")]
    pub bind: SocketAddr,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: clap_complete::Shell,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ButtonKind {
    Switch,
    Fan,
    Master,
}

impl From<ButtonKind> for DeviceType {
    fn from(kind: ButtonKind) -> Self {
        match kind {
            ButtonKind::Switch => DeviceType::Switch,
            ButtonKind::Fan => DeviceType::Fan,
            ButtonKind::Master => DeviceType::Master,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_speed_command() {
        let cli = Cli::try_parse_from([
            "toyama", "--gateway", "10.0.0.2", "speed", "-b", "4242", "-n", "2", "-l", "75",
        ])
        .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(cli.global.gateway.as_deref(), Some("10.0.0.2"));
        match cli.command {
            Command::Speed(args) => {
                assert_eq!((args.board, args.button, args.level), (4242, 2, 75));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn out_of_range_speed_levels_still_parse() {
        for raw in ["300", "-5"] {
            let cli = Cli::try_parse_from(["toyama", "speed", "-b", "1", "-n", "2", "-l", raw])
                .unwrap_or_else(|e| panic!("{e}"));
            match cli.command {
                Command::Speed(args) => assert_eq!(args.level.to_string(), raw),
                other => panic!("unexpected command {other:?}"),
            }
        }
    }
}
