pub mod chats;
pub mod run;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "chat-digest")]
#[command(version, about = "Summarise today's group chat into a Bitable record")]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect today's messages, summarise them and append the daily record
    Run(RunArgs),
    /// List the group chats the application has joined
    Chats(ChatsArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Print the record instead of writing it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct ChatsArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = ChatsFormat::Table)]
    pub format: ChatsFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatsFormat {
    Table,
    Json,
}
