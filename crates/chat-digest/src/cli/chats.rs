use anyhow::Result;
use digest_core::TokenProvider;
use lark_adapter::LarkClient;

use crate::cli::{ChatsArgs, ChatsFormat};
use crate::config::Config;

pub async fn run(args: ChatsArgs, config: &Config) -> Result<()> {
    let client = LarkClient::new(config.lark_settings()?)?;
    let token = client.fetch_token().await?;
    let chats = client.list_chats(&token).await?;

    if args.format == ChatsFormat::Json {
        println!("{}", serde_json::to_string_pretty(&chats)?);
        return Ok(());
    }

    if chats.is_empty() {
        println!("(no chats found; add the app's bot to a group first)");
        return Ok(());
    }

    println!("{:<40}  {}", "CHAT ID", "NAME");
    println!("{}", "─".repeat(70));
    for chat in &chats {
        println!("{:<40}  {}", chat.chat_id, chat.name);
    }

    Ok(())
}
