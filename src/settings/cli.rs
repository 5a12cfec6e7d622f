use super::Parser;

#[derive(Parser, Debug)]
#[command(about = "Token issuing and authorization service")]
pub struct Cli {
    /// Path to a settings file, without the extension.
    #[arg(long)]
    pub settings: Option<String>,
}
