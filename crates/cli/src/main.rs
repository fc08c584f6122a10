use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    recipebot_cli::run().await
}
