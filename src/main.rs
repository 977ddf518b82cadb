#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = tutoring_api::run().await {
        eprintln!("tutoring-api fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
