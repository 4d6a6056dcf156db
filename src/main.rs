#[tokio::main]
async fn main() -> anyhow::Result<()> {
    editing_tracker::run().await
}
