#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockboard::run().await
}
