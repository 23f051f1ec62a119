#[tokio::main]
async fn main() {
    normlens::run().await;
}
