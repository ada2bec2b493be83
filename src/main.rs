#[actix_web::main]
async fn main() -> eyre::Result<()> {
    outreach::run().start().await
}
