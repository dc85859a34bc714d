#[tokio::main]
async fn main() {
    let code = scanplugin::app::startup::startup().await;
    std::process::exit(code);
}
