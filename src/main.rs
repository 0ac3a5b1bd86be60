use page_capture::{run_main, ChromiumLauncher};

#[tokio::main]
async fn main() {
    let code = run_main(std::env::args_os(), |config| {
        ChromiumLauncher::new(config.clone())
    })
    .await;

    std::process::exit(code);
}
