use env_logger::Env;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if let Err(err) = thot_sync::app::run().await {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}
