use home_designer_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("home designer error: {err}");
        std::process::exit(1);
    }
}
