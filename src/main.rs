#[tokio::main]
async fn main() {
    if let Err(error) = dayplan_scheduler::run().await {
        eprintln!("dayplan-scheduler: {error}");
        std::process::exit(1);
    }
}
